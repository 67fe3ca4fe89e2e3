//! Control-flow error classification for stdin stream mode.
//!
//! This module decides whether a failure raised while streaming commands into
//! the task runner is an expected outcome of cancellation or shutdown, or a
//! real error that should be surfaced. It recognizes three kinds of expected
//! failure: abort/cancellation, a cancel racing an already settled task, and
//! stream teardown during shutdown.

pub mod classifier;
pub mod context;
pub mod guard;
pub mod metadata;

// Re-export main types for convenient access
pub use classifier::{
    classify_control_flow, default_classifier, is_cancellation_like_error,
    is_expected_control_flow_error, is_no_active_task_like_error, is_stream_teardown_like_error,
    ControlFlowClassifier, ControlFlowKind, PatternOverrides, PatternSet, PatternTables,
};
pub use context::{ControlFlowContext, Operation};
pub use guard::{absorb_control_flow, ControlFlowGuard};
pub use metadata::{
    get_error_metadata, ErrorMetadata, RawError, TaskFailure, OPAQUE_OBJECT_MESSAGE,
};
