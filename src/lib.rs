//! streamguard - control-flow error classification for stdin stream mode
//!
//! When a CLI streams commands from stdin into a long-lived task runner, some
//! failures are expected: the user cancelled, the task already finished, or a
//! pipe closed during shutdown. This library tells those apart from real
//! failures.
//!
//! ```
//! use streamguard::error::{is_expected_control_flow_error, ControlFlowContext, Operation};
//!
//! let ctx = ControlFlowContext::stream().with_operation(Operation::Cancel);
//! assert!(is_expected_control_flow_error("task not found", &ctx));
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod record;
