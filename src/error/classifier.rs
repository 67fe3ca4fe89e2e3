//! Control-flow error classifier for stdin stream mode.
//!
//! While commands are streamed from stdin into the task runner, some failures
//! are the expected outcome of a cancel or shutdown race rather than defects:
//! the task was aborted on request, it had already settled when the cancel
//! arrived, or a pipe closed because the process is going down. This module
//! recognizes those failures through best-effort code, name and substring
//! matching. It has no side effects.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::context::{ControlFlowContext, Operation};
use super::metadata::{ErrorMetadata, RawError};

/// Codes reported by aborted or cancelled operations.
pub const CANCELLATION_ERROR_CODES: &[&str] = &["ABORT_ERR", "ERR_CANCELED", "ERR_CANCELLED"];

/// Lower-cased error names reported by aborted operations.
pub const CANCELLATION_ERROR_NAMES: &[&str] = &["aborterror"];

/// Message substrings that mark an abort or cancellation.
pub const CANCELLATION_ERROR_PATTERNS: &[&str] = &["aborted", "aborterror", "cancelled", "canceled"];

/// Messages produced when a cancel races a task that already settled.
pub const NO_ACTIVE_TASK_PATTERNS: &[&str] = &[
    "no active task",
    "no task to cancel",
    "task not found",
    "unable to find task",
    "already completed",
    "already cancelled",
    "already canceled",
];

/// Codes reported when a pipe or socket is closed under us.
pub const STREAM_TEARDOWN_CODES: &[&str] = &[
    "EPIPE",
    "ECONNRESET",
    "ERR_STREAM_DESTROYED",
    "ERR_STREAM_PREMATURE_CLOSE",
];

/// Message substrings that mark a closed or destroyed stream.
pub const STREAM_TEARDOWN_PATTERNS: &[&str] = &[
    "write after end",
    "stream destroyed",
    "premature close",
    "socket hang up",
    "broken pipe",
];

/// The kind of expected control flow a failure was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlFlowKind {
    /// A pipe or socket closed during shutdown.
    StreamTeardown,
    /// The operation was aborted or cancelled.
    Cancellation,
    /// A cancel or shutdown found no task left to act on.
    NoActiveTask,
}

impl std::fmt::Display for ControlFlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ControlFlowKind::StreamTeardown => "stream teardown",
            ControlFlowKind::Cancellation => "cancellation",
            ControlFlowKind::NoActiveTask => "no active task",
        };
        f.write_str(name)
    }
}

/// Extra patterns for one kind, as found in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PatternOverrides {
    /// Exact error codes.
    #[serde(default)]
    pub codes: Vec<String>,
    /// Error names, compared case-insensitively.
    #[serde(default)]
    pub names: Vec<String>,
    /// Message substrings, compared case-insensitively.
    #[serde(default)]
    pub messages: Vec<String>,
}

impl PatternOverrides {
    /// Returns true if no extra patterns are listed.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty() && self.names.is_empty() && self.messages.is_empty()
    }
}

/// The codes, names and message substrings that identify one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    codes: Vec<String>,
    names: Vec<String>,
    messages: Vec<String>,
}

impl PatternSet {
    /// Builds a set from static tables. Names and messages must be lower-cased.
    pub fn from_static(codes: &[&str], names: &[&str], messages: &[&str]) -> Self {
        let owned = |items: &[&str]| -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        };
        Self {
            codes: owned(codes),
            names: owned(names),
            messages: owned(messages),
        }
    }

    /// Adds configured patterns, skipping blanks and duplicates.
    pub fn extend(&mut self, overrides: &PatternOverrides) {
        push_unique(&mut self.codes, overrides.codes.iter().map(|c| c.trim().to_string()));
        push_unique(&mut self.names, overrides.names.iter().map(|n| n.trim().to_lowercase()));
        push_unique(
            &mut self.messages,
            overrides.messages.iter().map(|m| m.trim().to_lowercase()),
        );
    }

    /// Returns the exact codes in this set.
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Returns the lower-cased names in this set.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the lower-cased message substrings in this set.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Checks code, then name, then message substrings.
    pub fn matches(&self, meta: &ErrorMetadata) -> bool {
        if let Some(code) = meta.code.as_deref() {
            if self.codes.iter().any(|c| c == code) {
                return true;
            }
        }

        if let Some(name) = meta.normalized_name.as_deref() {
            if self.names.iter().any(|n| n == name) {
                return true;
            }
        }

        self.messages
            .iter()
            .any(|pattern| meta.normalized_message.contains(pattern.as_str()))
    }
}

fn push_unique(target: &mut Vec<String>, items: impl Iterator<Item = String>) {
    for item in items {
        if !item.is_empty() && !target.contains(&item) {
            target.push(item);
        }
    }
}

/// One pattern set per recognized kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTables {
    pub cancellation: PatternSet,
    pub no_active_task: PatternSet,
    pub stream_teardown: PatternSet,
}

impl Default for PatternTables {
    fn default() -> Self {
        Self {
            cancellation: PatternSet::from_static(
                CANCELLATION_ERROR_CODES,
                CANCELLATION_ERROR_NAMES,
                CANCELLATION_ERROR_PATTERNS,
            ),
            no_active_task: PatternSet::from_static(&[], &[], NO_ACTIVE_TASK_PATTERNS),
            stream_teardown: PatternSet::from_static(
                STREAM_TEARDOWN_CODES,
                &[],
                STREAM_TEARDOWN_PATTERNS,
            ),
        }
    }
}

impl PatternTables {
    /// Adds configured patterns to each set. Built-in patterns are always kept.
    pub fn extend(
        mut self,
        cancellation: &PatternOverrides,
        no_active_task: &PatternOverrides,
        stream_teardown: &PatternOverrides,
    ) -> Self {
        self.cancellation.extend(cancellation);
        self.no_active_task.extend(no_active_task);
        self.stream_teardown.extend(stream_teardown);
        self
    }
}

/// Classifier over a fixed set of pattern tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFlowClassifier {
    tables: PatternTables,
}

impl ControlFlowClassifier {
    /// Creates a classifier with the built-in tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a classifier with custom tables.
    pub fn with_tables(tables: PatternTables) -> Self {
        Self { tables }
    }

    /// Returns the pattern tables in use.
    pub fn tables(&self) -> &PatternTables {
        &self.tables
    }

    /// Checks the failure against the cancellation set.
    pub fn is_cancellation_like<'a>(&self, error: impl Into<RawError<'a>>) -> bool {
        self.tables
            .cancellation
            .matches(&ErrorMetadata::from_raw(error.into()))
    }

    /// Checks the failure against the no-active-task set.
    pub fn is_no_active_task_like<'a>(&self, error: impl Into<RawError<'a>>) -> bool {
        self.tables
            .no_active_task
            .matches(&ErrorMetadata::from_raw(error.into()))
    }

    /// Checks the failure against the stream-teardown set.
    pub fn is_stream_teardown_like<'a>(&self, error: impl Into<RawError<'a>>) -> bool {
        self.tables
            .stream_teardown
            .matches(&ErrorMetadata::from_raw(error.into()))
    }

    /// Returns which kind of expected control flow the failure represents, if any.
    ///
    /// Rules are checked in order and the first match wins:
    /// 1. Outside stdin stream mode nothing is expected.
    /// 2. Stream teardown while shutting down.
    /// 3. Cancellation when a stop was intended or a running task was interrupted.
    /// 4. No active task when a stop was intended or during cancel/shutdown.
    pub fn classify<'a>(
        &self,
        error: impl Into<RawError<'a>>,
        context: &ControlFlowContext,
    ) -> Option<ControlFlowKind> {
        if !context.stdin_stream_mode {
            return None;
        }

        let meta = ErrorMetadata::from_raw(error.into());

        if context.shutting_down && self.tables.stream_teardown.matches(&meta) {
            return Some(ControlFlowKind::StreamTeardown);
        }

        if self.tables.cancellation.matches(&meta)
            && (context.stop_intended() || context.operation == Some(Operation::Runtime))
        {
            return Some(ControlFlowKind::Cancellation);
        }

        if self.tables.no_active_task.matches(&meta)
            && (context.stop_intended()
                || matches!(
                    context.operation,
                    Some(Operation::Cancel) | Some(Operation::Shutdown)
                ))
        {
            return Some(ControlFlowKind::NoActiveTask);
        }

        None
    }

    /// Returns true if the failure is expected control flow in this context.
    pub fn is_expected<'a>(
        &self,
        error: impl Into<RawError<'a>>,
        context: &ControlFlowContext,
    ) -> bool {
        self.classify(error, context).is_some()
    }
}

/// The process-wide classifier with the built-in tables.
pub fn default_classifier() -> &'static ControlFlowClassifier {
    static DEFAULT: OnceLock<ControlFlowClassifier> = OnceLock::new();
    DEFAULT.get_or_init(ControlFlowClassifier::new)
}

/// Best-effort check for abort and cancellation failures.
pub fn is_cancellation_like_error<'a>(error: impl Into<RawError<'a>>) -> bool {
    default_classifier().is_cancellation_like(error)
}

/// Best-effort check for a cancel that found its task already settled.
pub fn is_no_active_task_like_error<'a>(error: impl Into<RawError<'a>>) -> bool {
    default_classifier().is_no_active_task_like(error)
}

/// Best-effort check for a closed pipe or socket.
pub fn is_stream_teardown_like_error<'a>(error: impl Into<RawError<'a>>) -> bool {
    default_classifier().is_stream_teardown_like(error)
}

/// Returns which kind of expected control flow the failure represents, if any.
pub fn classify_control_flow<'a>(
    error: impl Into<RawError<'a>>,
    context: &ControlFlowContext,
) -> Option<ControlFlowKind> {
    default_classifier().classify(error, context)
}

/// Returns true for failures that are expected control flow rather than
/// fatal errors while handling stdin stream tasks.
pub fn is_expected_control_flow_error<'a>(
    error: impl Into<RawError<'a>>,
    context: &ControlFlowContext,
) -> bool {
    default_classifier().is_expected(error, context)
}
