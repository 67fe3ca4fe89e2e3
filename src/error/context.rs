//! Caller-supplied snapshot describing the mode and intent around a failure.

use serde::{Deserialize, Serialize};

/// The operation that was in flight when the failure surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// The task runner itself (a running task was interrupted).
    Runtime,
    /// A client call issued by the stream loop.
    Client,
    /// A cancel command read from stdin.
    Cancel,
    /// The shutdown sequence.
    Shutdown,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Runtime => "runtime",
            Operation::Client => "client",
            Operation::Cancel => "cancel",
            Operation::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Context consumed by the composite control-flow decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlFlowContext {
    /// Whether commands are being read continuously from stdin.
    pub stdin_stream_mode: bool,
    /// Whether the user asked for the current task to be cancelled.
    #[serde(default)]
    pub cancel_requested: bool,
    /// Whether the shutdown sequence has started.
    #[serde(default)]
    pub shutting_down: bool,
    #[serde(default)]
    pub operation: Option<Operation>,
}

impl ControlFlowContext {
    /// Context for stdin stream mode with no intent flags set.
    pub fn stream() -> Self {
        Self {
            stdin_stream_mode: true,
            ..Self::default()
        }
    }

    /// Context outside stream mode. Nothing is ever expected here.
    pub fn single_shot() -> Self {
        Self::default()
    }

    /// Sets whether the user requested a cancel.
    pub fn with_cancel_requested(mut self, requested: bool) -> Self {
        self.cancel_requested = requested;
        self
    }

    /// Sets whether the process is shutting down.
    pub fn with_shutting_down(mut self, shutting_down: bool) -> Self {
        self.shutting_down = shutting_down;
        self
    }

    /// Sets the operation in flight.
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// True when the user or the process has signalled it wants to stop.
    pub fn stop_intended(&self) -> bool {
        self.cancel_requested || self.shutting_down
    }
}
