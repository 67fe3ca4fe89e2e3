//! Helpers for call sites in the stream loop that need to swallow expected
//! control-flow failures and propagate everything else.

use std::error::Error as StdError;

use super::classifier::{default_classifier, ControlFlowClassifier, ControlFlowKind};
use super::context::ControlFlowContext;
use super::metadata::RawError;

/// A classifier bound to a context snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ControlFlowGuard<'c> {
    classifier: &'c ControlFlowClassifier,
    context: ControlFlowContext,
}

impl ControlFlowGuard<'static> {
    /// Creates a guard over the built-in pattern tables.
    pub fn new(context: ControlFlowContext) -> Self {
        Self::with_classifier(default_classifier(), context)
    }
}

impl<'c> ControlFlowGuard<'c> {
    /// Creates a guard over a custom classifier.
    pub fn with_classifier(
        classifier: &'c ControlFlowClassifier,
        context: ControlFlowContext,
    ) -> Self {
        Self {
            classifier,
            context,
        }
    }

    /// Returns the context snapshot.
    pub fn context(&self) -> &ControlFlowContext {
        &self.context
    }

    /// Returns the kind of expected control flow, if any.
    pub fn classify<'a>(&self, error: impl Into<RawError<'a>>) -> Option<ControlFlowKind> {
        self.classifier.classify(error, &self.context)
    }

    /// Returns true if the failure is expected in this context.
    pub fn is_expected<'a>(&self, error: impl Into<RawError<'a>>) -> bool {
        self.classify(error).is_some()
    }

    /// Turns an expected failure into `Ok(None)`; other failures pass through.
    pub fn absorb<T, E>(&self, result: Result<T, E>) -> Result<Option<T>, E>
    where
        E: StdError + 'static,
    {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => match self.classify(RawError::Error(&err)) {
                Some(kind) => {
                    tracing::debug!(
                        kind = %kind,
                        operation = ?self.context.operation,
                        error = %err,
                        "absorbed expected control-flow error"
                    );
                    Ok(None)
                }
                None => Err(err),
            },
        }
    }
}

/// Absorbs an expected control-flow failure using the built-in pattern tables.
///
/// Returns `Ok(None)` when the error is expected in `context`, the original
/// error otherwise.
pub fn absorb_control_flow<T, E>(
    result: Result<T, E>,
    context: &ControlFlowContext,
) -> Result<Option<T>, E>
where
    E: StdError + 'static,
{
    ControlFlowGuard::new(*context).absorb(result)
}
