//! Newline-delimited JSON records read by the `streamguard` binary.
//!
//! Each line holds either `{"error": <any>, "context": {...}}` or a bare
//! error value. Each line produces one [`Verdict`].

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::{ControlFlowClassifier, ControlFlowContext, ControlFlowKind, RawError};

/// Errors that can occur while decoding an input line.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("invalid context: {0}")]
    InvalidContext(#[source] serde_json::Error),
}

/// An error value with an optional per-record context.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRecord {
    pub error: Value,
    pub context: Option<ControlFlowContext>,
}

impl InputRecord {
    /// Parses one input line.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(line).map_err(RecordError::InvalidJson)?;

        match value {
            Value::Object(mut map) if map.contains_key("error") => {
                let context = match map.remove("context") {
                    None | Some(Value::Null) => None,
                    Some(raw) => {
                        Some(serde_json::from_value(raw).map_err(RecordError::InvalidContext)?)
                    }
                };
                let error = map.remove("error").unwrap_or(Value::Null);
                Ok(Self { error, context })
            }
            other => Ok(Self {
                error: other,
                context: None,
            }),
        }
    }

    /// The record's own context, or `fallback` when it has none.
    pub fn context_or(&self, fallback: ControlFlowContext) -> ControlFlowContext {
        self.context.unwrap_or(fallback)
    }
}

/// The classification result written for each input line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub expected: bool,
    pub kind: Option<ControlFlowKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Verdict {
    pub fn from_kind(kind: Option<ControlFlowKind>) -> Self {
        Self {
            expected: kind.is_some(),
            kind,
            error: None,
        }
    }

    /// Verdict for a line that could not be decoded. Never expected.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            expected: false,
            kind: None,
            error: Some(reason.into()),
        }
    }
}

/// Classifies a single error value under `context`.
pub fn evaluate<'a>(
    classifier: &ControlFlowClassifier,
    error: impl Into<RawError<'a>>,
    context: &ControlFlowContext,
) -> Verdict {
    Verdict::from_kind(classifier.classify(error, context))
}

/// Decodes and classifies one input line.
pub fn evaluate_line(
    classifier: &ControlFlowClassifier,
    line: &str,
    fallback: ControlFlowContext,
) -> Result<Verdict, RecordError> {
    let record = InputRecord::parse(line)?;
    let context = record.context_or(fallback);
    Ok(evaluate(classifier, &record.error, &context))
}
