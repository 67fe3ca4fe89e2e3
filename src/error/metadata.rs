//! Normalized view over the error shapes a stdin stream can hand us.
//!
//! Failures reach the classifier as Rust errors, as JSON values forwarded
//! from the task runner, or as bare strings. Each is decoded into an
//! [`ErrorMetadata`] with lower-cased copies for case-insensitive matching.

use std::error::Error as StdError;
use std::io;

use serde_json::Value;
use thiserror::Error;

/// A failure forwarded from the task runner, carrying an optional name and code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TaskFailure {
    message: String,
    name: Option<String>,
    code: Option<String>,
}

impl TaskFailure {
    /// Creates a failure with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            name: None,
            code: None,
        }
    }

    /// Sets the error name (e.g. `AbortError`).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the error code (e.g. `ABORT_ERR`).
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the error name, if set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the error code, if set.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// The shapes an error value can take before it is normalized.
#[derive(Debug, Clone, Copy)]
pub enum RawError<'a> {
    /// A standard error object.
    Error(&'a (dyn StdError + 'static)),
    /// Any JSON value, structured or primitive.
    Value(&'a Value),
    /// A plain string.
    Text(&'a str),
}

impl<'a> From<&'a (dyn StdError + 'static)> for RawError<'a> {
    fn from(error: &'a (dyn StdError + 'static)) -> Self {
        RawError::Error(error)
    }
}

impl<'a> From<&'a TaskFailure> for RawError<'a> {
    fn from(error: &'a TaskFailure) -> Self {
        RawError::Error(error)
    }
}

impl<'a> From<&'a io::Error> for RawError<'a> {
    fn from(error: &'a io::Error) -> Self {
        RawError::Error(error)
    }
}

impl<'a> From<&'a Value> for RawError<'a> {
    fn from(value: &'a Value) -> Self {
        RawError::Value(value)
    }
}

impl<'a> From<&'a str> for RawError<'a> {
    fn from(text: &'a str) -> Self {
        RawError::Text(text)
    }
}

impl<'a> From<&'a String> for RawError<'a> {
    fn from(text: &'a String) -> Self {
        RawError::Text(text.as_str())
    }
}

/// Message used for a JSON object without a string `message`.
///
/// Other fields never become matchable text.
pub const OPAQUE_OBJECT_MESSAGE: &str = "[object Object]";

/// Normalized message, name and code of a single error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMetadata {
    pub message: String,
    pub normalized_message: String,
    pub name: Option<String>,
    pub normalized_name: Option<String>,
    pub code: Option<String>,
}

impl ErrorMetadata {
    fn build(message: String, name: Option<String>, code: Option<String>) -> Self {
        Self {
            normalized_message: message.to_lowercase(),
            normalized_name: name.as_deref().map(str::to_lowercase),
            message,
            name,
            code,
        }
    }

    /// Decodes any supported error shape. Never fails.
    pub fn from_raw(error: RawError<'_>) -> Self {
        match error {
            RawError::Error(error) => Self::from_error(error),
            RawError::Value(value) => Self::from_value(value),
            RawError::Text(text) => Self::build(text.to_string(), None, None),
        }
    }

    fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let message = error.to_string();
        let mut name = None;
        let mut code = None;

        // The first recognized error in the source chain decides name and code.
        let mut current = Some(error);
        while let Some(err) = current {
            if let Some(failure) = err.downcast_ref::<TaskFailure>() {
                name = failure.name.clone();
                code = failure.code.clone();
                break;
            }
            if let Some(io_err) = err.downcast_ref::<io::Error>() {
                code = io_error_code(io_err).map(str::to_string);
                break;
            }
            current = err.source();
        }

        Self::build(message, name, code)
    }

    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                let field = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
                let message =
                    field("message").unwrap_or_else(|| OPAQUE_OBJECT_MESSAGE.to_string());
                Self::build(message, field("name"), field("code"))
            }
            Value::String(text) => Self::build(text.clone(), None, None),
            other => Self::build(other.to_string(), None, None),
        }
    }
}

/// Shorthand for [`ErrorMetadata::from_raw`].
pub fn get_error_metadata<'a>(error: impl Into<RawError<'a>>) -> ErrorMetadata {
    ErrorMetadata::from_raw(error.into())
}

/// Maps an I/O error kind to the errno-style code used by the pattern tables.
pub fn io_error_code(error: &io::Error) -> Option<&'static str> {
    match error.kind() {
        io::ErrorKind::BrokenPipe => Some("EPIPE"),
        io::ErrorKind::ConnectionReset => Some("ECONNRESET"),
        io::ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
        io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
        io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
        io::ErrorKind::UnexpectedEof => Some("ERR_STREAM_PREMATURE_CLOSE"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Error)]
    #[error("stream loop failed")]
    struct Wrapped(#[source] TaskFailure);

    #[test]
    fn test_task_failure_metadata() {
        let failure = TaskFailure::new("Stop NOW")
            .with_name("AbortError")
            .with_code("ABORT_ERR");
        let meta = get_error_metadata(&failure);

        assert_eq!(meta.message, "Stop NOW");
        assert_eq!(meta.normalized_message, "stop now");
        assert_eq!(meta.name.as_deref(), Some("AbortError"));
        assert_eq!(meta.normalized_name.as_deref(), Some("aborterror"));
        assert_eq!(meta.code.as_deref(), Some("ABORT_ERR"));
    }

    #[test]
    fn test_source_chain_supplies_name_and_code() {
        let err = Wrapped(TaskFailure::new("inner").with_code("EPIPE"));
        let dyn_err: &(dyn StdError + 'static) = &err;
        let meta = get_error_metadata(dyn_err);

        assert_eq!(meta.message, "stream loop failed");
        assert_eq!(meta.code.as_deref(), Some("EPIPE"));
    }

    #[test]
    fn test_io_error_maps_kind_to_code() {
        let err = io::Error::new(io::ErrorKind::BrokenPipe, "Broken pipe (os error 32)");
        let meta = get_error_metadata(&err);

        assert_eq!(meta.code.as_deref(), Some("EPIPE"));
        assert_eq!(meta.normalized_message, "broken pipe (os error 32)");
        assert!(meta.name.is_none());
    }

    #[test]
    fn test_io_error_unmapped_kind_has_no_code() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
        assert!(get_error_metadata(&err).code.is_none());
    }

    #[test]
    fn test_object_reads_string_fields_only() {
        let value = json!({ "name": 42, "message": "Request Canceled", "code": ["EPIPE"] });
        let meta = get_error_metadata(&value);

        assert_eq!(meta.message, "Request Canceled");
        assert!(meta.name.is_none());
        assert!(meta.normalized_name.is_none());
        assert!(meta.code.is_none());
    }

    #[test]
    fn test_object_without_message_uses_opaque_text() {
        let value = json!({ "code": "EPIPE", "name": "WriteError", "detail": "aborted" });
        let meta = get_error_metadata(&value);

        assert_eq!(meta.message, OPAQUE_OBJECT_MESSAGE);
        assert_eq!(meta.normalized_message, "[object object]");
        assert_eq!(meta.code.as_deref(), Some("EPIPE"));
        assert_eq!(meta.normalized_name.as_deref(), Some("writeerror"));
    }

    #[test]
    fn test_non_string_message_uses_opaque_text() {
        let meta = get_error_metadata(&json!({ "message": { "text": "cancelled" } }));
        assert_eq!(meta.message, OPAQUE_OBJECT_MESSAGE);
    }

    #[test]
    fn test_io_error_code_table() {
        let cases = [
            (io::ErrorKind::BrokenPipe, "EPIPE"),
            (io::ErrorKind::ConnectionReset, "ECONNRESET"),
            (io::ErrorKind::ConnectionAborted, "ECONNABORTED"),
            (io::ErrorKind::ConnectionRefused, "ECONNREFUSED"),
            (io::ErrorKind::TimedOut, "ETIMEDOUT"),
            (io::ErrorKind::UnexpectedEof, "ERR_STREAM_PREMATURE_CLOSE"),
        ];

        for (kind, code) in cases {
            let err = io::Error::from(kind);
            assert_eq!(io_error_code(&err), Some(code), "{kind:?}");
            assert_eq!(get_error_metadata(&err).code.as_deref(), Some(code));
        }
    }

    #[test]
    fn test_primitives_fall_back_to_text() {
        assert_eq!(get_error_metadata(&json!("Aborted")).message, "Aborted");
        assert_eq!(get_error_metadata(&json!(17)).message, "17");
        assert_eq!(get_error_metadata(&json!(null)).message, "null");
        assert_eq!(get_error_metadata(&json!(true)).message, "true");
    }

    #[test]
    fn test_plain_string_input() {
        let meta = get_error_metadata("AbortError: operation aborted");
        assert_eq!(meta.normalized_message, "aborterror: operation aborted");
        assert!(meta.code.is_none());
    }
}
