//! Integration tests for control-flow classification as seen by the
//! stdin stream loop, the cancel handler and the shutdown sequencer.

use serde_json::json;
use std::io;
use streamguard::config::StreamGuardConfig;
use streamguard::error::{
    absorb_control_flow, classify_control_flow, get_error_metadata, is_cancellation_like_error,
    is_expected_control_flow_error, is_no_active_task_like_error, is_stream_teardown_like_error,
    ControlFlowContext, ControlFlowKind, Operation, TaskFailure,
};

fn stream(operation: Operation) -> ControlFlowContext {
    ControlFlowContext::stream().with_operation(operation)
}

// ============================================================================
// Stream loop: interrupted tasks
// ============================================================================

#[test]
fn test_runtime_abort_is_expected_only_in_stream_mode() {
    let err = TaskFailure::new("AbortError: aborted");

    assert!(is_expected_control_flow_error(&err, &stream(Operation::Runtime)));
    assert!(!is_expected_control_flow_error(
        &err,
        &ControlFlowContext::single_shot().with_operation(Operation::Runtime)
    ));
}

#[test]
fn test_client_abort_without_intent_is_a_real_failure() {
    let err = TaskFailure::new("AbortError: aborted");
    assert!(!is_expected_control_flow_error(&err, &stream(Operation::Client)));
}

#[test]
fn test_named_abort_without_matching_message() {
    let err = TaskFailure::new("stop now").with_name("AbortError");
    assert_eq!(
        classify_control_flow(&err, &stream(Operation::Runtime)),
        Some(ControlFlowKind::Cancellation)
    );
}

#[test]
fn test_plain_string_uses_stringify_fallback() {
    assert!(is_cancellation_like_error("AbortError: operation aborted"));
    assert_eq!(
        get_error_metadata("AbortError: operation aborted").normalized_message,
        "aborterror: operation aborted"
    );
}

// ============================================================================
// Cancel handler: races with settled tasks
// ============================================================================

#[test]
fn test_cancel_after_task_settled() {
    for message in [
        "task not found",
        "No active task",
        "no task to cancel",
        "Unable to find task 42",
        "task already completed",
        "task already cancelled",
        "task already canceled",
    ] {
        let err = TaskFailure::new(message);
        assert!(is_no_active_task_like_error(&err), "{message}");
        assert!(
            is_expected_control_flow_error(&err, &stream(Operation::Cancel)),
            "{message}"
        );
    }
}

#[test]
fn test_absorb_cancel_race() {
    let ctx = stream(Operation::Cancel);
    let outcome: Result<&str, TaskFailure> = Err(TaskFailure::new("task not found"));
    assert_eq!(absorb_control_flow(outcome, &ctx).unwrap(), None);

    let outcome: Result<&str, TaskFailure> = Ok("cancelled task 7");
    assert_eq!(
        absorb_control_flow(outcome, &ctx).unwrap(),
        Some("cancelled task 7")
    );
}

// ============================================================================
// Shutdown sequencer: stream teardown
// ============================================================================

#[test]
fn test_broken_pipe_during_shutdown() {
    let ctx = stream(Operation::Runtime).with_shutting_down(true);

    assert!(is_expected_control_flow_error(
        &json!({ "code": "EPIPE", "message": "broken pipe" }),
        &ctx
    ));
    assert!(is_expected_control_flow_error(
        &io::Error::from(io::ErrorKind::BrokenPipe),
        &ctx
    ));
    assert!(is_expected_control_flow_error("socket hang up", &ctx));
}

#[test]
fn test_teardown_codes() {
    for code in ["EPIPE", "ECONNRESET", "ERR_STREAM_DESTROYED", "ERR_STREAM_PREMATURE_CLOSE"] {
        assert!(is_stream_teardown_like_error(
            &json!({ "code": code, "message": "write failed" })
        ));
    }
}

#[test]
fn test_shutdown_absorbs_io_teardown_but_not_other_io_errors() {
    let ctx = stream(Operation::Shutdown).with_shutting_down(true);

    let reset: Result<(), io::Error> = Err(io::Error::from(io::ErrorKind::ConnectionReset));
    assert!(absorb_control_flow(reset, &ctx).unwrap().is_none());

    let denied: Result<(), io::Error> = Err(io::Error::new(
        io::ErrorKind::PermissionDenied,
        "permission denied",
    ));
    assert!(absorb_control_flow(denied, &ctx).is_err());
}

// ============================================================================
// Unrelated failures
// ============================================================================

#[test]
fn test_unrelated_failures_always_surface() {
    let contexts = [
        stream(Operation::Runtime),
        stream(Operation::Client).with_cancel_requested(true),
        stream(Operation::Shutdown).with_shutting_down(true),
    ];

    for message in ["network timeout", "authentication failed"] {
        assert!(!is_cancellation_like_error(message));
        assert!(!is_no_active_task_like_error(message));
        assert!(!is_stream_teardown_like_error(message));
        for ctx in &contexts {
            assert!(!is_expected_control_flow_error(message, ctx));
        }
    }
}

// ============================================================================
// Configured patterns
// ============================================================================

#[test]
fn test_configured_classifier_keeps_builtin_verdicts() {
    let config = StreamGuardConfig::from_toml_str(
        r#"
        [stream_teardown]
        codes = ["ENOTCONN"]
        messages = ["Transport closed"]
        "#,
    )
    .unwrap();
    let classifier = config.classifier();
    let ctx = stream(Operation::Runtime).with_shutting_down(true);

    assert_eq!(
        classifier.classify(&json!({ "code": "ENOTCONN", "message": "x" }), &ctx),
        Some(ControlFlowKind::StreamTeardown)
    );
    assert!(classifier.is_expected("transport closed unexpectedly", &ctx));
    assert!(classifier.is_expected("broken pipe", &ctx));
    assert!(!is_expected_control_flow_error("transport closed unexpectedly", &ctx));
}
