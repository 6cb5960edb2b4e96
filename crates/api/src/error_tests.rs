// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::{ApiError, ErrorCode, RefreshFailure, SessionError};

#[yare::parameterized(
    transport   = { ApiError::Transport("refused".into()), ErrorCode::Transport },
    timeout     = { ApiError::Timeout { timeout: Duration::from_secs(1) }, ErrorCode::Timeout },
    application = { ApiError::Application { status: 500, message: "boom".into() }, ErrorCode::Application },
    expired     = { ApiError::SessionExpired(RefreshFailure::MissingRefreshToken), ErrorCode::SessionExpired },
    loop_guard  = { ApiError::RefreshLoopGuard { path: "/auth/refresh".into() }, ErrorCode::RefreshLoopGuard },
    replay      = { ApiError::ReplayFailed(Box::new(ApiError::Transport("x".into()))), ErrorCode::ReplayFailed },
    decode      = { ApiError::Decode("eof".into()), ErrorCode::Decode },
)]
fn error_codes(err: ApiError, expected: ErrorCode) {
    assert_eq!(err.code(), expected);
}

#[test]
fn only_session_expired_is_fatal() {
    assert!(ErrorCode::SessionExpired.is_session_fatal());
    assert!(!ErrorCode::Transport.is_session_fatal());
    assert!(!ErrorCode::Timeout.is_session_fatal());
}

#[test]
fn application_error_displays_server_message() {
    let err = ApiError::Application { status: 422, message: "Email already exists".into() };
    assert_eq!(err.to_string(), "Email already exists");
    assert_eq!(err.status(), Some(422));
}

#[test]
fn replay_failure_reports_inner_status() {
    let inner = ApiError::Application { status: 401, message: "Unauthorized".into() };
    let err = ApiError::ReplayFailed(Box::new(inner));
    assert_eq!(err.status(), Some(401));
    assert!(err.to_string().contains("after token refresh"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn timeout_display_in_millis() {
    let err = ApiError::Timeout { timeout: Duration::from_millis(1500) };
    assert_eq!(err.to_string(), "request timed out after 1500ms");
}

#[test]
fn session_error_passes_api_message_through() {
    let err = SessionError::from(ApiError::Application { status: 403, message: "Forbidden".into() });
    assert_eq!(err.to_string(), "Forbidden");
    assert_eq!(
        SessionError::InvalidAuthResponse.to_string(),
        "Invalid authentication response from server"
    );
}
