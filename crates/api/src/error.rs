// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Machine-readable error codes surfaced by [`ApiError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Transport,
    Timeout,
    Application,
    SessionExpired,
    RefreshLoopGuard,
    ReplayFailed,
    Decode,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "TRANSPORT",
            Self::Timeout => "REQUEST_TIMEOUT",
            Self::Application => "APPLICATION",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::RefreshLoopGuard => "REFRESH_LOOP_GUARD",
            Self::ReplayFailed => "REPLAY_FAILED",
            Self::Decode => "DECODE",
        }
    }

    /// Whether the user should be treated as logged out.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a refresh exchange could not produce a new token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// No refresh token was persisted; no exchange was attempted.
    MissingRefreshToken,
    /// The refresh endpoint answered with a non-2xx status.
    Rejected { status: u16, message: String },
    /// The exchange did not complete before the refresh timeout.
    TimedOut,
    /// Network failure or an unreadable response.
    Exchange(String),
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRefreshToken => f.write_str("no refresh token available"),
            Self::Rejected { status, message } => {
                write!(f, "refresh rejected ({status}): {message}")
            }
            Self::TimedOut => f.write_str("refresh timed out"),
            Self::Exchange(e) => write!(f, "refresh exchange failed: {e}"),
        }
    }
}

/// Errors returned to callers of [`crate::client::ApiClient`].
///
/// The variants keep three outcomes apart: an error where no refresh was
/// attempted (`Transport`, `Timeout`, `Application`, `RefreshLoopGuard`),
/// an error after a successful refresh (`ReplayFailed`), and an
/// irrecoverable session (`SessionExpired`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Connection, DNS, or TLS failure. Never retried automatically.
    Transport(String),
    /// The request's deadline elapsed.
    Timeout { timeout: Duration },
    /// Non-2xx, non-401 response (or a 401 with no recovery path).
    Application { status: u16, message: String },
    /// A 401 could not be recovered because the refresh failed.
    SessionExpired(RefreshFailure),
    /// A 401 came back from the sign-in or refresh endpoint itself.
    RefreshLoopGuard { path: String },
    /// The refresh succeeded but replaying the request still failed.
    ReplayFailed(Box<ApiError>),
    /// A 2xx body could not be decoded into the requested type.
    Decode(String),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transport(_) => ErrorCode::Transport,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Application { .. } => ErrorCode::Application,
            Self::SessionExpired(_) => ErrorCode::SessionExpired,
            Self::RefreshLoopGuard { .. } => ErrorCode::RefreshLoopGuard,
            Self::ReplayFailed(_) => ErrorCode::ReplayFailed,
            Self::Decode(_) => ErrorCode::Decode,
        }
    }

    /// HTTP status carried by the error, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Application { status, .. } => Some(*status),
            Self::RefreshLoopGuard { .. } => Some(401),
            Self::ReplayFailed(inner) => inner.status(),
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Timeout { timeout } => {
                write!(f, "request timed out after {}ms", timeout.as_millis())
            }
            Self::Application { message, .. } => f.write_str(message),
            Self::SessionExpired(reason) => write!(f, "session expired: {reason}"),
            Self::RefreshLoopGuard { path } => {
                write!(f, "unauthorized on {path}; not attempting token refresh")
            }
            Self::ReplayFailed(inner) => write!(f, "request failed after token refresh: {inner}"),
            Self::Decode(e) => write!(f, "invalid response body: {e}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReplayFailed(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }
}

/// Errors from a [`crate::store::KeyValueStore`] backend.
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serde(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "storage io: {e}"),
            Self::Serde(e) => write!(f, "storage encoding: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serde(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e)
    }
}

/// Errors from [`crate::session::SessionController`] operations.
#[derive(Debug)]
pub enum SessionError {
    Api(ApiError),
    /// Sign-in succeeded at the HTTP level but the payload lacked a token or the user.
    InvalidAuthResponse,
    Store(StoreError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => e.fmt(f),
            Self::InvalidAuthResponse => f.write_str("Invalid authentication response from server"),
            Self::Store(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Api(e) => Some(e),
            Self::InvalidAuthResponse => None,
            Self::Store(e) => Some(e),
        }
    }
}

impl From<ApiError> for SessionError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
