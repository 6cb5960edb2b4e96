// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token refresh coordination: at most one refresh exchange in flight.
//!
//! Every request that needs 401 recovery goes through [`TokenRefreshCoordinator::join`],
//! which makes the "start a refresh or wait for the running one" decision under
//! a single lock. The first joiner leads; later joiners queue behind it. The
//! queue is drained exactly once, either to success or to failure.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use uuid::Uuid;

use crate::client::RequestOptions;
use crate::error::{ApiError, RefreshFailure};
use crate::transport::{HttpResponse, Method};

/// Phase of the refresh state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    Idle,
    Refreshing,
    /// Transient: cleanup after a failed exchange.
    Failed,
}

impl fmt::Display for RefreshPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Refreshing => f.write_str("refreshing"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Session lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A refresh exchange rotated the token pair.
    Refreshed,
    /// The session could not be recovered. Emitted once per failure episode.
    Expired { reason: RefreshFailure },
}

/// Single-slot handler invoked on irrecoverable refresh failure.
pub type RefreshFailureCallback = Arc<dyn Fn(&RefreshFailure) + Send + Sync>;

/// Everything needed to issue (or re-issue) a request.
#[derive(Debug, Clone)]
pub struct ReplayRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub options: RequestOptions,
    /// Effective timeout for this request.
    pub timeout: Duration,
}

/// A request suspended until the in-flight refresh resolves.
pub struct PendingOperation {
    id: Uuid,
    request: ReplayRequest,
    deadline: Instant,
    resolve: oneshot::Sender<Result<HttpResponse, ApiError>>,
}

impl PendingOperation {
    pub fn new(
        request: ReplayRequest,
        deadline: Instant,
    ) -> (Self, oneshot::Receiver<Result<HttpResponse, ApiError>>) {
        let (tx, rx) = oneshot::channel();
        (Self { id: Uuid::new_v4(), request, deadline, resolve: tx }, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &ReplayRequest {
        &self.request
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// The caller stopped waiting (timed out or dropped).
    pub fn is_abandoned(&self) -> bool {
        self.resolve.is_closed()
    }

    pub fn resolve(self, result: Result<HttpResponse, ApiError>) {
        let _ = self.resolve.send(result);
    }
}

impl fmt::Debug for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOperation")
            .field("id", &self.id)
            .field("method", &self.request.method)
            .field("path", &self.request.path)
            .finish()
    }
}

/// Outcome of [`TokenRefreshCoordinator::join`].
#[derive(Debug)]
pub enum Joined {
    /// The caller must start the refresh exchange. Its operation is queued first.
    Lead,
    /// A refresh is already running; the operation was queued behind it.
    Queued,
    /// The active token already differs from the one that got the 401.
    /// Replay with this token; no exchange needed.
    Retry(String),
    /// A failure episode is being cleaned up; fail immediately.
    Rejected(RefreshFailure),
}

struct State {
    token: Option<String>,
    phase: RefreshPhase,
    queue: VecDeque<PendingOperation>,
    last_failure: Option<RefreshFailure>,
    /// Token that was active when the last failure episode began.
    failed_token: Option<String>,
}

/// Owns the active access token, the refresh phase, and the pending queue.
///
/// Shared via `Arc` between the API client and the session controller.
pub struct TokenRefreshCoordinator {
    state: Mutex<State>,
    callback: Mutex<Option<RefreshFailureCallback>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl TokenRefreshCoordinator {
    pub fn new() -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(16);
        Arc::new(Self {
            state: Mutex::new(State {
                token: None,
                phase: RefreshPhase::Idle,
                queue: VecDeque::new(),
                last_failure: None,
                failed_token: None,
            }),
            callback: Mutex::new(None),
            event_tx,
        })
    }

    pub fn current_token(&self) -> Option<String> {
        self.state.lock().token.clone()
    }

    /// Set or clear the active access token. Last writer wins.
    pub fn set_token(&self, token: Option<String>) {
        let mut state = self.state.lock();
        if token.is_some() {
            state.failed_token = None;
        }
        state.token = token;
    }

    pub fn phase(&self) -> RefreshPhase {
        self.state.lock().phase
    }

    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Replace or clear the failure callback.
    pub fn set_failure_callback(&self, callback: Option<RefreshFailureCallback>) {
        *self.callback.lock() = callback;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Decide whether `op` leads a new refresh, queues behind the running one,
    /// or can skip the exchange entirely.
    ///
    /// `sent_with` is the token the failed request carried. A late 401 for the
    /// token a finished failure episode already invalidated is rejected with
    /// that episode's reason instead of starting a new one.
    pub fn join(&self, op: PendingOperation, sent_with: Option<&str>) -> Joined {
        let mut state = self.state.lock();
        match state.phase {
            RefreshPhase::Refreshing => {
                tracing::debug!(op_id = %op.id, path = %op.request.path, "queued behind in-flight refresh");
                state.queue.push_back(op);
                Joined::Queued
            }
            RefreshPhase::Failed => Joined::Rejected(
                state.last_failure.clone().unwrap_or(RefreshFailure::MissingRefreshToken),
            ),
            RefreshPhase::Idle => {
                if let Some(ref active) = state.token {
                    if Some(active.as_str()) != sent_with {
                        return Joined::Retry(active.clone());
                    }
                } else if sent_with.is_some() && state.failed_token.as_deref() == sent_with {
                    if let Some(ref reason) = state.last_failure {
                        tracing::debug!(op_id = %op.id, path = %op.request.path, "401 for an already expired token");
                        return Joined::Rejected(reason.clone());
                    }
                }
                tracing::debug!(op_id = %op.id, path = %op.request.path, "starting token refresh");
                state.phase = RefreshPhase::Refreshing;
                state.queue.push_back(op);
                Joined::Lead
            }
        }
    }

    /// Install the rotated token, return to `Idle`, and hand back the queue in
    /// FIFO order for replay.
    pub fn complete_success(&self, access_token: String) -> Vec<PendingOperation> {
        let drained = {
            let mut state = self.state.lock();
            state.token = Some(access_token);
            state.phase = RefreshPhase::Idle;
            state.last_failure = None;
            state.failed_token = None;
            state.queue.drain(..).collect()
        };
        let _ = self.event_tx.send(SessionEvent::Refreshed);
        drained
    }

    /// Enter `Failed`, drop the active token, and hand back the queue for
    /// rejection.
    pub fn begin_failure(&self, reason: RefreshFailure) -> Vec<PendingOperation> {
        let mut state = self.state.lock();
        state.phase = RefreshPhase::Failed;
        state.failed_token = state.token.take();
        state.last_failure = Some(reason);
        state.queue.drain(..).collect()
    }

    /// Invoke the callback and broadcast [`SessionEvent::Expired`].
    pub fn notify_failure(&self, reason: &RefreshFailure) {
        let callback = self.callback.lock().clone();
        if let Some(cb) = callback {
            cb(reason);
        }
        let _ = self.event_tx.send(SessionEvent::Expired { reason: reason.clone() });
    }

    /// Leave `Failed`; a later sign-in starts from a clean slate.
    pub fn finish_failure(&self) {
        let mut state = self.state.lock();
        if state.phase == RefreshPhase::Failed {
            state.phase = RefreshPhase::Idle;
        }
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
