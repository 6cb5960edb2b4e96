// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated API client with transparent token refresh.
//!
//! Every request carries `Authorization: Bearer <token>` when a token is set.
//! A 401 on any path other than sign-in or refresh suspends the request,
//! joins the [`TokenRefreshCoordinator`], and replays it with the rotated
//! token once the single in-flight exchange succeeds.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::error::{ApiError, RefreshFailure};
use crate::refresh::{
    Joined, PendingOperation, RefreshFailureCallback, ReplayRequest, SessionEvent,
    TokenRefreshCoordinator,
};
use crate::store::{KeyValueStore, MemoryStore, TokenPair, TokenVault};
use crate::transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError};

pub const REFRESH_PATH: &str = "/auth/refresh";
pub const SIGN_IN_PATH: &str = "/auth/google";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

const DEFAULT_ERROR_MESSAGE: &str = "Request failed";

/// Standard `{ success, data, message }` response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Per-request overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: String,
    timeout: Duration,
    refresh_timeout: Duration,
    transport: Arc<dyn Transport>,
    store: Option<Arc<dyn KeyValueStore>>,
    coordinator: Option<Arc<TokenRefreshCoordinator>>,
}

impl ApiClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn coordinator(mut self, coordinator: Arc<TokenRefreshCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn build(self) -> ApiClient {
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let coordinator = self.coordinator.unwrap_or_else(TokenRefreshCoordinator::new);
        ApiClient {
            inner: Arc::new(ClientInner {
                base_url: self.base_url.trim_end_matches('/').to_owned(),
                timeout: self.timeout,
                refresh_timeout: self.refresh_timeout,
                transport: self.transport,
                vault: TokenVault::new(store),
                coordinator,
            }),
        }
    }
}

/// Cheap to clone; clones share the token, queue, and transport.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: String,
    timeout: Duration,
    refresh_timeout: Duration,
    transport: Arc<dyn Transport>,
    vault: TokenVault,
    coordinator: Arc<TokenRefreshCoordinator>,
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            refresh_timeout: DEFAULT_TIMEOUT,
            transport,
            store: None,
            coordinator: None,
        }
    }

    /// Build a client over the real HTTP transport from CLI/env config.
    pub fn from_config(
        config: &ClientConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, TransportError> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::builder(config.api_url.clone(), transport)
            .timeout(config.timeout())
            .refresh_timeout(config.refresh_timeout())
            .store(store)
            .build())
    }

    /// Set or clear the in-memory access token. No network call.
    pub fn set_auth_token(&self, token: Option<String>) {
        self.inner.coordinator.set_token(token);
    }

    pub fn auth_token(&self) -> Option<String> {
        self.inner.coordinator.current_token()
    }

    /// Register the single handler run when a refresh cannot be completed.
    pub fn set_refresh_failure_callback(&self, callback: Option<RefreshFailureCallback>) {
        self.inner.coordinator.set_failure_callback(callback);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.coordinator.subscribe()
    }

    pub fn coordinator(&self) -> &Arc<TokenRefreshCoordinator> {
        &self.inner.coordinator
    }

    pub fn vault(&self) -> &TokenVault {
        &self.inner.vault
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(Method::Get, path, None, options).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(Method::Post, path, Some(encode(body)?), options).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(Method::Put, path, Some(encode(body)?), options).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(Method::Patch, path, Some(encode(body)?), options).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(Method::Delete, path, None, options).await
    }

    /// Issue a request and decode its successful body.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let timeout = options.timeout.unwrap_or(self.inner.timeout);
        let deadline = Instant::now() + timeout;
        let call = ReplayRequest { method, path: path.to_owned(), body, options, timeout };
        let resp = self.inner.execute(call, deadline).await?;
        decode(&resp)
    }
}

impl ClientInner {
    async fn execute(
        self: &Arc<Self>,
        call: ReplayRequest,
        deadline: Instant,
    ) -> Result<HttpResponse, ApiError> {
        let token = self.coordinator.current_token();
        let resp = self.send_once(&call, token.as_deref(), deadline).await?;
        if resp.status != 401 {
            return check_status(resp);
        }
        if is_loop_guarded(&call.path) {
            tracing::warn!(path = %call.path, "401 from auth endpoint, not refreshing");
            return Err(ApiError::RefreshLoopGuard { path: call.path });
        }
        self.recover(call, token, deadline).await
    }

    /// Wait for (or start) the refresh exchange, then take the replay result.
    async fn recover(
        self: &Arc<Self>,
        call: ReplayRequest,
        sent_with: Option<String>,
        deadline: Instant,
    ) -> Result<HttpResponse, ApiError> {
        let timeout = call.timeout;
        let (op, rx) = PendingOperation::new(call.clone(), deadline);
        match self.coordinator.join(op, sent_with.as_deref()) {
            Joined::Lead => {
                let inner = Arc::clone(self);
                tokio::spawn(async move { inner.run_refresh().await });
            }
            Joined::Queued => {}
            Joined::Retry(token) => return self.replay(&call, &token, deadline).await,
            Joined::Rejected(reason) => return Err(ApiError::SessionExpired(reason)),
        }

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ApiError::Transport("request dropped during token refresh".into())),
            Err(_) => Err(ApiError::Timeout { timeout }),
        }
    }

    /// Run one refresh exchange and settle every queued operation.
    ///
    /// Runs detached from the triggering request so cancelling that request
    /// never cancels the exchange.
    async fn run_refresh(self: Arc<Self>) {
        match self.exchange().await {
            Ok(pair) => {
                if let Err(e) = self.vault.save_pair(&pair).await {
                    tracing::warn!(err = %e, "failed to persist rotated tokens");
                }
                let token = pair.access_token;
                let ops = self.coordinator.complete_success(token.clone());
                tracing::info!(queued = ops.len(), "token refreshed, replaying queued requests");

                let this = &self;
                let replays = ops.into_iter().map(|op| {
                    let token = token.as_str();
                    async move {
                        if op.is_abandoned() {
                            tracing::debug!(op_id = %op.id(), "discarding abandoned request");
                            return;
                        }
                        let result = this.replay(op.request(), token, op.deadline()).await;
                        op.resolve(result);
                    }
                });
                join_all(replays).await;
            }
            Err(reason) => {
                tracing::warn!(err = %reason, "token refresh failed, invalidating session");
                let ops = self.coordinator.begin_failure(reason.clone());
                self.vault.clear_tokens().await;
                for op in ops {
                    op.resolve(Err(ApiError::SessionExpired(reason.clone())));
                }
                self.coordinator.notify_failure(&reason);
                self.coordinator.finish_failure();
            }
        }
    }

    /// Exchange the persisted refresh token for a rotated pair.
    async fn exchange(&self) -> Result<TokenPair, RefreshFailure> {
        let Some(refresh_token) = self.vault.refresh_token().await else {
            return Err(RefreshFailure::MissingRefreshToken);
        };
        let request = HttpRequest {
            method: Method::Post,
            url: self.url(REFRESH_PATH),
            headers: default_headers(),
            query: Vec::new(),
            body: Some(serde_json::json!({ "refreshToken": refresh_token })),
            timeout: self.refresh_timeout,
        };

        let resp = match tokio::time::timeout(self.refresh_timeout, self.transport.send(request))
            .await
        {
            Err(_) | Ok(Err(TransportError::Timeout)) => return Err(RefreshFailure::TimedOut),
            Ok(Err(e)) => return Err(RefreshFailure::Exchange(e.to_string())),
            Ok(Ok(resp)) => resp,
        };
        if !resp.is_success() {
            return Err(RefreshFailure::Rejected {
                status: resp.status,
                message: error_message(&resp.body),
            });
        }
        let envelope: ApiResponse<TokenPair> = serde_json::from_slice(&resp.body)
            .map_err(|e| RefreshFailure::Exchange(format!("invalid refresh response: {e}")))?;
        Ok(envelope.data)
    }

    /// Re-issue a request with a fresh token. Never re-enters refresh.
    async fn replay(
        &self,
        call: &ReplayRequest,
        token: &str,
        deadline: Instant,
    ) -> Result<HttpResponse, ApiError> {
        tracing::debug!(method = %call.method, path = %call.path, "replaying request");
        self.send_once(call, Some(token), deadline)
            .await
            .and_then(check_status)
            .map_err(|e| ApiError::ReplayFailed(Box::new(e)))
    }

    async fn send_once(
        &self,
        call: &ReplayRequest,
        token: Option<&str>,
        deadline: Instant,
    ) -> Result<HttpResponse, ApiError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ApiError::Timeout { timeout: call.timeout });
        }

        let mut headers = default_headers();
        if let Some(token) = token {
            headers.push(("Authorization".to_owned(), format!("Bearer {token}")));
        }
        headers.extend(call.options.headers.iter().cloned());
        let request = HttpRequest {
            method: call.method,
            url: self.url(&call.path),
            headers,
            query: call.options.query.clone(),
            body: call.body.clone(),
            timeout: remaining,
        };

        match tokio::time::timeout_at(deadline, self.transport.send(request)).await {
            Err(_) | Ok(Err(TransportError::Timeout)) => {
                Err(ApiError::Timeout { timeout: call.timeout })
            }
            Ok(Err(e)) => Err(ApiError::Transport(e.to_string())),
            Ok(Ok(resp)) => {
                tracing::debug!(method = %call.method, path = %call.path, status = resp.status, "response");
                Ok(resp)
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn default_headers() -> Vec<(String, String)> {
    vec![
        ("Content-Type".to_owned(), "application/json".to_owned()),
        ("Accept".to_owned(), "application/json".to_owned()),
    ]
}

fn is_loop_guarded(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path).trim_end_matches('/');
    path == REFRESH_PATH || path == SIGN_IN_PATH
}

fn check_status(resp: HttpResponse) -> Result<HttpResponse, ApiError> {
    if resp.is_success() {
        Ok(resp)
    } else {
        Err(ApiError::Application { status: resp.status, message: error_message(&resp.body) })
    }
}

/// Server-supplied `message` field, or the generic default.
fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_owned())
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Decode(format!("request body: {e}")))
}

fn decode<T: DeserializeOwned>(resp: &HttpResponse) -> Result<T, ApiError> {
    let result = if resp.body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_value(serde_json::Value::Null)
    } else {
        serde_json::from_slice(&resp.body)
    };
    result.map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
