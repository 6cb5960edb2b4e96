// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process backend double for client tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::json;

use crate::client::{ApiClient, REFRESH_PATH};
use crate::refresh::TokenRefreshCoordinator;
use crate::store::{keys, KeyValueStore, MemoryStore};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};

pub const BASE_URL: &str = "http://backend.test";

/// One request as seen on the wire.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<serde_json::Value>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

struct BackendState {
    valid_access: String,
    valid_refresh: Option<String>,
    generation: u32,
    log: Vec<Recorded>,
    refresh_override: Option<(u16, String)>,
    refresh_unreachable: bool,
    fixed: HashMap<String, (u16, String)>,
    delays: HashMap<String, Duration>,
}

/// Models the auth contract: bearer check on every path, rotating refresh.
///
/// Tokens are named `t{n}`/`r{n}`; each successful refresh increments `n`.
pub struct FakeBackend {
    state: Mutex<BackendState>,
    refresh_delay: Duration,
}

impl FakeBackend {
    pub fn new(access: &str, refresh: &str) -> Arc<Self> {
        Self::with_refresh_delay(access, refresh, Duration::ZERO)
    }

    pub fn with_refresh_delay(access: &str, refresh: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BackendState {
                valid_access: access.to_owned(),
                valid_refresh: Some(refresh.to_owned()),
                generation: 1,
                log: Vec::new(),
                refresh_override: None,
                refresh_unreachable: false,
                fixed: HashMap::new(),
                delays: HashMap::new(),
            }),
            refresh_delay: delay,
        })
    }

    /// Invalidate the current access token server-side.
    pub fn expire_access(&self) {
        self.state.lock().valid_access = "<expired>".to_owned();
    }

    /// Make the refresh endpoint answer with a fixed status and message.
    pub fn reject_refresh(&self, status: u16, message: &str) {
        self.state.lock().refresh_override = Some((status, message.to_owned()));
    }

    /// Fail every refresh exchange at the connection level.
    pub fn refresh_unreachable(&self) {
        self.state.lock().refresh_unreachable = true;
    }

    /// Always answer `path` with `status` and the raw `body`, skipping the bearer check.
    pub fn fix(&self, path: &str, status: u16, body: &str) {
        self.state.lock().fixed.insert(path.to_owned(), (status, body.to_owned()));
    }

    pub fn delay(&self, path: &str, delay: Duration) {
        self.state.lock().delays.insert(path.to_owned(), delay);
    }

    pub fn log(&self) -> Vec<Recorded> {
        self.state.lock().log.clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<Recorded> {
        self.log().into_iter().filter(|r| r.path == path).collect()
    }

    pub fn refresh_calls(&self) -> usize {
        self.calls_to(REFRESH_PATH).len()
    }

    fn record(&self, request: &HttpRequest) -> String {
        let path = request.url.strip_prefix(BASE_URL).unwrap_or(&request.url).to_owned();
        self.state.lock().log.push(Recorded {
            method: request.method,
            path: path.clone(),
            authorization: request.header("Authorization").map(str::to_owned),
            body: request.body.clone(),
            query: request.query.clone(),
            headers: request.headers.clone(),
        });
        path
    }

    fn refresh(&self, request: &HttpRequest) -> HttpResponse {
        let mut state = self.state.lock();
        if let Some((status, ref message)) = state.refresh_override {
            return reply(status, json!({ "message": message }));
        }
        let presented = request
            .body
            .as_ref()
            .and_then(|b| b.get("refreshToken"))
            .and_then(|v| v.as_str())
            .map(str::to_owned);
        if presented.is_none() || presented != state.valid_refresh {
            return reply(401, json!({ "message": "Invalid refresh token" }));
        }
        state.generation += 1;
        let access = format!("t{}", state.generation);
        let refresh = format!("r{}", state.generation);
        state.valid_access = access.clone();
        state.valid_refresh = Some(refresh.clone());
        reply(
            200,
            json!({ "success": true, "data": { "accessToken": access, "refreshToken": refresh } }),
        )
    }

    fn authorized(&self, request: &HttpRequest, path: &str) -> HttpResponse {
        let state = self.state.lock();
        if let Some((status, body)) = state.fixed.get(path) {
            return HttpResponse {
                status: *status,
                headers: Vec::new(),
                body: Bytes::from(body.clone()),
            };
        }
        let expected = format!("Bearer {}", state.valid_access);
        if request.header("Authorization") != Some(expected.as_str()) {
            return reply(401, json!({ "message": "Unauthorized" }));
        }
        reply(
            200,
            json!({ "success": true, "data": { "path": path, "method": request.method.as_str() } }),
        )
    }
}

impl Transport for FakeBackend {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            let path = self.record(&request);
            if path == REFRESH_PATH {
                if !self.refresh_delay.is_zero() {
                    tokio::time::sleep(self.refresh_delay).await;
                }
                if self.state.lock().refresh_unreachable {
                    return Err(TransportError::Connect("connection refused".into()));
                }
                return Ok(self.refresh(&request));
            }
            let delay = self.state.lock().delays.get(&path).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.authorized(&request, &path))
        })
    }
}

fn reply(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse { status, headers: Vec::new(), body: Bytes::from(body.to_string()) }
}

/// Client wired to `backend`, holding `access` in memory and `refresh` in storage.
pub fn client_with(
    backend: &Arc<FakeBackend>,
    access: Option<&str>,
    refresh: Option<&str>,
) -> (ApiClient, Arc<MemoryStore>) {
    let mut entries = Vec::new();
    if let Some(a) = access {
        entries.push((keys::AUTH_TOKEN, a.to_owned()));
    }
    if let Some(r) = refresh {
        entries.push((keys::REFRESH_TOKEN, r.to_owned()));
    }
    let store = Arc::new(MemoryStore::with_entries(entries));
    let client = ApiClient::builder(BASE_URL, Arc::clone(backend) as Arc<dyn Transport>)
        .store(Arc::clone(&store) as Arc<dyn KeyValueStore>)
        .coordinator(TokenRefreshCoordinator::new())
        .build();
    client.set_auth_token(access.map(str::to_owned));
    (client, store)
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
