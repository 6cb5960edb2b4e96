// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end flows over real HTTP against an in-process backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use wellvantage::client::ApiClient;
use wellvantage::config::ClientConfig;
use wellvantage::error::ApiError;
use wellvantage::services::clients;
use wellvantage::session::{SessionController, SESSION_EXPIRED_MESSAGE};
use wellvantage::store::{keys, FileStore, KeyValueStore};

#[derive(Default)]
struct Backend {
    access: String,
    refresh: String,
    generation: u32,
    refresh_calls: u32,
    revoked: bool,
}

type Shared = Arc<Mutex<Backend>>;

async fn sign_in(State(backend): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body.get("idToken").and_then(Value::as_str).is_none() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "message": "idToken is required" })));
    }
    let mut b = backend.lock();
    b.generation = 1;
    b.access = "t1".to_owned();
    b.refresh = "r1".to_owned();
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": {
                "accessToken": b.access,
                "refreshToken": b.refresh,
                "user": { "id": "u1", "email": "coach@example.com", "name": "Coach" }
            }
        })),
    )
}

async fn refresh(State(backend): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    // Long enough for concurrent 401s to pile up behind the exchange.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut b = backend.lock();
    b.refresh_calls += 1;
    let presented = body.get("refreshToken").and_then(Value::as_str);
    if b.revoked || presented != Some(b.refresh.as_str()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid refresh token" })));
    }
    b.generation += 1;
    b.access = format!("t{}", b.generation);
    b.refresh = format!("r{}", b.generation);
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": { "accessToken": b.access, "refreshToken": b.refresh }
        })),
    )
}

async fn list_clients(State(backend): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let expected = format!("Bearer {}", backend.lock().access);
    let presented = headers.get("authorization").and_then(|v| v.to_str().ok());
    if presented != Some(expected.as_str()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": { "clients": [{
                "id": "c1", "name": "Ana", "email": "ana@example.com", "phone": null,
                "sessionsTotal": 10, "sessionsUsed": 4, "sessionsRemaining": 6,
                "packageExpiryDate": "2026-12-31", "isExpired": false,
                "createdAt": "2026-10-01T09:00:00Z"
            }]}
        })),
    )
}

async fn spawn_backend() -> anyhow::Result<(SocketAddr, Shared)> {
    let backend: Shared = Arc::new(Mutex::new(Backend::default()));
    let app = Router::new()
        .route("/auth/google", post(sign_in))
        .route("/auth/refresh", post(refresh))
        .route("/clients", get(list_clients))
        .with_state(Arc::clone(&backend));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok((addr, backend))
}

fn config(addr: SocketAddr, dir: &tempfile::TempDir) -> ClientConfig {
    ClientConfig {
        api_url: format!("http://{addr}"),
        timeout_ms: 5_000,
        refresh_timeout_ms: 5_000,
        state_dir: Some(dir.path().to_path_buf()),
    }
}

fn controller(config: &ClientConfig) -> anyhow::Result<Arc<SessionController>> {
    let store = FileStore::open(config.session_path())?;
    let api = ApiClient::from_config(config, Arc::new(store))?;
    Ok(SessionController::new(api))
}

#[tokio::test]
async fn sign_in_persists_session_across_restarts() -> anyhow::Result<()> {
    let (addr, _backend) = spawn_backend().await?;
    let dir = tempfile::tempdir()?;
    let config = config(addr, &dir);

    let session = controller(&config)?;
    session.sign_in_with_google("google-id").await?;
    assert_eq!(clients::list(session.api()).await?.len(), 1);

    let restarted = controller(&config)?;
    let user = restarted.restore().await;
    assert_eq!(user.map(|u| u.id).as_deref(), Some("u1"));
    assert_eq!(restarted.api().auth_token().as_deref(), Some("t1"));
    assert_eq!(clients::list(restarted.api()).await?[0].sessions_remaining, 6);
    Ok(())
}

#[tokio::test]
async fn concurrent_expiry_triggers_one_refresh() -> anyhow::Result<()> {
    let (addr, backend) = spawn_backend().await?;
    let dir = tempfile::tempdir()?;
    let config = config(addr, &dir);
    let session = controller(&config)?;
    session.sign_in_with_google("google-id").await?;

    backend.lock().access = "<rotated server-side>".to_owned();

    let calls = (0..5).map(|_| {
        let api = session.api().clone();
        tokio::spawn(async move { clients::list(&api).await })
    });
    for handle in futures_util::future::join_all(calls).await {
        assert_eq!(handle??.len(), 1);
    }

    assert_eq!(backend.lock().refresh_calls, 1);
    assert_eq!(session.api().auth_token().as_deref(), Some("t2"));

    let on_disk = FileStore::open(config.session_path())?;
    assert_eq!(on_disk.get(keys::REFRESH_TOKEN).await?.as_deref(), Some("r2"));
    assert_eq!(on_disk.get(keys::AUTH_TOKEN).await?.as_deref(), Some("t2"));
    Ok(())
}

#[tokio::test]
async fn revoked_refresh_token_signs_out() -> anyhow::Result<()> {
    let (addr, backend) = spawn_backend().await?;
    let dir = tempfile::tempdir()?;
    let config = config(addr, &dir);
    let session = controller(&config)?;
    session.sign_in_with_google("google-id").await?;
    let shutdown = CancellationToken::new();
    let listener = session.spawn_expiry_listener(shutdown.clone());

    {
        let mut b = backend.lock();
        b.access = "<rotated server-side>".to_owned();
        b.revoked = true;
    }

    let err = clients::list(session.api()).await.err();
    assert!(matches!(err, Some(ApiError::SessionExpired(_))), "got {err:?}");

    tokio::time::timeout(Duration::from_secs(2), async {
        while session.is_authenticated() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    assert_eq!(session.error().as_deref(), Some(SESSION_EXPIRED_MESSAGE));

    let on_disk = FileStore::open(config.session_path())?;
    for key in [keys::AUTH_TOKEN, keys::REFRESH_TOKEN, keys::USER_DATA] {
        assert_eq!(on_disk.get(key).await?, None, "{key} survived expiry");
    }

    shutdown.cancel();
    listener.await?;
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    let dir = tempfile::tempdir()?;
    let session = controller(&config(addr, &dir))?;
    session.api().set_auth_token(Some("t1".to_owned()));

    let err = clients::list(session.api()).await.err();
    assert!(matches!(err, Some(ApiError::Transport(_))), "got {err:?}");
    Ok(())
}
