// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signed-in session lifecycle on top of [`ApiClient`].

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::ApiClient;
use crate::error::SessionError;
use crate::refresh::SessionEvent;
use crate::services::auth::{self, AuthUser};
use crate::store::TokenPair;

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

#[derive(Debug, Default)]
struct SessionState {
    user: Option<AuthUser>,
    error: Option<String>,
}

/// Owns the signed-in user and keeps storage and the client token in step.
pub struct SessionController {
    api: ApiClient,
    state: RwLock<SessionState>,
}

impl SessionController {
    pub fn new(api: ApiClient) -> Arc<Self> {
        Arc::new(Self { api, state: RwLock::new(SessionState::default()) })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.state.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().user.is_some()
    }

    /// Last user-facing error, e.g. a failed sign-in or a forced logout.
    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn clear_error(&self) {
        self.state.write().error = None;
    }

    /// Resume a persisted session. Needs both the access token and the
    /// cached user; otherwise the controller stays signed out.
    pub async fn restore(&self) -> Option<AuthUser> {
        let vault = self.api.vault();
        let token = vault.access_token().await;
        let user = vault.user::<AuthUser>().await;
        match (token, user) {
            (Some(token), Some(user)) => {
                self.api.set_auth_token(Some(token));
                self.state.write().user = Some(user.clone());
                tracing::debug!(user_id = %user.id, "restored session");
                Some(user)
            }
            _ => None,
        }
    }

    /// Exchange a Google ID token for a session and persist it.
    pub async fn sign_in_with_google(&self, id_token: &str) -> Result<AuthUser, SessionError> {
        self.state.write().error = None;
        let result = self.establish(id_token).await;
        match result {
            Ok(ref user) => {
                tracing::info!(user_id = %user.id, "signed in");
                self.state.write().user = Some(user.clone());
            }
            Err(ref e) => {
                tracing::warn!(err = %e, "sign-in failed");
                self.state.write().error = Some(e.to_string());
            }
        }
        result
    }

    async fn establish(&self, id_token: &str) -> Result<AuthUser, SessionError> {
        let resp = auth::google_auth(&self.api, id_token).await?;
        let (Some(access_token), Some(refresh_token), Some(user)) =
            (resp.access_token, resp.refresh_token, resp.user)
        else {
            return Err(SessionError::InvalidAuthResponse);
        };
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(SessionError::InvalidAuthResponse);
        }

        let vault = self.api.vault();
        vault.save_pair(&TokenPair { access_token: access_token.clone(), refresh_token }).await?;
        vault.save_user(&user).await?;
        self.api.set_auth_token(Some(access_token));
        Ok(user)
    }

    pub async fn sign_out(&self) {
        self.api.vault().clear_session().await;
        self.api.set_auth_token(None);
        self.state.write().user = None;
        tracing::info!("signed out");
    }

    /// Sign out after an unrecoverable refresh. A failed episode always
    /// clears the active token, so a token present here belongs to a session
    /// established after the failure and is left alone.
    async fn expire(&self) {
        if self.api.auth_token().is_some() {
            tracing::debug!("expiry superseded by a newer sign-in");
            return;
        }
        self.api.vault().clear_session().await;
        self.api.set_auth_token(None);
        let mut state = self.state.write();
        state.user = None;
        state.error = Some(SESSION_EXPIRED_MESSAGE.to_owned());
    }

    /// Force a logout whenever the client reports an unrecoverable session.
    ///
    /// Subscribes before returning, so expiries after this call are never missed.
    pub fn spawn_expiry_listener(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let mut events = self.api.subscribe();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(SessionEvent::Expired { reason }) => {
                        tracing::warn!(reason = %reason, "session expired, signing out");
                        this.expire().await;
                    }
                    Ok(SessionEvent::Refreshed) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!(skipped = n, "expiry listener lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
