// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key-value persistence for tokens and the cached user record.
//!
//! Backends may complete synchronously or asynchronously; every call goes
//! through a boxed future so callers always treat it as a suspension point.

pub mod file;
pub mod keys;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use file::FileStore;
pub use memory::MemoryStore;

/// String-keyed value store.
///
/// Object-safe for use as `Arc<dyn KeyValueStore>`.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>>;

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), StoreError>>;

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;

    fn clear(&self) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// An access/refresh token pair as issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Typed accessors over a [`KeyValueStore`] using the stable [`keys`].
///
/// Read failures are logged and reported as absent.
#[derive(Clone)]
pub struct TokenVault {
    store: Arc<dyn KeyValueStore>,
}

impl TokenVault {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.read(keys::AUTH_TOKEN).await
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.read(keys::REFRESH_TOKEN).await
    }

    /// Persist a rotated pair as two independent writes.
    ///
    /// The refresh token goes first: if the second write is lost the store
    /// holds a valid refresh token next to a stale access token, and the next
    /// 401 repairs it.
    pub async fn save_pair(&self, pair: &TokenPair) -> Result<(), StoreError> {
        self.store.set(keys::REFRESH_TOKEN, pair.refresh_token.clone()).await?;
        self.store.set(keys::AUTH_TOKEN, pair.access_token.clone()).await?;
        Ok(())
    }

    pub async fn user<T: DeserializeOwned>(&self) -> Option<T> {
        let raw = self.read(keys::USER_DATA).await?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(key = keys::USER_DATA, err = %e, "discarding unreadable user record");
                None
            }
        }
    }

    pub async fn save_user<T: Serialize>(&self, user: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(user)?;
        self.store.set(keys::USER_DATA, json).await
    }

    /// Remove the access token, refresh token, and cached user.
    ///
    /// Every key is attempted even if an earlier removal fails.
    pub async fn clear_session(&self) {
        for key in [keys::AUTH_TOKEN, keys::REFRESH_TOKEN, keys::USER_DATA] {
            if let Err(e) = self.store.remove(key).await {
                tracing::warn!(key, err = %e, "failed to remove session key");
            }
        }
    }

    /// Remove only the token pair, keeping the user record.
    pub async fn clear_tokens(&self) {
        for key in [keys::AUTH_TOKEN, keys::REFRESH_TOKEN] {
            if let Err(e) = self.store.remove(key).await {
                tracing::warn!(key, err = %e, "failed to remove token");
            }
        }
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!(key, err = %e, "failed to read from storage");
                None
            }
        }
    }
}

/// Resolve the state directory for persisted client data.
///
/// Checks `WELLVANTAGE_STATE_DIR`, then `$XDG_STATE_HOME/wellvantage`,
/// then `$HOME/.local/state/wellvantage`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("WELLVANTAGE_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("wellvantage");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/wellvantage");
    }
    PathBuf::from(".wellvantage")
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
