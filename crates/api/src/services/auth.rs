// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{ApiClient, ApiResponse, RequestOptions, REFRESH_PATH, SIGN_IN_PATH};
use crate::error::ApiError;
use crate::store::TokenPair;

pub const PROFILE_PATH: &str = "/auth/me";

/// The signed-in trainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// Sign-in payload. Fields are optional so an incomplete response can be
/// rejected with a specific error instead of a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAuthResponse {
    #[serde(default)]
    pub user: Option<AuthUser>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Exchange a Google ID token for a session.
pub async fn google_auth(api: &ApiClient, id_token: &str) -> Result<GoogleAuthResponse, ApiError> {
    let resp: ApiResponse<Option<GoogleAuthResponse>> =
        api.post(SIGN_IN_PATH, &json!({ "idToken": id_token }), RequestOptions::default()).await?;
    Ok(resp.data.unwrap_or_default())
}

/// Explicit refresh exchange. The client performs this itself on 401; this
/// is for callers that want to rotate proactively.
pub async fn refresh_token(api: &ApiClient, refresh_token: &str) -> Result<TokenPair, ApiError> {
    let resp: ApiResponse<TokenPair> = api
        .post(REFRESH_PATH, &json!({ "refreshToken": refresh_token }), RequestOptions::default())
        .await?;
    Ok(resp.data)
}

pub async fn profile(api: &ApiClient) -> Result<AuthUser, ApiError> {
    let resp: ApiResponse<AuthUser> = api.get(PROFILE_PATH, RequestOptions::default()).await?;
    Ok(resp.data)
}
