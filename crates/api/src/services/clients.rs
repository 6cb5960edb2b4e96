// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use crate::client::{ApiClient, ApiResponse, RequestOptions};
use crate::error::ApiError;

pub const CLIENTS_PATH: &str = "/clients";

/// A trainee with a session package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub sessions_total: u32,
    pub sessions_used: u32,
    pub sessions_remaining: u32,
    pub package_expiry_date: String,
    pub is_expired: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub sessions_total: u32,
    pub package_expiry_date: String,
}

#[derive(Debug, Deserialize)]
struct ClientList {
    clients: Vec<Client>,
}

pub async fn list(api: &ApiClient) -> Result<Vec<Client>, ApiError> {
    let resp: ApiResponse<ClientList> = api.get(CLIENTS_PATH, RequestOptions::default()).await?;
    Ok(resp.data.clients)
}

pub async fn create(api: &ApiClient, request: &CreateClientRequest) -> Result<Client, ApiError> {
    let resp: ApiResponse<Client> =
        api.post(CLIENTS_PATH, request, RequestOptions::default()).await?;
    Ok(resp.data)
}

pub async fn delete(api: &ApiClient, client_id: &str) -> Result<(), ApiError> {
    api.delete::<serde_json::Value>(&format!("{CLIENTS_PATH}/{client_id}"), RequestOptions::default())
        .await?;
    Ok(())
}
