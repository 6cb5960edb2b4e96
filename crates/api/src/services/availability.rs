// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trainer calendar availability. The trainer is taken from the bearer
//! token on create; listing names the trainer explicitly.

use serde::{Deserialize, Serialize};

use crate::client::{ApiClient, ApiResponse, RequestOptions};
use crate::error::ApiError;

pub const AVAILABILITY_PATH: &str = "/calendar/availability";
pub const BATCH_PATH: &str = "/calendar/availability/batch";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityBlock {
    pub id: String,
    pub trainer_id: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAvailabilityRequest {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchAvailabilityRequest {
    pub dates: Vec<String>,
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchAvailabilityResponse {
    pub availability_blocks: Vec<AvailabilityBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
}

pub async fn create(
    api: &ApiClient,
    request: &CreateAvailabilityRequest,
) -> Result<AvailabilityBlock, ApiError> {
    let resp: ApiResponse<AvailabilityBlock> =
        api.post(AVAILABILITY_PATH, request, RequestOptions::default()).await?;
    Ok(resp.data)
}

pub async fn create_batch(
    api: &ApiClient,
    request: &CreateBatchAvailabilityRequest,
) -> Result<CreateBatchAvailabilityResponse, ApiError> {
    let resp: ApiResponse<CreateBatchAvailabilityResponse> =
        api.post(BATCH_PATH, request, RequestOptions::default()).await?;
    Ok(resp.data)
}

pub async fn list(
    api: &ApiClient,
    trainer_id: &str,
    date: &str,
) -> Result<Vec<AvailabilityBlock>, ApiError> {
    let options = RequestOptions::default().with_query("trainerId", trainer_id).with_query("date", date);
    let resp: ApiResponse<Vec<AvailabilityBlock>> = api.get(AVAILABILITY_PATH, options).await?;
    Ok(resp.data)
}
