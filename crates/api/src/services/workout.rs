// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use crate::client::{ApiClient, ApiResponse, RequestOptions};
use crate::error::ApiError;

pub const PLANS_PATH: &str = "/workout/plans";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Free text, e.g. "3" or "3-4".
    pub sets: String,
    pub reps: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutDay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub day_number: u32,
    pub body_part: String,
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkoutPlanRequest {
    pub name: String,
    pub days: Vec<WorkoutDay>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutPlan {
    pub id: String,
    pub trainer_id: String,
    pub name: String,
    pub days: Vec<WorkoutDay>,
    #[serde(default)]
    pub notes: String,
    pub created_at: String,
}

/// Summary row returned by the plan listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutPlanSummary {
    pub id: String,
    pub name: String,
    pub total_days: u32,
    pub total_exercises: u32,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanList {
    workout_plans: Vec<WorkoutPlanSummary>,
}

pub async fn create_plan(
    api: &ApiClient,
    request: &CreateWorkoutPlanRequest,
) -> Result<WorkoutPlan, ApiError> {
    let resp: ApiResponse<WorkoutPlan> =
        api.post(PLANS_PATH, request, RequestOptions::default()).await?;
    Ok(resp.data)
}

pub async fn list_plans(api: &ApiClient) -> Result<Vec<WorkoutPlanSummary>, ApiError> {
    let resp: ApiResponse<PlanList> = api.get(PLANS_PATH, RequestOptions::default()).await?;
    Ok(resp.data.workout_plans)
}

pub async fn delete_plan(api: &ApiClient, plan_id: &str) -> Result<(), ApiError> {
    api.delete::<serde_json::Value>(&format!("{PLANS_PATH}/{plan_id}"), RequestOptions::default())
        .await?;
    Ok(())
}
