//! Plan catalog routes

use axum::{extract::State, Json};

use fleetops_shared::types::PlanConfig;

use crate::error::ApiResult;
use crate::state::AppState;

/// List all plans with pricing and limits (overrides applied)
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<PlanConfig>>> {
    let plans = state.catalog().list_plans().await?;
    Ok(Json(plans))
}
