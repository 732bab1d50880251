//! Health check endpoint

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// Liveness/readiness probe; checks database connectivity
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Health check database ping failed");
            "unavailable"
        }
    };

    Json(json!({
        "status": if database == "ok" { "healthy" } else { "degraded" },
        "database": database,
    }))
}
