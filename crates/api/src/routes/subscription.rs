//! Subscription lifecycle routes

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use fleetops_billing::subscription::{
    CancelParams, ChangePlanParams, ChangePlanOutcome, LimitCheck, RenewalOutcome,
};
use fleetops_shared::types::{
    BillingCycle, Invoice, Plan, SubscriptionHistoryEntry, Tenant,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Actor recorded when the caller does not identify themselves
const DEFAULT_ACTOR: &str = "api";

/// Request to start a trial
#[derive(Debug, Deserialize)]
pub struct StartTrialRequest {
    pub duration_days: Option<i64>,
}

/// Request to end a trial
#[derive(Debug, Deserialize)]
pub struct EndTrialRequest {
    pub conversion_plan: Option<Plan>,
}

/// Request to change plan and/or billing cycle
#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    pub target_plan: Plan,
    pub billing_cycle: Option<BillingCycle>,
    #[serde(default)]
    pub prorate: bool,
    pub changed_by: Option<String>,
}

/// Request to cancel a subscription
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub immediate: bool,
    pub reason: Option<String>,
    pub changed_by: Option<String>,
}

/// Request to reactivate a canceled subscription
#[derive(Debug, Deserialize)]
pub struct ReactivateRequest {
    pub new_plan: Plan,
    pub changed_by: Option<String>,
}

/// Date range + output format for history queries
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub format: Option<String>,
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<Json<Tenant>> {
    let tenant = state.subscriptions().get_tenant(tenant_id).await?;
    Ok(Json(tenant))
}

pub async fn start_trial(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(req): Json<StartTrialRequest>,
) -> ApiResult<Json<Tenant>> {
    let duration = req
        .duration_days
        .unwrap_or(state.config.trial_duration_days);
    let tenant = state
        .subscriptions()
        .start_trial(tenant_id, Some(duration))
        .await?;
    Ok(Json(tenant))
}

pub async fn end_trial(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(req): Json<EndTrialRequest>,
) -> ApiResult<Json<Tenant>> {
    let tenant = state
        .subscriptions()
        .end_trial(tenant_id, req.conversion_plan)
        .await?;
    Ok(Json(tenant))
}

pub async fn change_plan(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(req): Json<ChangePlanRequest>,
) -> ApiResult<Json<ChangePlanOutcome>> {
    let actor = req.changed_by.as_deref().unwrap_or(DEFAULT_ACTOR);
    let outcome = state
        .subscriptions()
        .change_plan(
            tenant_id,
            ChangePlanParams {
                target_plan: req.target_plan,
                billing_cycle: req.billing_cycle,
                prorate: req.prorate,
            },
            actor,
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> ApiResult<Json<Tenant>> {
    let actor = req.changed_by.as_deref().unwrap_or(DEFAULT_ACTOR);
    let tenant = state
        .subscriptions()
        .cancel_subscription(
            tenant_id,
            CancelParams {
                immediate: req.immediate,
                reason: req.reason,
            },
            actor,
        )
        .await?;
    Ok(Json(tenant))
}

pub async fn reactivate(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(req): Json<ReactivateRequest>,
) -> ApiResult<Json<Tenant>> {
    let actor = req.changed_by.as_deref().unwrap_or(DEFAULT_ACTOR);
    let tenant = state
        .subscriptions()
        .reactivate_subscription(tenant_id, req.new_plan, actor)
        .await?;
    Ok(Json(tenant))
}

pub async fn renew(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<Json<RenewalOutcome>> {
    let outcome = state.subscriptions().renew_subscription(tenant_id).await?;
    Ok(Json(outcome))
}

pub async fn limits(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<Json<LimitCheck>> {
    let check = state.subscriptions().validate_plan_limits(tenant_id).await?;
    Ok(Json(check))
}

/// Subscription history as JSON, or CSV with `?format=csv`
pub async fn history(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Response> {
    let start = parse_optional_date(query.start_date.as_deref())?;
    let end = parse_optional_date(query.end_date.as_deref())?;

    if query.format.as_deref() == Some("csv") {
        let csv = state.history().export_csv(tenant_id, start, end).await?;
        return Ok((
            [(header::CONTENT_TYPE, "text/csv")],
            csv,
        )
            .into_response());
    }

    let entries: Vec<SubscriptionHistoryEntry> =
        state.history().list_for_tenant(tenant_id, start, end).await?;
    Ok(Json(entries).into_response())
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Invoice>>> {
    let invoices = state.invoices().list_for_tenant(tenant_id).await?;
    Ok(Json(invoices))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> ApiResult<Json<Invoice>> {
    let invoice = state.invoices().get_invoice(invoice_id).await?;
    Ok(Json(invoice))
}

pub(crate) fn parse_optional_date(value: Option<&str>) -> ApiResult<Option<OffsetDateTime>> {
    value
        .map(|s| {
            OffsetDateTime::parse(s, &Rfc3339)
                .map_err(|e| ApiError::BadRequest(format!("Invalid date '{}': {}", s, e)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optional_date() {
        assert_eq!(parse_optional_date(None).unwrap(), None);

        let parsed = parse_optional_date(Some("2026-01-15T00:00:00Z"))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.date(), time::macros::date!(2026-01-15));

        assert!(parse_optional_date(Some("January 15th")).is_err());
    }
}
