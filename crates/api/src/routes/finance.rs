//! Finance record and reporting routes

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use fleetops_billing::finance::{
    CashFlowReport, FinancialSummary, ProfitLossReport, VehicleProfitability,
};
use fleetops_billing::records::{NewExpense, NewIncome};
use fleetops_shared::types::{ExpenseRecord, ExpenseStatus, IncomeRecord};

use crate::error::{ApiError, ApiResult};
use crate::routes::subscription::parse_optional_date;
use crate::state::AppState;

/// Date range for reports; both bounds required
#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub start_date: String,
    pub end_date: String,
    /// Cash-flow only
    pub opening_balance: Option<Decimal>,
}

impl ReportQuery {
    fn range(&self) -> ApiResult<(time::OffsetDateTime, time::OffsetDateTime)> {
        let start = parse_optional_date(Some(&self.start_date))?
            .ok_or_else(|| ApiError::BadRequest("start_date is required".to_string()))?;
        let end = parse_optional_date(Some(&self.end_date))?
            .ok_or_else(|| ApiError::BadRequest("end_date is required".to_string()))?;
        if end < start {
            return Err(ApiError::BadRequest(
                "end_date must not precede start_date".to_string(),
            ));
        }
        Ok((start, end))
    }
}

/// Request to approve or reject an expense
#[derive(Debug, Deserialize)]
pub struct ExpenseStatusRequest {
    pub status: ExpenseStatus,
    pub reviewed_by: Option<String>,
}

pub async fn record_income(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(req): Json<NewIncome>,
) -> ApiResult<Json<IncomeRecord>> {
    let record = state.finance_records().record_income(tenant_id, req).await?;
    Ok(Json(record))
}

pub async fn record_expense(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(req): Json<NewExpense>,
) -> ApiResult<Json<ExpenseRecord>> {
    let record = state
        .finance_records()
        .record_expense(tenant_id, req)
        .await?;
    Ok(Json(record))
}

pub async fn set_expense_status(
    State(state): State<AppState>,
    Path(expense_id): Path<Uuid>,
    Json(req): Json<ExpenseStatusRequest>,
) -> ApiResult<Json<ExpenseRecord>> {
    let reviewer = req.reviewed_by.as_deref().unwrap_or("api");
    let record = state
        .finance_records()
        .set_expense_status(expense_id, req.status, reviewer)
        .await?;
    Ok(Json(record))
}

pub async fn profit_loss(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<ProfitLossReport>> {
    let (start, end) = query.range()?;
    let report = state.finance().profit_loss_report(tenant_id, start, end).await?;
    Ok(Json(report))
}

pub async fn cash_flow(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<CashFlowReport>> {
    let (start, end) = query.range()?;
    let report = state
        .finance()
        .cash_flow_report(tenant_id, start, end, query.opening_balance)
        .await?;
    Ok(Json(report))
}

pub async fn summary(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<FinancialSummary>> {
    let (start, end) = query.range()?;
    let report = state.finance().financial_summary(tenant_id, start, end).await?;
    Ok(Json(report))
}

pub async fn vehicle_profitability(
    State(state): State<AppState>,
    Path(vehicle_id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<VehicleProfitability>> {
    let (start, end) = query.range()?;
    let report = state
        .finance()
        .vehicle_profitability(vehicle_id, start, end)
        .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_query_range_validation() {
        let query = ReportQuery {
            start_date: "2026-02-01T00:00:00Z".to_string(),
            end_date: "2026-01-01T00:00:00Z".to_string(),
            opening_balance: None,
        };
        assert!(query.range().is_err());

        let query = ReportQuery {
            start_date: "2026-01-01T00:00:00Z".to_string(),
            end_date: "2026-02-01T00:00:00Z".to_string(),
            opening_balance: None,
        };
        let (start, end) = query.range().unwrap();
        assert!(start < end);
    }
}
