//! Income and expense records
//!
//! Creation of finance records by tenant users and the expense approval
//! workflow. The financial aggregator reads these; only APPROVED expenses
//! count toward profit & loss.

use rust_decimal::Decimal;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use fleetops_shared::clock::SharedClock;
use fleetops_shared::types::{ExpenseRecord, ExpenseStatus, IncomeRecord};

use crate::error::{BillingError, BillingResult};

/// New income record request
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewIncome {
    pub amount: Decimal,
    pub source: String,
    pub vehicle_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_on: OffsetDateTime,
    pub description: Option<String>,
}

/// New expense record request; expenses start PENDING
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewExpense {
    pub amount: Decimal,
    pub category: String,
    pub vehicle_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_on: OffsetDateTime,
    pub description: Option<String>,
}

/// Finance record creation and approval service
pub struct FinanceRecordService {
    pool: PgPool,
    clock: SharedClock,
}

impl FinanceRecordService {
    pub fn new(pool: PgPool, clock: SharedClock) -> Self {
        Self { pool, clock }
    }

    pub async fn record_income(
        &self,
        tenant_id: Uuid,
        params: NewIncome,
    ) -> BillingResult<IncomeRecord> {
        validate_amount(params.amount, "Income")?;

        let record: IncomeRecord = sqlx::query_as(
            r#"
            INSERT INTO income_records (id, tenant_id, amount, source, vehicle_id, occurred_on, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(params.amount)
        .bind(&params.source)
        .bind(params.vehicle_id)
        .bind(params.occurred_on)
        .bind(&params.description)
        .bind(self.clock.now())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            tenant_id = %tenant_id,
            record_id = %record.id,
            amount = %record.amount,
            source = %record.source,
            "Recorded income"
        );

        Ok(record)
    }

    pub async fn record_expense(
        &self,
        tenant_id: Uuid,
        params: NewExpense,
    ) -> BillingResult<ExpenseRecord> {
        validate_amount(params.amount, "Expense")?;

        let record: ExpenseRecord = sqlx::query_as(
            r#"
            INSERT INTO expense_records (id, tenant_id, amount, category, status, vehicle_id, occurred_on, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(params.amount)
        .bind(&params.category)
        .bind(ExpenseStatus::Pending)
        .bind(params.vehicle_id)
        .bind(params.occurred_on)
        .bind(&params.description)
        .bind(self.clock.now())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            tenant_id = %tenant_id,
            record_id = %record.id,
            amount = %record.amount,
            category = %record.category,
            "Recorded expense"
        );

        Ok(record)
    }

    /// Approve or reject a pending expense
    pub async fn set_expense_status(
        &self,
        expense_id: Uuid,
        status: ExpenseStatus,
        reviewer: &str,
    ) -> BillingResult<ExpenseRecord> {
        let record: Option<ExpenseRecord> = sqlx::query_as(
            r#"
            UPDATE expense_records
            SET status = $2,
                reviewed_by = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(expense_id)
        .bind(status)
        .bind(reviewer)
        .fetch_optional(&self.pool)
        .await?;

        let record = record
            .ok_or_else(|| BillingError::NotFound(format!("Expense {} not found", expense_id)))?;

        tracing::info!(
            expense_id = %expense_id,
            status = %status,
            reviewer = %reviewer,
            "Updated expense status"
        );

        Ok(record)
    }
}

fn validate_amount(amount: Decimal, kind: &str) -> BillingResult<()> {
    if amount <= Decimal::ZERO {
        return Err(BillingError::Validation(format!(
            "{} amount must be positive",
            kind
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_amount_accepted() {
        assert!(validate_amount(Decimal::new(1, 2), "Income").is_ok());
        assert!(validate_amount(Decimal::new(125000, 2), "Expense").is_ok());
    }

    #[test]
    fn test_zero_and_negative_amounts_rejected() {
        let err = validate_amount(Decimal::ZERO, "Income").unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Validation error: Income amount must be positive"
        );

        let err = validate_amount(Decimal::new(-500, 2), "Expense").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Expense amount must be positive"
        );
    }
}
