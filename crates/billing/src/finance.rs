//! Financial aggregator
//!
//! Read-only financial summaries over a tenant's income and expense
//! records: profit & loss, cash flow, per-vehicle profitability, and a
//! composite summary surfacing pending approvals. Every report re-scans
//! the requested window; nothing is cached or persisted.
//!
//! Queries only load raw rows; the aggregation itself is done by pure
//! functions so the arithmetic is testable without a database.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use fleetops_shared::types::ExpenseStatus;

use crate::error::{BillingError, BillingResult};
use crate::proration::round_currency;

/// Profit & loss over a date range. Only APPROVED expenses count.
#[derive(Debug, Clone, Serialize)]
pub struct ProfitLossReport {
    pub period_start: OffsetDateTime,
    pub period_end: OffsetDateTime,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_profit: Decimal,
    /// Percentage, 0 when there is no income
    pub profit_margin: Decimal,
    pub income_by_source: BTreeMap<String, Decimal>,
    pub expenses_by_category: BTreeMap<String, Decimal>,
}

/// One calendar day of cash movement
#[derive(Debug, Clone, Serialize)]
pub struct DailyCashFlow {
    pub date: Date,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

/// Cash flow over a date range, grouped by calendar day
#[derive(Debug, Clone, Serialize)]
pub struct CashFlowReport {
    pub period_start: OffsetDateTime,
    pub period_end: OffsetDateTime,
    pub opening_balance: Decimal,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub closing_balance: Decimal,
    pub days: Vec<DailyCashFlow>,
}

/// Income minus approved expenses for a single vehicle
#[derive(Debug, Clone, Serialize)]
pub struct VehicleProfitability {
    pub vehicle_id: Uuid,
    pub period_start: OffsetDateTime,
    pub period_end: OffsetDateTime,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_profit: Decimal,
    pub profit_margin: Decimal,
}

/// P&L plus what is still awaiting approval
#[derive(Debug, Clone, Serialize)]
pub struct FinancialSummary {
    pub profit_loss: ProfitLossReport,
    pub pending_expense_count: usize,
    pub pending_expense_total: Decimal,
}

/// Financial reporting service
pub struct FinancialService {
    pool: PgPool,
}

impl FinancialService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn profit_loss_report(
        &self,
        tenant_id: Uuid,
        start_date: OffsetDateTime,
        end_date: OffsetDateTime,
    ) -> BillingResult<ProfitLossReport> {
        let incomes = self.load_income(tenant_id, start_date, end_date).await?;
        let expenses = self.load_expenses(tenant_id, start_date, end_date).await?;

        Ok(compute_profit_loss(&incomes, &expenses, start_date, end_date))
    }

    pub async fn cash_flow_report(
        &self,
        tenant_id: Uuid,
        start_date: OffsetDateTime,
        end_date: OffsetDateTime,
        opening_balance: Option<Decimal>,
    ) -> BillingResult<CashFlowReport> {
        let incomes = self.load_income(tenant_id, start_date, end_date).await?;
        let expenses = self.load_expenses(tenant_id, start_date, end_date).await?;

        Ok(compute_cash_flow(
            &incomes,
            &expenses,
            start_date,
            end_date,
            opening_balance.unwrap_or(Decimal::ZERO),
        ))
    }

    pub async fn vehicle_profitability(
        &self,
        vehicle_id: Uuid,
        start_date: OffsetDateTime,
        end_date: OffsetDateTime,
    ) -> BillingResult<VehicleProfitability> {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM vehicles WHERE id = $1")
            .bind(vehicle_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(BillingError::NotFound(format!(
                "Vehicle {} not found",
                vehicle_id
            )));
        }

        let incomes: Vec<IncomeRow> = sqlx::query_as(
            r#"
            SELECT amount, source, occurred_on
            FROM income_records
            WHERE vehicle_id = $1
              AND occurred_on >= $2
              AND occurred_on <= $3
            "#,
        )
        .bind(vehicle_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await?;

        let expenses: Vec<ExpenseRow> = sqlx::query_as(
            r#"
            SELECT amount, category, status, occurred_on
            FROM expense_records
            WHERE vehicle_id = $1
              AND occurred_on >= $2
              AND occurred_on <= $3
            "#,
        )
        .bind(vehicle_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await?;

        let pl = compute_profit_loss(&incomes, &expenses, start_date, end_date);

        Ok(VehicleProfitability {
            vehicle_id,
            period_start: start_date,
            period_end: end_date,
            total_income: pl.total_income,
            total_expenses: pl.total_expenses,
            net_profit: pl.net_profit,
            profit_margin: pl.profit_margin,
        })
    }

    pub async fn financial_summary(
        &self,
        tenant_id: Uuid,
        start_date: OffsetDateTime,
        end_date: OffsetDateTime,
    ) -> BillingResult<FinancialSummary> {
        let incomes = self.load_income(tenant_id, start_date, end_date).await?;
        let expenses = self.load_expenses(tenant_id, start_date, end_date).await?;

        let profit_loss = compute_profit_loss(&incomes, &expenses, start_date, end_date);
        let pending: Vec<&ExpenseRow> = expenses
            .iter()
            .filter(|e| e.status == ExpenseStatus::Pending)
            .collect();
        let pending_expense_total = round_currency(pending.iter().map(|e| e.amount).sum());

        Ok(FinancialSummary {
            profit_loss,
            pending_expense_count: pending.len(),
            pending_expense_total,
        })
    }

    async fn load_income(
        &self,
        tenant_id: Uuid,
        start_date: OffsetDateTime,
        end_date: OffsetDateTime,
    ) -> BillingResult<Vec<IncomeRow>> {
        let rows: Vec<IncomeRow> = sqlx::query_as(
            r#"
            SELECT amount, source, occurred_on
            FROM income_records
            WHERE tenant_id = $1
              AND occurred_on >= $2
              AND occurred_on <= $3
            "#,
        )
        .bind(tenant_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn load_expenses(
        &self,
        tenant_id: Uuid,
        start_date: OffsetDateTime,
        end_date: OffsetDateTime,
    ) -> BillingResult<Vec<ExpenseRow>> {
        let rows: Vec<ExpenseRow> = sqlx::query_as(
            r#"
            SELECT amount, category, status, occurred_on
            FROM expense_records
            WHERE tenant_id = $1
              AND occurred_on >= $2
              AND occurred_on <= $3
            "#,
        )
        .bind(tenant_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// Raw projection rows the pure aggregation runs over

#[derive(Debug, Clone, sqlx::FromRow)]
struct IncomeRow {
    amount: Decimal,
    source: String,
    occurred_on: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ExpenseRow {
    amount: Decimal,
    category: String,
    status: ExpenseStatus,
    occurred_on: OffsetDateTime,
}

/// Income is counted unconditionally; expenses only when APPROVED
fn compute_profit_loss(
    incomes: &[IncomeRow],
    expenses: &[ExpenseRow],
    period_start: OffsetDateTime,
    period_end: OffsetDateTime,
) -> ProfitLossReport {
    let mut total_income = Decimal::ZERO;
    let mut income_by_source: BTreeMap<String, Decimal> = BTreeMap::new();
    for row in incomes {
        total_income += row.amount;
        *income_by_source.entry(row.source.clone()).or_default() += row.amount;
    }

    let mut total_expenses = Decimal::ZERO;
    let mut expenses_by_category: BTreeMap<String, Decimal> = BTreeMap::new();
    for row in expenses {
        if row.status != ExpenseStatus::Approved {
            continue;
        }
        total_expenses += row.amount;
        *expenses_by_category.entry(row.category.clone()).or_default() += row.amount;
    }

    let net_profit = total_income - total_expenses;

    ProfitLossReport {
        period_start,
        period_end,
        total_income: round_currency(total_income),
        total_expenses: round_currency(total_expenses),
        net_profit: round_currency(net_profit),
        profit_margin: profit_margin(net_profit, total_income),
        income_by_source,
        expenses_by_category,
    }
}

/// Raw records (every expense status) grouped by calendar day, ascending
fn compute_cash_flow(
    incomes: &[IncomeRow],
    expenses: &[ExpenseRow],
    period_start: OffsetDateTime,
    period_end: OffsetDateTime,
    opening_balance: Decimal,
) -> CashFlowReport {
    let mut by_day: BTreeMap<Date, (Decimal, Decimal)> = BTreeMap::new();

    for row in incomes {
        by_day.entry(row.occurred_on.date()).or_default().0 += row.amount;
    }
    for row in expenses {
        by_day.entry(row.occurred_on.date()).or_default().1 += row.amount;
    }

    let mut total_income = Decimal::ZERO;
    let mut total_expenses = Decimal::ZERO;
    let days: Vec<DailyCashFlow> = by_day
        .into_iter()
        .map(|(date, (income, expense))| {
            total_income += income;
            total_expenses += expense;
            DailyCashFlow {
                date,
                income: round_currency(income),
                expenses: round_currency(expense),
                net: round_currency(income - expense),
            }
        })
        .collect();

    CashFlowReport {
        period_start,
        period_end,
        opening_balance,
        total_income: round_currency(total_income),
        total_expenses: round_currency(total_expenses),
        closing_balance: round_currency(opening_balance + total_income - total_expenses),
        days,
    }
}

/// net / income * 100, defined as 0 when income is 0
fn profit_margin(net_profit: Decimal, total_income: Decimal) -> Decimal {
    if total_income == Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_currency(net_profit / total_income * Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn income(amount: i64, source: &str, at: OffsetDateTime) -> IncomeRow {
        IncomeRow {
            amount: Decimal::new(amount, 2),
            source: source.to_string(),
            occurred_on: at,
        }
    }

    fn expense(amount: i64, category: &str, status: ExpenseStatus, at: OffsetDateTime) -> ExpenseRow {
        ExpenseRow {
            amount: Decimal::new(amount, 2),
            category: category.to_string(),
            status,
            occurred_on: at,
        }
    }

    const START: OffsetDateTime = datetime!(2026-01-01 00:00 UTC);
    const END: OffsetDateTime = datetime!(2026-01-31 00:00 UTC);

    #[test]
    fn test_profit_loss_excludes_unapproved_expenses() {
        let incomes = vec![income(100_000, "trips", datetime!(2026-01-05 10:00 UTC))];
        let expenses = vec![
            expense(20_000, "fuel", ExpenseStatus::Approved, datetime!(2026-01-06 10:00 UTC)),
            expense(999_999, "fuel", ExpenseStatus::Pending, datetime!(2026-01-07 10:00 UTC)),
            expense(999_999, "repairs", ExpenseStatus::Rejected, datetime!(2026-01-08 10:00 UTC)),
        ];

        let report = compute_profit_loss(&incomes, &expenses, START, END);
        assert_eq!(report.total_income, Decimal::new(100_000, 2));
        assert_eq!(report.total_expenses, Decimal::new(20_000, 2));
        assert_eq!(report.net_profit, Decimal::new(80_000, 2));
        assert_eq!(report.profit_margin, Decimal::new(8000, 2)); // 80.00%
    }

    #[test]
    fn test_profit_margin_zero_income_is_zero_not_nan() {
        let expenses = vec![expense(
            50_000,
            "fuel",
            ExpenseStatus::Approved,
            datetime!(2026-01-06 10:00 UTC),
        )];

        let report = compute_profit_loss(&[], &expenses, START, END);
        assert_eq!(report.total_income, Decimal::ZERO);
        assert_eq!(report.net_profit, Decimal::new(-50_000, 2));
        assert_eq!(report.profit_margin, Decimal::ZERO);
    }

    #[test]
    fn test_profit_loss_groups_by_source_and_category() {
        let incomes = vec![
            income(10_000, "trips", datetime!(2026-01-02 08:00 UTC)),
            income(5_000, "trips", datetime!(2026-01-03 08:00 UTC)),
            income(2_500, "leasing", datetime!(2026-01-04 08:00 UTC)),
        ];
        let expenses = vec![
            expense(1_000, "fuel", ExpenseStatus::Approved, datetime!(2026-01-02 09:00 UTC)),
            expense(3_000, "fuel", ExpenseStatus::Approved, datetime!(2026-01-05 09:00 UTC)),
            expense(2_000, "repairs", ExpenseStatus::Approved, datetime!(2026-01-05 11:00 UTC)),
        ];

        let report = compute_profit_loss(&incomes, &expenses, START, END);
        assert_eq!(
            report.income_by_source.get("trips"),
            Some(&Decimal::new(15_000, 2))
        );
        assert_eq!(
            report.income_by_source.get("leasing"),
            Some(&Decimal::new(2_500, 2))
        );
        assert_eq!(
            report.expenses_by_category.get("fuel"),
            Some(&Decimal::new(4_000, 2))
        );
        assert_eq!(
            report.expenses_by_category.get("repairs"),
            Some(&Decimal::new(2_000, 2))
        );
    }

    #[test]
    fn test_cash_flow_groups_by_day_sorted_ascending() {
        let incomes = vec![
            income(10_000, "trips", datetime!(2026-01-10 23:00 UTC)),
            income(5_000, "trips", datetime!(2026-01-10 01:00 UTC)),
            income(2_000, "trips", datetime!(2026-01-03 12:00 UTC)),
        ];
        let expenses = vec![
            expense(4_000, "fuel", ExpenseStatus::Pending, datetime!(2026-01-10 06:00 UTC)),
            expense(1_000, "fuel", ExpenseStatus::Approved, datetime!(2026-01-20 06:00 UTC)),
        ];

        let report = compute_cash_flow(&incomes, &expenses, START, END, Decimal::ZERO);

        let dates: Vec<Date> = report.days.iter().map(|d| d.date).collect();
        assert_eq!(
            dates,
            vec![
                time::macros::date!(2026-01-03),
                time::macros::date!(2026-01-10),
                time::macros::date!(2026-01-20),
            ]
        );

        // Jan 10 merges both income rows and the pending expense
        let jan10 = &report.days[1];
        assert_eq!(jan10.income, Decimal::new(15_000, 2));
        assert_eq!(jan10.expenses, Decimal::new(4_000, 2));
        assert_eq!(jan10.net, Decimal::new(11_000, 2));
    }

    #[test]
    fn test_cash_flow_closing_balance() {
        let incomes = vec![income(10_000, "trips", datetime!(2026-01-02 08:00 UTC))];
        let expenses = vec![expense(
            2_500,
            "fuel",
            ExpenseStatus::Approved,
            datetime!(2026-01-03 08:00 UTC),
        )];

        let report =
            compute_cash_flow(&incomes, &expenses, START, END, Decimal::new(50_000, 2));
        assert_eq!(report.total_income, Decimal::new(10_000, 2));
        assert_eq!(report.total_expenses, Decimal::new(2_500, 2));
        assert_eq!(report.closing_balance, Decimal::new(57_500, 2));
    }

    #[test]
    fn test_cash_flow_empty_window() {
        let report = compute_cash_flow(&[], &[], START, END, Decimal::new(1_000, 2));
        assert!(report.days.is_empty());
        assert_eq!(report.closing_balance, Decimal::new(1_000, 2));
    }

    #[test]
    fn test_profit_margin_rounding() {
        // 1/3 of income kept: 33.333...% -> 33.33
        let margin = profit_margin(Decimal::new(100, 0), Decimal::new(300, 0));
        assert_eq!(margin, Decimal::new(3333, 2));
    }
}
