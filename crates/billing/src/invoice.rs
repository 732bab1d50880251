//! Invoice trigger
//!
//! Persists invoices requested by the subscription state machine on plan
//! changes and renewals. Delivery (email, payment collection) happens
//! downstream and is not this crate's concern.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use fleetops_shared::clock::SharedClock;
use fleetops_shared::types::{BillingCycle, Invoice, InvoiceStatus, Plan};

use crate::error::{BillingError, BillingResult};

/// Days between issue and due date
pub const INVOICE_DUE_DAYS: i64 = 14;

/// Invoice generation request
#[derive(Debug, Clone)]
pub struct GenerateInvoice {
    pub tenant_id: Uuid,
    pub amount: Decimal,
    pub plan: Plan,
    pub billing_period: BillingCycle,
}

/// Invoice persistence service
pub struct InvoiceService {
    pool: PgPool,
    clock: SharedClock,
}

impl InvoiceService {
    pub fn new(pool: PgPool, clock: SharedClock) -> Self {
        Self { pool, clock }
    }

    /// Create and persist an OPEN invoice
    pub async fn generate_invoice(&self, params: &GenerateInvoice) -> BillingResult<Invoice> {
        let now = self.clock.now();
        let mut conn = self.pool.acquire().await?;
        let invoice = insert_invoice(&mut conn, params, now).await?;

        tracing::info!(
            tenant_id = %params.tenant_id,
            invoice_id = %invoice.id,
            amount = %invoice.amount,
            plan = %invoice.plan,
            "Generated invoice"
        );

        Ok(invoice)
    }

    pub async fn get_invoice(&self, invoice_id: Uuid) -> BillingResult<Invoice> {
        let invoice: Option<Invoice> = sqlx::query_as("SELECT * FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await?;

        invoice.ok_or_else(|| BillingError::NotFound(format!("Invoice {} not found", invoice_id)))
    }

    /// Invoices for a tenant, newest first
    pub async fn list_for_tenant(&self, tenant_id: Uuid) -> BillingResult<Vec<Invoice>> {
        let invoices: Vec<Invoice> = sqlx::query_as(
            "SELECT * FROM invoices WHERE tenant_id = $1 ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }
}

/// Insert an invoice on an existing connection so state transitions can
/// include it in their transaction.
pub(crate) async fn insert_invoice(
    conn: &mut PgConnection,
    params: &GenerateInvoice,
    now: OffsetDateTime,
) -> BillingResult<Invoice> {
    let invoice: Invoice = sqlx::query_as(
        r#"
        INSERT INTO invoices (id, tenant_id, amount, plan, billing_period, status, due_date, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(params.tenant_id)
    .bind(params.amount)
    .bind(params.plan)
    .bind(params.billing_period)
    .bind(InvoiceStatus::Open)
    .bind(due_date_for(now))
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(invoice)
}

fn due_date_for(issued_at: OffsetDateTime) -> OffsetDateTime {
    issued_at + Duration::days(INVOICE_DUE_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_due_date_is_fourteen_days_out() {
        let issued = datetime!(2026-05-01 10:00 UTC);
        assert_eq!(due_date_for(issued), datetime!(2026-05-15 10:00 UTC));
    }
}
