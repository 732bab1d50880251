//! Subscription history
//!
//! Append-only audit trail of subscription transitions. Appends happen
//! inside each transition's transaction; this module also provides reads
//! and a CSV export for compliance and customer statements.

use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use fleetops_shared::types::{ChangeType, Plan, SubscriptionHistoryEntry};

use crate::error::BillingResult;

/// Service for querying and exporting subscription history
pub struct SubscriptionHistoryService {
    pool: PgPool,
}

impl SubscriptionHistoryService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// History entries for a tenant, newest first. Defaults to the last
    /// year when no range is given.
    pub async fn list_for_tenant(
        &self,
        tenant_id: Uuid,
        start_date: Option<OffsetDateTime>,
        end_date: Option<OffsetDateTime>,
    ) -> BillingResult<Vec<SubscriptionHistoryEntry>> {
        let end = end_date.unwrap_or_else(OffsetDateTime::now_utc);
        let start = start_date.unwrap_or(end - time::Duration::days(365));

        let entries: Vec<SubscriptionHistoryEntry> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, change_type, from_plan, to_plan, changed_by, created_at
            FROM subscription_history
            WHERE tenant_id = $1
              AND created_at >= $2
              AND created_at <= $3
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Export a tenant's subscription history to CSV
    pub async fn export_csv(
        &self,
        tenant_id: Uuid,
        start_date: Option<OffsetDateTime>,
        end_date: Option<OffsetDateTime>,
    ) -> BillingResult<String> {
        let entries = self.list_for_tenant(tenant_id, start_date, end_date).await?;
        Ok(render_csv(&entries))
    }
}

/// Append a history entry on an existing connection so state transitions
/// can include it in their transaction.
pub(crate) async fn insert_history(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    change_type: ChangeType,
    from_plan: Plan,
    to_plan: Plan,
    changed_by: &str,
    now: OffsetDateTime,
) -> BillingResult<()> {
    sqlx::query(
        r#"
        INSERT INTO subscription_history (id, tenant_id, change_type, from_plan, to_plan, changed_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(change_type)
    .bind(from_plan)
    .bind(to_plan)
    .bind(changed_by)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn render_csv(entries: &[SubscriptionHistoryEntry]) -> String {
    let mut csv = String::new();
    csv.push_str("Date,Change,From Plan,To Plan,Changed By\n");

    for entry in entries {
        let date = entry
            .created_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            date,
            entry.change_type,
            entry.from_plan,
            entry.to_plan,
            escape_csv_field(&entry.changed_by),
        ));
    }

    csv
}

/// Escape a field for CSV output
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn entry(change_type: ChangeType, changed_by: &str) -> SubscriptionHistoryEntry {
        SubscriptionHistoryEntry {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            change_type,
            from_plan: Plan::Basic,
            to_plan: Plan::Premium,
            changed_by: changed_by.to_string(),
            created_at: datetime!(2026-02-01 08:00 UTC),
        }
    }

    #[test]
    fn test_escape_csv_field() {
        assert_eq!(escape_csv_field("plain"), "plain");
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_render_csv_header_and_rows() {
        let entries = vec![
            entry(ChangeType::Upgrade, "admin@fleet.example"),
            entry(ChangeType::Renewal, "system"),
        ];
        let csv = render_csv(&entries);

        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Date,Change,From Plan,To Plan,Changed By")
        );
        let first = lines.next().unwrap();
        assert!(first.contains("upgrade"));
        assert!(first.contains("basic"));
        assert!(first.contains("premium"));
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_render_csv_escapes_actor() {
        let entries = vec![entry(ChangeType::Cancellation, "Ops, On-call")];
        let csv = render_csv(&entries);
        assert!(csv.contains("\"Ops, On-call\""));
    }
}
