//! Scheduled billing sweeps
//!
//! The subscription state machine is driven externally for time-based
//! transitions: this module ends trials whose end date has passed and
//! renews subscriptions whose period has lapsed. Failures on individual
//! tenants are logged and skipped so one bad record cannot stall the sweep.

use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use fleetops_billing::SubscriptionService;
use fleetops_shared::clock::SharedClock;

/// Cap per sweep so a backlog drains over several runs instead of one
/// long-lived burst of transactions.
const SWEEP_BATCH_SIZE: i64 = 100;

/// End trials whose `trial_end_date` has passed, converting to FREE.
/// Returns the number of trials ended.
pub async fn expire_trials(pool: &PgPool, clock: &SharedClock) -> u32 {
    let now = clock.now();

    let due: Vec<(Uuid,)> = match sqlx::query_as(
        r#"
        SELECT id
        FROM tenants
        WHERE is_in_trial = TRUE
          AND trial_end_date IS NOT NULL
          AND trial_end_date < $1
        ORDER BY trial_end_date ASC
        LIMIT $2
        "#,
    )
    .bind(now)
    .bind(SWEEP_BATCH_SIZE)
    .fetch_all(pool)
    .await
    {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %e, "Failed to fetch expired trials");
            return 0;
        }
    };

    if due.is_empty() {
        return 0;
    }

    info!(count = due.len(), "Ending expired trials");
    let service = SubscriptionService::new(pool.clone(), clock.clone());

    let mut ended = 0;
    for (tenant_id,) in due {
        match service.end_trial(tenant_id, None).await {
            Ok(_) => ended += 1,
            Err(e) => {
                // Likely a concurrent conversion; the next sweep re-checks
                error!(tenant_id = %tenant_id, error = %e, "Failed to end trial");
            }
        }
    }

    ended
}

/// Renew subscriptions whose period has lapsed with auto-renewal enabled.
/// Returns the number of renewals performed.
pub async fn renew_due_subscriptions(pool: &PgPool, clock: &SharedClock) -> u32 {
    let now = clock.now();

    let due: Vec<(Uuid,)> = match sqlx::query_as(
        r#"
        SELECT id
        FROM tenants
        WHERE auto_renew = TRUE
          AND status = 'active'
          AND subscription_end_date < $1
        ORDER BY subscription_end_date ASC
        LIMIT $2
        "#,
    )
    .bind(now)
    .bind(SWEEP_BATCH_SIZE)
    .fetch_all(pool)
    .await
    {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %e, "Failed to fetch renewals due");
            return 0;
        }
    };

    if due.is_empty() {
        return 0;
    }

    info!(count = due.len(), "Renewing lapsed subscriptions");
    let service = SubscriptionService::new(pool.clone(), clock.clone());

    let mut renewed = 0;
    for (tenant_id,) in due {
        match service.renew_subscription(tenant_id).await {
            Ok(outcome) => {
                renewed += 1;
                info!(
                    tenant_id = %tenant_id,
                    invoice_id = %outcome.invoice.id,
                    amount = %outcome.invoice.amount,
                    "Renewed subscription"
                );
            }
            Err(e) => {
                // Auto-renew may have been disabled between select and renew
                error!(tenant_id = %tenant_id, error = %e, "Failed to renew subscription");
            }
        }
    }

    renewed
}
