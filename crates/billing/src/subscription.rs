//! Subscription state machine
//!
//! Owns every mutation of a tenant's subscription state: trial lifecycle,
//! plan changes (with optional proration), cancellation, reactivation,
//! renewal, and advisory plan-limit validation. Each transition executes as
//! one database transaction wrapping the tenant read-modify-write plus the
//! append of a subscription-history entry.

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use fleetops_shared::clock::SharedClock;
use fleetops_shared::types::{
    BillingCycle, ChangeType, Invoice, Plan, PlanLimits, SubscriptionStatus, Tenant,
};

use crate::catalog::PlanCatalog;
use crate::error::{BillingError, BillingResult};
use crate::history::insert_history;
use crate::invoice::{insert_invoice, GenerateInvoice};
use crate::proration::{Proration, ProrationCalculator};

/// Default trial length when the caller does not specify one
pub const DEFAULT_TRIAL_DAYS: i64 = 30;

/// Actor recorded for system-initiated transitions
const SYSTEM_ACTOR: &str = "system";

/// Parameters for a plan change
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePlanParams {
    pub target_plan: Plan,
    /// Defaults to the tenant's current cycle when omitted
    pub billing_cycle: Option<BillingCycle>,
    /// Compute a proration preview over the current window
    #[serde(default)]
    pub prorate: bool,
}

/// Parameters for a cancellation
#[derive(Debug, Clone, Deserialize)]
pub struct CancelParams {
    /// true: cancel now and drop to FREE; false: stop auto-renewal only
    #[serde(default)]
    pub immediate: bool,
    pub reason: Option<String>,
}

/// Result of a plan change. Proration is advisory: the invoice carries the
/// full new-plan price and the credit is applied by a separate process.
#[derive(Debug, Clone, Serialize)]
pub struct ChangePlanOutcome {
    pub tenant: Tenant,
    pub invoice: Invoice,
    pub proration: Option<Proration>,
}

/// Result of a renewal
#[derive(Debug, Clone, Serialize)]
pub struct RenewalOutcome {
    pub tenant: Tenant,
    pub invoice: Invoice,
}

/// Advisory plan-limit check result
#[derive(Debug, Clone, Serialize)]
pub struct LimitCheck {
    pub within_limits: bool,
    pub violations: Vec<String>,
}

/// Current counts of limit-governed resources
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResourceCounts {
    pub vehicles: i64,
    pub users: i64,
    pub drivers: i64,
}

/// Subscription lifecycle service
pub struct SubscriptionService {
    pool: PgPool,
    clock: SharedClock,
}

impl SubscriptionService {
    pub fn new(pool: PgPool, clock: SharedClock) -> Self {
        Self { pool, clock }
    }

    /// Fetch a tenant's current subscription state
    pub async fn get_tenant(&self, tenant_id: Uuid) -> BillingResult<Tenant> {
        let tenant: Option<Tenant> = sqlx::query_as("SELECT * FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        tenant.ok_or_else(|| BillingError::NotFound(format!("Tenant {} not found", tenant_id)))
    }

    /// Put a tenant into trial: FREE plan, active, trial end `duration_days`
    /// from now. Re-trial is not guarded; repeated TRIAL_START entries stay
    /// visible in the history for the back office.
    pub async fn start_trial(
        &self,
        tenant_id: Uuid,
        duration_days: Option<i64>,
    ) -> BillingResult<Tenant> {
        let days = duration_days.unwrap_or(DEFAULT_TRIAL_DAYS);
        let now = self.clock.now();
        let trial_end = now + Duration::days(days);

        let mut tx = self.pool.begin().await?;
        let tenant = load_tenant_for_update(&mut tx, tenant_id).await?;

        let updated: Tenant = sqlx::query_as(
            r#"
            UPDATE tenants
            SET plan = $2,
                is_in_trial = TRUE,
                status = $3,
                trial_end_date = $4,
                updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(Plan::Free)
        .bind(SubscriptionStatus::Active)
        .bind(trial_end)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        insert_history(
            &mut tx,
            tenant_id,
            ChangeType::TrialStart,
            Plan::Free,
            Plan::Free,
            SYSTEM_ACTOR,
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            previous_plan = %tenant.plan,
            trial_end = %trial_end,
            "Started trial"
        );

        Ok(updated)
    }

    /// Convert a trialing tenant onto `conversion_plan` (FREE by default)
    pub async fn end_trial(
        &self,
        tenant_id: Uuid,
        conversion_plan: Option<Plan>,
    ) -> BillingResult<Tenant> {
        let plan = conversion_plan.unwrap_or(Plan::Free);
        let now = self.clock.now();

        let mut tx = self.pool.begin().await?;
        let tenant = load_tenant_for_update(&mut tx, tenant_id).await?;

        if !tenant.is_in_trial {
            return Err(BillingError::InvalidState(
                "Tenant is not in trial".to_string(),
            ));
        }

        let updated: Tenant = sqlx::query_as(
            r#"
            UPDATE tenants
            SET is_in_trial = FALSE,
                plan = $2,
                updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(plan)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        insert_history(
            &mut tx,
            tenant_id,
            ChangeType::TrialEnd,
            tenant.plan,
            plan,
            SYSTEM_ACTOR,
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            conversion_plan = %plan,
            "Ended trial"
        );

        Ok(updated)
    }

    /// Switch a tenant's plan and/or billing cycle. Rejects no-op changes,
    /// optionally prorates over the current window, persists the change,
    /// triggers an invoice for the new plan's full price, and records the
    /// transition.
    pub async fn change_plan(
        &self,
        tenant_id: Uuid,
        params: ChangePlanParams,
        actor: &str,
    ) -> BillingResult<ChangePlanOutcome> {
        let now = self.clock.now();
        let catalog = PlanCatalog::new(self.pool.clone());

        let mut tx = self.pool.begin().await?;
        let tenant = load_tenant_for_update(&mut tx, tenant_id).await?;

        let cycle = params.billing_cycle.unwrap_or(tenant.billing_cycle);
        if params.target_plan == tenant.plan && cycle == tenant.billing_cycle {
            return Err(BillingError::InvalidState(
                "Already on target plan and billing cycle".to_string(),
            ));
        }

        let change_type = classify_change(tenant.plan, params.target_plan);
        let current_config = catalog.get_plan_config(tenant.plan).await?;
        let target_config = catalog.get_plan_config(params.target_plan).await?;

        // Proration is computed over the window the tenant already paid for,
        // at the prices of the cycle it was sold under.
        let proration = if params.prorate {
            let calculator = ProrationCalculator::new(self.clock.clone());
            Some(calculator.calculate_for_configs(
                &current_config,
                &target_config,
                tenant.billing_cycle,
                tenant.subscription_start_date,
                tenant.subscription_end_date,
            )?)
        } else {
            None
        };

        let updated: Tenant = sqlx::query_as(
            r#"
            UPDATE tenants
            SET plan = $2,
                billing_cycle = $3,
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(params.target_plan)
        .bind(cycle)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let invoice = insert_invoice(
            &mut tx,
            &GenerateInvoice {
                tenant_id,
                amount: target_config.price_for_cycle(cycle),
                plan: params.target_plan,
                billing_period: cycle,
            },
            now,
        )
        .await?;

        insert_history(
            &mut tx,
            tenant_id,
            change_type,
            tenant.plan,
            params.target_plan,
            actor,
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            from_plan = %tenant.plan,
            to_plan = %params.target_plan,
            billing_cycle = %cycle,
            change_type = %change_type,
            invoice_amount = %invoice.amount,
            prorated = proration.is_some(),
            "Changed plan"
        );

        Ok(ChangePlanOutcome {
            tenant: updated,
            invoice,
            proration,
        })
    }

    /// Cancel a subscription. Immediate cancellation drops the tenant to
    /// FREE now; deferred cancellation only disables auto-renewal and lets
    /// the current period run out.
    pub async fn cancel_subscription(
        &self,
        tenant_id: Uuid,
        params: CancelParams,
        actor: &str,
    ) -> BillingResult<Tenant> {
        let now = self.clock.now();

        let mut tx = self.pool.begin().await?;
        let tenant = load_tenant_for_update(&mut tx, tenant_id).await?;

        let updated: Tenant = if params.immediate {
            sqlx::query_as(
                r#"
                UPDATE tenants
                SET status = $2,
                    plan = $3,
                    auto_renew = FALSE,
                    cancel_reason = $4,
                    canceled_at = $5,
                    updated_at = $5
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(tenant_id)
            .bind(SubscriptionStatus::Canceled)
            .bind(Plan::Free)
            .bind(&params.reason)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?
        } else {
            sqlx::query_as(
                r#"
                UPDATE tenants
                SET auto_renew = FALSE,
                    cancel_reason = $2,
                    updated_at = $3
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(tenant_id)
            .bind(&params.reason)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?
        };

        let to_plan = if params.immediate {
            Plan::Free
        } else {
            tenant.plan
        };
        insert_history(
            &mut tx,
            tenant_id,
            ChangeType::Cancellation,
            tenant.plan,
            to_plan,
            actor,
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            immediate = params.immediate,
            reason = params.reason.as_deref().unwrap_or(""),
            "Canceled subscription"
        );

        Ok(updated)
    }

    /// Reactivate a canceled subscription onto `new_plan`
    pub async fn reactivate_subscription(
        &self,
        tenant_id: Uuid,
        new_plan: Plan,
        actor: &str,
    ) -> BillingResult<Tenant> {
        let now = self.clock.now();
        let catalog = PlanCatalog::new(self.pool.clone());

        let mut tx = self.pool.begin().await?;
        let tenant = load_tenant_for_update(&mut tx, tenant_id).await?;

        if tenant.status != SubscriptionStatus::Canceled {
            return Err(BillingError::InvalidState(
                "Subscription is not canceled".to_string(),
            ));
        }

        let config = catalog.get_plan_config(new_plan).await?;

        let updated: Tenant = sqlx::query_as(
            r#"
            UPDATE tenants
            SET status = $2,
                plan = $3,
                auto_renew = TRUE,
                canceled_at = NULL,
                cancel_reason = NULL,
                monthly_revenue = $4,
                updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(SubscriptionStatus::Active)
        .bind(new_plan)
        .bind(config.monthly_price)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        insert_history(
            &mut tx,
            tenant_id,
            ChangeType::Reactivation,
            tenant.plan,
            new_plan,
            actor,
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            new_plan = %new_plan,
            monthly_revenue = %config.monthly_price,
            "Reactivated subscription"
        );

        Ok(updated)
    }

    /// Renew a subscription for one more cycle: invoice the current plan at
    /// the current cycle's price and advance the subscription window so the
    /// renewal sweep converges.
    pub async fn renew_subscription(&self, tenant_id: Uuid) -> BillingResult<RenewalOutcome> {
        let now = self.clock.now();
        let catalog = PlanCatalog::new(self.pool.clone());

        let mut tx = self.pool.begin().await?;
        let tenant = load_tenant_for_update(&mut tx, tenant_id).await?;

        if !tenant.auto_renew {
            return Err(BillingError::InvalidState(
                "Auto-renewal is disabled".to_string(),
            ));
        }

        let config = catalog.get_plan_config(tenant.plan).await?;
        let amount = config.price_for_cycle(tenant.billing_cycle);

        let period_start = tenant.subscription_end_date;
        let period_end = advance_period(period_start, tenant.billing_cycle)?;

        let updated: Tenant = sqlx::query_as(
            r#"
            UPDATE tenants
            SET subscription_start_date = $2,
                subscription_end_date = $3,
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(period_start)
        .bind(period_end)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let invoice = insert_invoice(
            &mut tx,
            &GenerateInvoice {
                tenant_id,
                amount,
                plan: tenant.plan,
                billing_period: tenant.billing_cycle,
            },
            now,
        )
        .await?;

        insert_history(
            &mut tx,
            tenant_id,
            ChangeType::Renewal,
            tenant.plan,
            tenant.plan,
            SYSTEM_ACTOR,
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            plan = %tenant.plan,
            amount = %amount,
            period_end = %period_end,
            "Renewed subscription"
        );

        Ok(RenewalOutcome {
            tenant: updated,
            invoice,
        })
    }

    /// Advisory check of current resource counts against the plan's limits.
    /// Never mutates state; enforcement lives with the admission checks.
    pub async fn validate_plan_limits(&self, tenant_id: Uuid) -> BillingResult<LimitCheck> {
        let tenant = self.get_tenant(tenant_id).await?;
        let counts = self.resource_counts(tenant_id).await?;
        let catalog = PlanCatalog::new(self.pool.clone());
        let config = catalog.get_plan_config(tenant.plan).await?;

        Ok(check_limits(&counts, &config.limits))
    }

    async fn resource_counts(&self, tenant_id: Uuid) -> BillingResult<ResourceCounts> {
        let (vehicles, users, drivers): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM vehicles WHERE tenant_id = $1),
                (SELECT COUNT(*) FROM users WHERE tenant_id = $1),
                (SELECT COUNT(*) FROM drivers WHERE tenant_id = $1)
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ResourceCounts {
            vehicles,
            users,
            drivers,
        })
    }
}

/// Load a tenant row with a row lock so concurrent transitions serialize
async fn load_tenant_for_update(
    conn: &mut PgConnection,
    tenant_id: Uuid,
) -> BillingResult<Tenant> {
    let tenant: Option<Tenant> = sqlx::query_as("SELECT * FROM tenants WHERE id = $1 FOR UPDATE")
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?;

    tenant.ok_or_else(|| BillingError::NotFound(format!("Tenant {} not found", tenant_id)))
}

/// Classify a plan change by ordinal rank. An equal-rank change (billing
/// cycle only) is recorded as an upgrade so it still lands in the audit
/// trail, with from == to revealing the cycle switch.
pub fn classify_change(from: Plan, to: Plan) -> ChangeType {
    if to.rank() < from.rank() {
        ChangeType::Downgrade
    } else {
        ChangeType::Upgrade
    }
}

/// Compare counts against limits (-1 = unlimited), formatting one violation
/// string per exceeded resource.
pub fn check_limits(counts: &ResourceCounts, limits: &PlanLimits) -> LimitCheck {
    let mut violations = Vec::new();

    for (resource, current, limit) in [
        ("Vehicles", counts.vehicles, limits.max_vehicles),
        ("Users", counts.users, limits.max_users),
        ("Drivers", counts.drivers, limits.max_drivers),
    ] {
        if !PlanLimits::allows(limit, current) {
            violations.push(format!(
                "{} limit exceeded: {}/{}",
                resource, current, limit
            ));
        }
    }

    LimitCheck {
        within_limits: violations.is_empty(),
        violations,
    }
}

/// Advance a period boundary by one billing cycle, calendar-aware: the day
/// of month is clamped to the target month's length (Jan 31 + 1 month =
/// Feb 28/29, Feb 29 + 1 year = Feb 28).
pub fn advance_period(
    from: OffsetDateTime,
    cycle: BillingCycle,
) -> BillingResult<OffsetDateTime> {
    let months = match cycle {
        BillingCycle::Monthly => 1,
        BillingCycle::Yearly => 12,
    };
    add_months(from, months)
}

fn add_months(dt: OffsetDateTime, months: i32) -> BillingResult<OffsetDateTime> {
    let date = dt.date();
    let zero_based = date.month() as i32 - 1 + months;
    let year = date.year() + zero_based.div_euclid(12);
    let month = time::Month::try_from((zero_based.rem_euclid(12) + 1) as u8)
        .map_err(|e| BillingError::Internal(format!("Invalid month arithmetic: {}", e)))?;
    let day = date.day().min(time::util::days_in_year_month(year, month));
    let new_date = time::Date::from_calendar_date(year, month, day)
        .map_err(|e| BillingError::Internal(format!("Invalid date arithmetic: {}", e)))?;
    Ok(dt.replace_date(new_date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetops_shared::types::{PlanConfig, UNLIMITED};
    use time::macros::datetime;

    // =========================================================================
    // Change classification
    // =========================================================================

    #[test]
    fn test_classify_upgrade_and_downgrade() {
        assert_eq!(
            classify_change(Plan::Free, Plan::Basic),
            ChangeType::Upgrade
        );
        assert_eq!(
            classify_change(Plan::Basic, Plan::Premium),
            ChangeType::Upgrade
        );
        assert_eq!(
            classify_change(Plan::Premium, Plan::Free),
            ChangeType::Downgrade
        );
        assert_eq!(
            classify_change(Plan::Basic, Plan::Free),
            ChangeType::Downgrade
        );
    }

    #[test]
    fn test_classify_cycle_only_change_records_upgrade() {
        assert_eq!(
            classify_change(Plan::Basic, Plan::Basic),
            ChangeType::Upgrade
        );
    }

    // =========================================================================
    // Limit checks
    // =========================================================================

    #[test]
    fn test_check_limits_reports_all_violations() {
        let counts = ResourceCounts {
            vehicles: 8,
            users: 5,
            drivers: 15,
        };
        let limits = PlanConfig::defaults(Plan::Free).limits;

        let check = check_limits(&counts, &limits);
        assert!(!check.within_limits);
        assert_eq!(
            check.violations,
            vec![
                "Vehicles limit exceeded: 8/5",
                "Users limit exceeded: 5/3",
                "Drivers limit exceeded: 15/10",
            ]
        );
    }

    #[test]
    fn test_check_limits_within() {
        let counts = ResourceCounts {
            vehicles: 5,
            users: 3,
            drivers: 10,
        };
        let limits = PlanConfig::defaults(Plan::Free).limits;

        let check = check_limits(&counts, &limits);
        assert!(check.within_limits);
        assert!(check.violations.is_empty());
    }

    #[test]
    fn test_check_limits_unlimited_never_violates() {
        let counts = ResourceCounts {
            vehicles: 10_000,
            users: 10_000,
            drivers: 10_000,
        };
        let limits = PlanLimits {
            max_vehicles: UNLIMITED,
            max_users: UNLIMITED,
            max_drivers: UNLIMITED,
        };

        assert!(check_limits(&counts, &limits).within_limits);
    }

    // =========================================================================
    // Period arithmetic
    // =========================================================================

    #[test]
    fn test_advance_monthly_clamps_day_of_month() {
        let end = advance_period(datetime!(2026-01-31 00:00 UTC), BillingCycle::Monthly).unwrap();
        assert_eq!(end.date(), time::macros::date!(2026-02-28));

        let leap = advance_period(datetime!(2024-01-31 00:00 UTC), BillingCycle::Monthly).unwrap();
        assert_eq!(leap.date(), time::macros::date!(2024-02-29));
    }

    #[test]
    fn test_advance_monthly_rolls_over_year() {
        let end = advance_period(datetime!(2026-12-15 00:00 UTC), BillingCycle::Monthly).unwrap();
        assert_eq!(end.date(), time::macros::date!(2027-01-15));
    }

    #[test]
    fn test_advance_yearly_clamps_leap_day() {
        let end = advance_period(datetime!(2024-02-29 00:00 UTC), BillingCycle::Yearly).unwrap();
        assert_eq!(end.date(), time::macros::date!(2025-02-28));
    }

    #[test]
    fn test_advance_preserves_time_of_day() {
        let end = advance_period(datetime!(2026-03-10 09:30 UTC), BillingCycle::Monthly).unwrap();
        assert_eq!(end, datetime!(2026-04-10 09:30 UTC));
    }
}
