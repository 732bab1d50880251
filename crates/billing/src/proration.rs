//! Prorated plan-change arithmetic
//!
//! Computes the financial adjustment when a tenant switches plan mid-period:
//! the prepaid value of the remainder of the current plan, the cost of the
//! new plan over the same remainder, and the resulting credit. Amounts stay
//! at full `Decimal` precision through the computation; rounding to currency
//! precision happens once, on the result.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use fleetops_shared::clock::SharedClock;
use fleetops_shared::types::{BillingCycle, PlanConfig};

use crate::error::{BillingError, BillingResult};

/// Result of a proration calculation. Transient; consumed immediately by
/// the caller and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proration {
    /// Whole days left in the current period, clamped to `[0, total_days]`
    pub days_remaining: i64,
    /// Whole days in the current period
    pub total_days: i64,
    /// Prepaid value of the remainder on the old plan
    pub unused_amount: Decimal,
    /// Cost of the new plan over the same remainder
    pub new_amount: Decimal,
    /// max(0, unused - new); zero for upgrades
    pub credit_amount: Decimal,
}

/// Calculator for mid-cycle plan changes. Holds the clock so "now" is
/// explicit and tests can pin it.
pub struct ProrationCalculator {
    clock: SharedClock,
}

impl ProrationCalculator {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    /// Prorate a price change over the current subscription window.
    ///
    /// `old_price` and `new_price` are the full-period prices for the
    /// billing cycle the window was sold under.
    pub fn calculate(
        &self,
        old_price: Decimal,
        new_price: Decimal,
        period_start: OffsetDateTime,
        period_end: OffsetDateTime,
    ) -> BillingResult<Proration> {
        let total_days = (period_end - period_start).whole_days();
        if total_days < 1 {
            return Err(BillingError::Validation(
                "Subscription period must span at least one day".to_string(),
            ));
        }

        let now = self.clock.now();
        let days_remaining = (period_end - now).whole_days().clamp(0, total_days);

        let total = Decimal::from(total_days);
        let remaining = Decimal::from(days_remaining);

        // Full precision until the final subtraction
        let unused = old_price / total * remaining;
        let new_amount = new_price / total * remaining;
        let credit = (unused - new_amount).max(Decimal::ZERO);

        Ok(Proration {
            days_remaining,
            total_days,
            unused_amount: round_currency(unused),
            new_amount: round_currency(new_amount),
            credit_amount: round_currency(credit),
        })
    }

    /// Prorate a plan switch using catalog configurations
    pub fn calculate_for_configs(
        &self,
        current: &PlanConfig,
        target: &PlanConfig,
        cycle: BillingCycle,
        period_start: OffsetDateTime,
        period_end: OffsetDateTime,
    ) -> BillingResult<Proration> {
        self.calculate(
            current.price_for_cycle(cycle),
            target.price_for_cycle(cycle),
            period_start,
            period_end,
        )
    }
}

/// Round to 2 decimal places, half away from zero (currency display)
pub(crate) fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
