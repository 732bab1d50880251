//! Common types used across FleetOps

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Subscription plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Basic,
    Premium,
}

impl Default for Plan {
    fn default() -> Self {
        Self::Free
    }
}

impl Plan {
    /// Ordinal rank used to classify plan changes (higher = bigger plan)
    /// Free: 0, Basic: 1, Premium: 2
    pub fn rank(&self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Basic => 1,
            Self::Premium => 2,
        }
    }

    /// All known plans, in rank order
    pub fn all() -> [Plan; 3] {
        [Self::Free, Self::Basic, Self::Premium]
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Basic => write!(f, "basic"),
            Self::Premium => write!(f, "premium"),
        }
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "premium" => Ok(Self::Premium),
            _ => Err(format!("Invalid plan: {}", s)),
        }
    }
}

/// Billing cycle for subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Monthly => write!(f, "monthly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

impl std::str::FromStr for BillingCycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" | "month" => Ok(Self::Monthly),
            "yearly" | "annual" | "year" => Ok(Self::Yearly),
            _ => Err(format!("Invalid billing cycle: {}", s)),
        }
    }
}

/// Tenant subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Canceled,
    Suspended,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Canceled => write!(f, "canceled"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

/// Kind of subscription transition recorded in the audit history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    TrialStart,
    TrialEnd,
    Upgrade,
    Downgrade,
    Renewal,
    Cancellation,
    Reactivation,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrialStart => write!(f, "trial_start"),
            Self::TrialEnd => write!(f, "trial_end"),
            Self::Upgrade => write!(f, "upgrade"),
            Self::Downgrade => write!(f, "downgrade"),
            Self::Renewal => write!(f, "renewal"),
            Self::Cancellation => write!(f, "cancellation"),
            Self::Reactivation => write!(f, "reactivation"),
        }
    }
}

/// Expense approval status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for ExpenseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid expense status: {}", s)),
        }
    }
}

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    #[default]
    Open,
    Paid,
    Void,
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Open => write!(f, "open"),
            Self::Paid => write!(f, "paid"),
            Self::Void => write!(f, "void"),
        }
    }
}

// =============================================================================
// Plan Configuration
// =============================================================================

/// Sentinel meaning "no limit" on a counted resource
pub const UNLIMITED: i32 = -1;

/// Resource limits attached to a plan (-1 = unlimited)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_vehicles: i32,
    pub max_users: i32,
    pub max_drivers: i32,
}

impl PlanLimits {
    /// Whether `current` resources fit under `limit` (-1 never restricts)
    pub fn allows(limit: i32, current: i64) -> bool {
        limit == UNLIMITED || current <= limit as i64
    }
}

/// Pricing, features and limits for a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    pub plan: Plan,
    pub display_name: String,
    pub description: String,
    pub monthly_price: Decimal,
    pub yearly_price: Decimal,
    pub features: Vec<String>,
    pub limits: PlanLimits,
}

impl PlanConfig {
    /// Hardcoded defaults, guaranteeing total coverage over the known plans.
    /// The `plan_configurations` override table takes precedence when populated.
    pub fn defaults(plan: Plan) -> Self {
        match plan {
            Plan::Free => Self {
                plan,
                display_name: "Free".to_string(),
                description: "Starter plan for small fleets".to_string(),
                monthly_price: Decimal::ZERO,
                yearly_price: Decimal::ZERO,
                features: vec![
                    "Vehicle and driver records".to_string(),
                    "Basic expense tracking".to_string(),
                ],
                limits: PlanLimits {
                    max_vehicles: 5,
                    max_users: 3,
                    max_drivers: 10,
                },
            },
            Plan::Basic => Self {
                plan,
                display_name: "Basic".to_string(),
                description: "Growing fleets with approval workflows".to_string(),
                monthly_price: Decimal::new(2999, 2),
                yearly_price: Decimal::new(29990, 2),
                features: vec![
                    "Everything in Free".to_string(),
                    "Financial reports".to_string(),
                    "Invoice history export".to_string(),
                ],
                limits: PlanLimits {
                    max_vehicles: 25,
                    max_users: 15,
                    max_drivers: 50,
                },
            },
            Plan::Premium => Self {
                plan,
                display_name: "Premium".to_string(),
                description: "Unlimited fleet operations".to_string(),
                monthly_price: Decimal::new(9999, 2),
                yearly_price: Decimal::new(99990, 2),
                features: vec![
                    "Everything in Basic".to_string(),
                    "Unlimited vehicles, users and drivers".to_string(),
                    "Per-vehicle profitability".to_string(),
                ],
                limits: PlanLimits {
                    max_vehicles: UNLIMITED,
                    max_users: UNLIMITED,
                    max_drivers: UNLIMITED,
                },
            },
        }
    }

    /// Price of this plan for one period of the given cycle
    pub fn price_for_cycle(&self, cycle: BillingCycle) -> Decimal {
        match cycle {
            BillingCycle::Monthly => self.monthly_price,
            BillingCycle::Yearly => self.yearly_price,
        }
    }
}

// =============================================================================
// Database Models
// =============================================================================

/// Tenant (organization) model. Subscription fields are mutated only by the
/// subscription state machine, never directly by the application layer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub plan: Plan,
    pub billing_cycle: BillingCycle,
    pub status: SubscriptionStatus,
    pub subscription_start_date: OffsetDateTime,
    pub subscription_end_date: OffsetDateTime,
    pub is_in_trial: bool,
    pub trial_end_date: Option<OffsetDateTime>,
    pub auto_renew: bool,
    pub monthly_revenue: Decimal,
    pub cancel_reason: Option<String>,
    pub canceled_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Append-only audit record of a subscription transition
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionHistoryEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub change_type: ChangeType,
    pub from_plan: Plan,
    pub to_plan: Plan,
    pub changed_by: String,
    pub created_at: OffsetDateTime,
}

/// Invoice model
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub amount: Decimal,
    pub plan: Plan,
    pub billing_period: BillingCycle,
    pub status: InvoiceStatus,
    pub due_date: OffsetDateTime,
    pub paid_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Income record model
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IncomeRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub amount: Decimal,
    pub source: String,
    pub vehicle_id: Option<Uuid>,
    pub occurred_on: OffsetDateTime,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Expense record model
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExpenseRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub amount: Decimal,
    pub category: String,
    pub status: ExpenseStatus,
    pub vehicle_id: Option<Uuid>,
    pub occurred_on: OffsetDateTime,
    pub description: Option<String>,
    pub reviewed_by: Option<String>,
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_plan_default() {
        assert_eq!(Plan::default(), Plan::Free);
    }

    #[test]
    fn test_plan_rank_ordering() {
        assert!(Plan::Free.rank() < Plan::Basic.rank());
        assert!(Plan::Basic.rank() < Plan::Premium.rank());
    }

    #[test]
    fn test_plan_display_and_parse() {
        for plan in Plan::all() {
            assert_eq!(Plan::from_str(&plan.to_string()), Ok(plan));
        }
        assert_eq!(Plan::from_str("PREMIUM"), Ok(Plan::Premium));
        assert!(Plan::from_str("platinum").is_err());
    }

    #[test]
    fn test_billing_cycle_parse_aliases() {
        assert_eq!(BillingCycle::from_str("monthly"), Ok(BillingCycle::Monthly));
        assert_eq!(BillingCycle::from_str("month"), Ok(BillingCycle::Monthly));
        assert_eq!(BillingCycle::from_str("annual"), Ok(BillingCycle::Yearly));
        assert_eq!(BillingCycle::from_str("YEARLY"), Ok(BillingCycle::Yearly));
        assert!(BillingCycle::from_str("weekly").is_err());
    }

    #[test]
    fn test_change_type_display() {
        assert_eq!(ChangeType::TrialStart.to_string(), "trial_start");
        assert_eq!(ChangeType::Upgrade.to_string(), "upgrade");
        assert_eq!(ChangeType::Reactivation.to_string(), "reactivation");
    }

    #[test]
    fn test_plan_defaults_pricing() {
        let free = PlanConfig::defaults(Plan::Free);
        assert_eq!(free.monthly_price, Decimal::ZERO);
        assert_eq!(free.yearly_price, Decimal::ZERO);

        let basic = PlanConfig::defaults(Plan::Basic);
        assert_eq!(basic.monthly_price, Decimal::new(2999, 2));
        assert_eq!(basic.yearly_price, Decimal::new(29990, 2));

        let premium = PlanConfig::defaults(Plan::Premium);
        assert_eq!(premium.monthly_price, Decimal::new(9999, 2));
        assert_eq!(premium.yearly_price, Decimal::new(99990, 2));
    }

    #[test]
    fn test_plan_defaults_limits() {
        let free = PlanConfig::defaults(Plan::Free).limits;
        assert_eq!(free.max_vehicles, 5);
        assert_eq!(free.max_users, 3);
        assert_eq!(free.max_drivers, 10);

        let basic = PlanConfig::defaults(Plan::Basic).limits;
        assert_eq!(basic.max_vehicles, 25);
        assert_eq!(basic.max_drivers, 50);

        let premium = PlanConfig::defaults(Plan::Premium).limits;
        assert_eq!(premium.max_vehicles, UNLIMITED);
        assert_eq!(premium.max_users, UNLIMITED);
        assert_eq!(premium.max_drivers, UNLIMITED);
    }

    #[test]
    fn test_limits_allows() {
        assert!(PlanLimits::allows(5, 5));
        assert!(!PlanLimits::allows(5, 6));
        assert!(PlanLimits::allows(UNLIMITED, 1_000_000));
        assert!(PlanLimits::allows(0, 0));
    }

    #[test]
    fn test_price_for_cycle() {
        let basic = PlanConfig::defaults(Plan::Basic);
        assert_eq!(
            basic.price_for_cycle(BillingCycle::Monthly),
            Decimal::new(2999, 2)
        );
        assert_eq!(
            basic.price_for_cycle(BillingCycle::Yearly),
            Decimal::new(29990, 2)
        );
    }
}
