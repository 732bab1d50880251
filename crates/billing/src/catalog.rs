//! Plan catalog
//!
//! Resolves a plan to its pricing, features and limits. An admin-owned
//! override table takes precedence; hardcoded defaults guarantee every
//! known plan always resolves, so lookups have no failure mode.

use rust_decimal::Decimal;
use sqlx::PgPool;

use fleetops_shared::types::{Plan, PlanConfig, PlanLimits};

use crate::error::BillingResult;

/// Read-only plan configuration resolver
pub struct PlanCatalog {
    pool: PgPool,
}

impl PlanCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a plan's configuration: override row first, defaults on miss
    pub async fn get_plan_config(&self, plan: Plan) -> BillingResult<PlanConfig> {
        let row: Option<PlanConfigRow> = sqlx::query_as(
            r#"
            SELECT
                plan,
                display_name,
                description,
                monthly_price,
                yearly_price,
                features,
                max_vehicles,
                max_users,
                max_drivers
            FROM plan_configurations
            WHERE plan = $1
            "#,
        )
        .bind(plan)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(PlanConfig::from)
            .unwrap_or_else(|| PlanConfig::defaults(plan)))
    }

    /// All known plans with overrides applied, in rank order
    pub async fn list_plans(&self) -> BillingResult<Vec<PlanConfig>> {
        let rows: Vec<PlanConfigRow> = sqlx::query_as(
            r#"
            SELECT
                plan,
                display_name,
                description,
                monthly_price,
                yearly_price,
                features,
                max_vehicles,
                max_users,
                max_drivers
            FROM plan_configurations
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut overrides: Vec<PlanConfig> = rows.into_iter().map(PlanConfig::from).collect();

        Ok(Plan::all()
            .into_iter()
            .map(|plan| match overrides.iter().position(|c| c.plan == plan) {
                Some(i) => overrides.swap_remove(i),
                None => PlanConfig::defaults(plan),
            })
            .collect())
    }
}

/// Raw override row; `features` is stored as a JSONB array of strings
#[derive(Debug, sqlx::FromRow)]
struct PlanConfigRow {
    plan: Plan,
    display_name: String,
    description: String,
    monthly_price: Decimal,
    yearly_price: Decimal,
    features: serde_json::Value,
    max_vehicles: i32,
    max_users: i32,
    max_drivers: i32,
}

impl From<PlanConfigRow> for PlanConfig {
    fn from(row: PlanConfigRow) -> Self {
        let features = row
            .features
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        PlanConfig {
            plan: row.plan,
            display_name: row.display_name,
            description: row.description,
            monthly_price: row.monthly_price,
            yearly_price: row.yearly_price,
            features,
            limits: PlanLimits {
                max_vehicles: row.max_vehicles,
                max_users: row.max_users,
                max_drivers: row.max_drivers,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetops_shared::types::UNLIMITED;

    fn override_row() -> PlanConfigRow {
        PlanConfigRow {
            plan: Plan::Basic,
            display_name: "Basic (promo)".to_string(),
            description: "Discounted launch pricing".to_string(),
            monthly_price: Decimal::new(1999, 2),
            yearly_price: Decimal::new(19990, 2),
            features: serde_json::json!(["Reports", "Exports"]),
            max_vehicles: 30,
            max_users: 20,
            max_drivers: 60,
        }
    }

    #[test]
    fn test_override_row_conversion() {
        let config = PlanConfig::from(override_row());
        assert_eq!(config.plan, Plan::Basic);
        assert_eq!(config.monthly_price, Decimal::new(1999, 2));
        assert_eq!(config.features, vec!["Reports", "Exports"]);
        assert_eq!(config.limits.max_vehicles, 30);
    }

    #[test]
    fn test_malformed_features_become_empty() {
        let mut row = override_row();
        row.features = serde_json::json!({"not": "an array"});
        let config = PlanConfig::from(row);
        assert!(config.features.is_empty());
    }

    #[test]
    fn test_defaults_cover_every_plan() {
        for plan in Plan::all() {
            let config = PlanConfig::defaults(plan);
            assert_eq!(config.plan, plan);
            assert!(!config.display_name.is_empty());
        }
        assert_eq!(
            PlanConfig::defaults(Plan::Premium).limits.max_drivers,
            UNLIMITED
        );
    }
}
