//! API routes

pub mod finance;
pub mod health;
pub mod plans;
pub mod subscription;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new().route("/health", get(health::health));

    let api_routes = Router::new()
        // Plan catalog
        .route("/plans", get(plans::list_plans))
        // Subscription lifecycle
        .route("/tenants/:id/subscription", get(subscription::get_subscription))
        .route("/tenants/:id/subscription/trial", post(subscription::start_trial))
        .route("/tenants/:id/subscription/trial/end", post(subscription::end_trial))
        .route("/tenants/:id/subscription/plan", post(subscription::change_plan))
        .route("/tenants/:id/subscription/cancel", post(subscription::cancel))
        .route("/tenants/:id/subscription/reactivate", post(subscription::reactivate))
        .route("/tenants/:id/subscription/renew", post(subscription::renew))
        .route("/tenants/:id/subscription/limits", get(subscription::limits))
        .route("/tenants/:id/subscription/history", get(subscription::history))
        // Invoices
        .route("/tenants/:id/invoices", get(subscription::list_invoices))
        .route("/invoices/:id", get(subscription::get_invoice))
        // Finance records and reports
        .route("/tenants/:id/finance/income", post(finance::record_income))
        .route("/tenants/:id/finance/expenses", post(finance::record_expense))
        .route("/expenses/:id/status", post(finance::set_expense_status))
        .route("/tenants/:id/reports/profit-loss", get(finance::profit_loss))
        .route("/tenants/:id/reports/cash-flow", get(finance::cash_flow))
        .route("/tenants/:id/reports/summary", get(finance::summary))
        .route("/vehicles/:id/reports/profitability", get(finance::vehicle_profitability));

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
