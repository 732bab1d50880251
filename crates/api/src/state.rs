//! Shared application state

use sqlx::PgPool;

use fleetops_billing::{
    FinanceRecordService, FinancialService, InvoiceService, PlanCatalog,
    SubscriptionHistoryService, SubscriptionService,
};
use fleetops_shared::clock::SharedClock;

use crate::config::Config;

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub clock: SharedClock,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, clock: SharedClock) -> Self {
        Self {
            pool,
            config,
            clock,
        }
    }

    pub fn subscriptions(&self) -> SubscriptionService {
        SubscriptionService::new(self.pool.clone(), self.clock.clone())
    }

    pub fn catalog(&self) -> PlanCatalog {
        PlanCatalog::new(self.pool.clone())
    }

    pub fn invoices(&self) -> InvoiceService {
        InvoiceService::new(self.pool.clone(), self.clock.clone())
    }

    pub fn history(&self) -> SubscriptionHistoryService {
        SubscriptionHistoryService::new(self.pool.clone())
    }

    pub fn finance(&self) -> FinancialService {
        FinancialService::new(self.pool.clone())
    }

    pub fn finance_records(&self) -> FinanceRecordService {
        FinanceRecordService::new(self.pool.clone(), self.clock.clone())
    }
}
