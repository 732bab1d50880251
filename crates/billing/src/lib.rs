//! FleetOps billing engine
//!
//! Subscription lifecycle (trial, plan changes with proration, cancel /
//! reactivate / renew), plan catalog resolution, invoice generation, the
//! append-only subscription history, and read-only financial reporting.

pub mod catalog;
pub mod error;
pub mod finance;
pub mod history;
pub mod invoice;
pub mod proration;
pub mod records;
pub mod subscription;

pub use catalog::PlanCatalog;
pub use error::{BillingError, BillingResult};
pub use finance::FinancialService;
pub use history::SubscriptionHistoryService;
pub use invoice::InvoiceService;
pub use proration::{Proration, ProrationCalculator};
pub use records::FinanceRecordService;
pub use subscription::SubscriptionService;
