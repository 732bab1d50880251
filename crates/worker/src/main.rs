//! FleetOps billing worker
//!
//! Runs the time-driven side of the subscription state machine on a cron
//! schedule: trial expiry and subscription renewal.

mod sweeps;

use std::env;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetops_shared::clock::system_clock;
use fleetops_shared::db::create_pool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetops_worker=info,fleetops_billing=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = env::var("DATABASE_URL")?;
    let pool = create_pool(&database_url, 3).await?;

    // Every 15 minutes is plenty: both sweeps are idempotent and re-check
    // their predicates on each run.
    let schedule = env::var("BILLING_SWEEP_SCHEDULE").unwrap_or_else(|_| "0 */15 * * * *".into());

    let scheduler = JobScheduler::new().await?;

    let trial_pool = pool.clone();
    scheduler
        .add(Job::new_async(schedule.as_str(), move |_uuid, _lock| {
            let pool = trial_pool.clone();
            Box::pin(async move {
                let clock = system_clock();
                let ended = sweeps::expire_trials(&pool, &clock).await;
                if ended > 0 {
                    tracing::info!(ended, "Trial expiry sweep complete");
                }
            })
        })?)
        .await?;

    let renew_pool = pool.clone();
    scheduler
        .add(Job::new_async(schedule.as_str(), move |_uuid, _lock| {
            let pool = renew_pool.clone();
            Box::pin(async move {
                let clock = system_clock();
                let renewed = sweeps::renew_due_subscriptions(&pool, &clock).await;
                if renewed > 0 {
                    tracing::info!(renewed, "Renewal sweep complete");
                }
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!(schedule = %schedule, "FleetOps worker started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down worker");

    Ok(())
}
