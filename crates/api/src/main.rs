//! FleetOps API server

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetops_api::{routes, AppState, Config};
use fleetops_shared::clock::system_clock;
use fleetops_shared::db::{create_pool, run_migrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetops_api=info,fleetops_billing=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url, config.database_max_connections).await?;
    run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    let state = AppState::new(pool, config.clone(), system_clock());
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!(bind_address = %config.bind_address, "FleetOps API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
