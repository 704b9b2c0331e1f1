//! Warehouse dispatch platform - backend server
//!
//! Tracks bagged production units, daily shift reports, sales order dispatches
//! and the goods/kits stock ledger for a single plant.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use almacen_backend::{
    clock::SystemClock,
    create_app,
    repository::{MemoryStore, PgStore, Store},
    services::StockAlerts,
    AppState, Config,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "almacen_server=debug,almacen_backend=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting warehouse dispatch server");
    tracing::info!("Environment: {}", config.environment);

    let store: Arc<dyn Store> = if config.database.is_memory() {
        tracing::warn!("Using the in-memory store; data is lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        tracing::info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.database.url)
            .await?;
        tracing::info!("Database connection established");

        // Run migrations in development
        if config.environment == "development" {
            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&db_pool).await?;
            tracing::info!("Migrations completed");
        }
        Arc::new(PgStore::new(db_pool))
    };

    let alerts = StockAlerts::from_config(&config.alerts)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    let state = AppState::new(store, config, Arc::new(SystemClock), alerts);
    let app = create_app(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
