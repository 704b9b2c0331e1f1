//! Warehouse dispatch and stock reconciliation backend
//!
//! Bagged units are produced, batched into daily reports and dispatched against
//! sales orders; goods and kits move through a stock ledger with an audit trail.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod repository;
pub mod routes;
pub mod services;

pub use config::Config;

use clock::Clock;
use repository::Store;
use services::{
    BaggedUnitService, DailyReportService, DispatchService, SalesOrderService, StockAlerts,
    StockService,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub alerts: StockAlerts,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        config: Config,
        clock: Arc<dyn Clock>,
        alerts: StockAlerts,
    ) -> Self {
        Self {
            store,
            config: Arc::new(config),
            clock,
            alerts,
        }
    }

    pub fn bagged_units(&self) -> BaggedUnitService {
        BaggedUnitService::new(self.store.clone(), self.clock.clone())
    }

    pub fn daily_reports(&self) -> DailyReportService {
        DailyReportService::new(self.store.clone(), self.clock.clone())
    }

    pub fn sales_orders(&self) -> SalesOrderService {
        SalesOrderService::new(self.store.clone(), self.clock.clone())
    }

    pub fn dispatches(&self) -> DispatchService {
        DispatchService::new(
            self.store.clone(),
            self.clock.clone(),
            self.config.dispatch.clone(),
        )
    }

    pub fn stock(&self) -> StockService {
        StockService::new(
            self.store.clone(),
            self.clock.clone(),
            self.alerts.clone(),
            self.config.codes.max_retries,
        )
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Almacen Planta API v1"
}
