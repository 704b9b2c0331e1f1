//! Route definitions for the warehouse dispatch API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes; every route below requires a bearer token
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/bagged-units", bagged_unit_routes())
        .nest("/daily-reports", daily_report_routes())
        .nest("/sales-orders", sales_order_routes())
        .nest("/dispatches", dispatch_routes())
        .nest("/stock", stock_routes())
        .nest("/reports", report_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn bagged_unit_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_bagged_units).post(handlers::create_bagged_unit),
        )
        .route("/unassociated", get(handlers::list_unassociated_units))
        .route(
            "/:code",
            get(handlers::get_bagged_unit).delete(handlers::delete_bagged_unit),
        )
        .route(
            "/:code/dispatch-status",
            get(handlers::get_unit_dispatch_status),
        )
}

fn daily_report_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_daily_reports).post(handlers::create_daily_report),
        )
        .route(
            "/:id",
            get(handlers::get_daily_report)
                .put(handlers::update_daily_report)
                .delete(handlers::delete_daily_report),
        )
        .route("/:id/approve", post(handlers::approve_daily_report))
        .route("/:id/claim", post(handlers::claim_units))
        .route(
            "/:id/units/:code",
            post(handlers::associate_unit).delete(handlers::disassociate_unit),
        )
}

fn sales_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_sales_orders).post(handlers::create_sales_order),
        )
        .route(
            "/:id",
            get(handlers::get_sales_order).delete(handlers::delete_sales_order),
        )
        .route("/:id/dispatches", get(handlers::list_order_dispatches))
}

fn dispatch_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_dispatch))
        .route("/manual", post(handlers::create_manual_dispatch))
}

fn stock_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/goods",
            get(handlers::list_goods).post(handlers::create_good),
        )
        .route("/goods/:id", get(handlers::get_good))
        .route(
            "/goods/:id/stock",
            get(handlers::get_good_stock).put(handlers::set_good_stock),
        )
        .route("/goods/:id/increment", post(handlers::increment_good_stock))
        .route("/goods/:id/decrement", post(handlers::decrement_good_stock))
        .route("/kits", post(handlers::create_kit))
        .route("/kits/:id", get(handlers::get_kit))
        .route("/kits/:id/stock", get(handlers::get_kit_stock))
        .route(
            "/movements",
            get(handlers::list_movements).post(handlers::adjust_stock),
        )
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/dispatched", get(handlers::get_dispatched_report))
        .route("/production", get(handlers::get_production_report))
        .route("/stock-snapshot", get(handlers::get_stock_snapshot))
}
