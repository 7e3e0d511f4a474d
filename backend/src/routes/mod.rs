//! Route definitions for the Pharmaceutical Inventory Tracker

use axum::{routing::get, Router};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/products", product_routes())
        .nest("/batches", batch_routes())
        .nest("/usage", usage_routes())
        .nest("/forecast", forecast_routes())
        .nest("/snapshots", snapshot_routes())
        .nest("/reports", report_routes())
}

/// Product catalog routes
fn product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/:product_id/batches", get(handlers::list_product_batches))
}

/// Batch routes
fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches).post(handlers::create_batch))
        .route(
            "/:batch_id",
            get(handlers::get_batch)
                .put(handlers::update_batch)
                .delete(handlers::delete_batch),
        )
}

/// Usage log routes
fn usage_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_usage).post(handlers::record_usage))
}

/// Forecast routes
fn forecast_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::stream_forecast))
        .route("/data", get(handlers::get_forecast_data))
        .route("/summary", get(handlers::get_forecast_summary))
}

/// Snapshot routes
fn snapshot_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_snapshots))
        // GET takes a snapshot id, POST a snapshot type
        .route(
            "/:snapshot",
            get(handlers::get_snapshot).post(handlers::capture_snapshot),
        )
}

/// Weekly report routes
fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/weekly", get(handlers::get_weekly_report))
        .route("/weekly/narrative", get(handlers::stream_weekly_report))
        .route("/weekly/usage", get(handlers::get_weekly_usage))
}
