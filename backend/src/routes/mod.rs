//! Route definitions for the Resto Back Office inventory engine

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - stock reconciliation report
        .nest("/reconciliation", reconciliation_routes())
        // Protected routes - warehouse ledger and receiving
        .nest("/warehouse", warehouse_routes())
}

/// Stock reconciliation routes (protected)
fn reconciliation_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_reconciliation))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Warehouse ledger and receiving routes (protected)
fn warehouse_routes() -> Router<AppState> {
    Router::new()
        // Ledger
        .route("/entries", get(handlers::list_entries))
        .route("/balance", get(handlers::get_balance))
        // Receiving worklist and posting
        .route("/receipts", get(handlers::list_receiving))
        .route("/receipts/:line_id/post", post(handlers::post_receipt))
        .route_layer(middleware::from_fn(auth_middleware))
}
