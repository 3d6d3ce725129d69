//! HTTP routes
//!
//! - `/` and the configured probe path - database connectivity probe
//! - `/api/health` - liveness check, touches no database

pub mod health;
pub mod probe;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::models::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    info!(probe_path = %state.config.server.probe_path, "Creating application router");

    Router::new()
        .merge(probe::router(state))
        .merge(health::router())
        .layer(TraceLayer::new_for_http())
}
