// dbprobe - connectivity probe for PostgreSQL, PostgreSQL proxies and DocumentDB

pub mod config;
pub mod models;
pub mod probes;
pub mod routes;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
