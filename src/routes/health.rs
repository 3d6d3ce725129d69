use axum::{Router, routing::get, Json, response::Json as ResponseJson};
use crate::config::HEALTH_PATH;
use crate::models::HealthResponse;

pub fn router() -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health_check))
}

/// Liveness only: answers without opening any database connection.
async fn health_check() -> ResponseJson<HealthResponse> {
    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    Json(response)
}
