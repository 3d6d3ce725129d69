use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::config::Config;
use crate::probes::Connectors;
use crate::types::{AppError, UNSUPPORTED_BODY};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub connectors: Connectors,
}

impl AppState {
    pub fn new(config: Config, connectors: Connectors) -> Self {
        Self {
            config: Arc::new(config),
            connectors,
        }
    }
}

/// Query string of a probe request. A repeated `dbType` keeps its last value,
/// the same collapse API Gateway applies to single-value parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeQuery {
    pub db_type: Option<String>,
}

impl From<Vec<(String, String)>> for ProbeQuery {
    fn from(pairs: Vec<(String, String)>) -> Self {
        let db_type = pairs
            .into_iter()
            .filter(|(key, _)| key == "dbType")
            .map(|(_, value)| value)
            .last();
        Self { db_type }
    }
}

/// Status and plain-text body of a probe request. The fixed headers are added
/// by the router so that every outcome carries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ProbeResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }
}

impl From<AppError> for ProbeResponse {
    fn from(err: AppError) -> Self {
        match err {
            AppError::UnsupportedDbType(_) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: UNSUPPORTED_BODY.to_string(),
            },
        }
    }
}

impl IntoResponse for ProbeResponse {
    fn into_response(self) -> Response {
        (self.status, self.body).into_response()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}
