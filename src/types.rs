// Type definitions and enums

use axum::response::{IntoResponse, Response};
use std::str::FromStr;

use crate::models::ProbeResponse;

/// Which backend(s) a request asks to probe, from the `dbType` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    None,
    Postgres,
    PostgresProxy,
    DocumentDb,
    All,
}

impl DbType {
    /// Resolve the optional raw parameter. Absence means `All`.
    pub fn resolve(raw: Option<&str>) -> AppResult<Self> {
        match raw {
            Some(value) => value.parse(),
            None => Ok(DbType::All),
        }
    }

    pub fn includes_postgres(self) -> bool {
        matches!(self, DbType::Postgres | DbType::All)
    }

    pub fn includes_postgres_proxy(self) -> bool {
        matches!(self, DbType::PostgresProxy | DbType::All)
    }

    pub fn includes_documentdb(self) -> bool {
        matches!(self, DbType::DocumentDb | DbType::All)
    }
}

impl FromStr for DbType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const NAMES: [(&str, DbType); 5] = [
            ("none", DbType::None),
            ("postgres", DbType::Postgres),
            ("postgres-proxy", DbType::PostgresProxy),
            ("documentdb", DbType::DocumentDb),
            ("all", DbType::All),
        ];

        NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, db_type)| *db_type)
            .ok_or_else(|| AppError::UnsupportedDbType(s.to_string()))
    }
}

impl std::fmt::Display for DbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbType::None => write!(f, "none"),
            DbType::Postgres => write!(f, "postgres"),
            DbType::PostgresProxy => write!(f, "postgres-proxy"),
            DbType::DocumentDb => write!(f, "documentdb"),
            DbType::All => write!(f, "all"),
        }
    }
}

/// A single probed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    PostgresProxy,
    DocumentDb,
}

impl Backend {
    /// Label used for this backend in the response body.
    pub fn label(self) -> &'static str {
        match self {
            Backend::Postgres => "PostgreSQL",
            Backend::PostgresProxy => "PostgreSQL-proxy",
            Backend::DocumentDb => "DocumentDB",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unsupported dbType: {0:?}")]
    UnsupportedDbType(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// Fixed body returned for an unrecognised selector
pub const UNSUPPORTED_BODY: &str = "dbType not supported.";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::UnsupportedDbType(value) => {
                tracing::warn!(db_type = %value, "Rejected unsupported dbType")
            }
        }
        ProbeResponse::from(self).into_response()
    }
}
