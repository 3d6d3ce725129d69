//! Backend connectivity probes
//!
//! Each probe opens one session against a backend, exercises it with a
//! trivial read-only operation and closes it again. Probes are total: every
//! failure is captured in the returned [`ProbeReport`] instead of being
//! propagated to the caller.
//!
//! Drivers sit behind the [`SqlConnector`] and [`DocumentConnector`] traits so
//! the request handler can be exercised without live databases.

pub mod documentdb;
pub mod postgres;

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::warn;

use crate::types::Backend;

pub use documentdb::{probe_documentdb, DocumentUri, MongoConnector};
pub use postgres::{probe_postgres, PgConnector, PgEndpoint};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// No session could be established with the backend
    #[error("{0}")]
    Connection(String),

    /// A session was open but the query or command failed
    #[error("{0}")]
    Query(String),
}

impl ProbeError {
    pub fn connection(err: impl std::fmt::Display) -> Self {
        ProbeError::Connection(err.to_string())
    }

    pub fn query(err: impl std::fmt::Display) -> Self {
        ProbeError::Query(err.to_string())
    }

    pub(crate) fn missing(key: &str) -> Self {
        ProbeError::Connection(format!("{key} is not set"))
    }
}

/// Outcome of one probe, rendered to text only when the response is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub backend: Backend,
    pub outcome: Result<String, ProbeError>,
}

impl ProbeReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl std::fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.outcome, self.backend) {
            (Ok(text), _) => write!(f, "{text}"),
            (Err(e), Backend::Postgres | Backend::PostgresProxy) => {
                write!(f, "Error al conectar: {e}")
            }
            (Err(e), Backend::DocumentDb) => write!(f, "Error conectando a DocumentDB: {e}"),
        }
    }
}

/// A backend session that must be released once the probe is done with it.
#[async_trait]
pub trait Session: Send {
    async fn close(self: Box<Self>) -> Result<(), ProbeError>;
}

/// Open SQL session able to report the server version.
#[async_trait]
pub trait SqlSession: Session {
    /// First column of the first row of `SELECT version();`, if any row came back.
    async fn server_version(&mut self) -> Result<Option<String>, ProbeError>;
}

/// Connection parameters for one relational endpoint.
#[derive(Clone)]
#[cfg_attr(test, derive(Debug))]
pub struct SqlTarget {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub connect_timeout: Option<std::time::Duration>,
}

impl SqlTarget {
    /// Connection string with credentials left out, for logs.
    pub fn display_url(&self) -> String {
        format!("postgres://{}:{}/{}", self.host, self.port, self.dbname)
    }
}

#[async_trait]
pub trait SqlConnector: Send + Sync {
    async fn connect(&self, target: &SqlTarget) -> Result<Box<dyn SqlSession>, ProbeError>;
}

/// Open document-store client able to run admin commands.
#[async_trait]
pub trait DocumentSession: Session {
    /// `{ping: 1}`, returning the reply as JSON text
    async fn ping(&mut self) -> Result<String, ProbeError>;

    /// `{buildInfo: 1}`, returning the reply as JSON text
    async fn build_info(&mut self) -> Result<String, ProbeError>;
}

#[async_trait]
pub trait DocumentConnector: Send + Sync {
    async fn connect(&self, uri: &DocumentUri) -> Result<Box<dyn DocumentSession>, ProbeError>;
}

/// Run `work` against an open session, then close it whatever the outcome.
///
/// Close failures are logged and dropped so they never mask the work result.
pub async fn with_session<S, T, F>(mut session: Box<S>, work: F) -> Result<T, ProbeError>
where
    S: Session + ?Sized,
    F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, Result<T, ProbeError>>,
{
    let result = work(&mut *session).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close probe session");
    }

    result
}

/// Driver handles shared by every request.
#[derive(Clone)]
pub struct Connectors {
    pub sql: Arc<dyn SqlConnector>,
    pub document: Arc<dyn DocumentConnector>,
}

impl Connectors {
    /// The real PostgreSQL and MongoDB drivers.
    pub fn live() -> Self {
        Self {
            sql: Arc::new(PgConnector),
            document: Arc::new(MongoConnector),
        }
    }
}
