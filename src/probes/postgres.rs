//! PostgreSQL probe, used for both the direct endpoint and the proxy endpoint.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::{error, info};

use super::{with_session, ProbeError, ProbeReport, Session, SqlConnector, SqlSession, SqlTarget};
use crate::config::PostgresConfig;
use crate::types::Backend;

const VERSION_QUERY: &str = "SELECT version();";

/// Which PostgreSQL endpoint a probe targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgEndpoint {
    Direct,
    Proxy,
}

impl PgEndpoint {
    pub fn backend(self) -> Backend {
        match self {
            PgEndpoint::Direct => Backend::Postgres,
            PgEndpoint::Proxy => Backend::PostgresProxy,
        }
    }
}

/// Opens one unpooled `PgConnection` per probe.
pub struct PgConnector;

pub struct PgSession {
    conn: PgConnection,
}

#[async_trait]
impl SqlConnector for PgConnector {
    async fn connect(&self, target: &SqlTarget) -> Result<Box<dyn SqlSession>, ProbeError> {
        let options = PgConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .database(&target.dbname)
            .username(&target.user)
            .password(&target.password);

        let connect = PgConnection::connect_with(&options);
        let conn = match target.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| ProbeError::Connection(format!("connection timed out after {limit:?}")))?,
            None => connect.await,
        }
        .map_err(ProbeError::connection)?;

        Ok(Box::new(PgSession { conn }))
    }
}

#[async_trait]
impl Session for PgSession {
    async fn close(self: Box<Self>) -> Result<(), ProbeError> {
        self.conn.close().await.map_err(ProbeError::connection)
    }
}

#[async_trait]
impl SqlSession for PgSession {
    async fn server_version(&mut self) -> Result<Option<String>, ProbeError> {
        sqlx::query_scalar::<_, String>(VERSION_QUERY)
            .fetch_optional(&mut self.conn)
            .await
            .map_err(ProbeError::query)
    }
}

impl PostgresConfig {
    /// Connection target for the direct endpoint or the proxy endpoint.
    pub fn target(&self, endpoint: PgEndpoint) -> Result<SqlTarget, ProbeError> {
        let host = match endpoint {
            PgEndpoint::Direct => self.host.clone().ok_or_else(|| ProbeError::missing("PG_HOST"))?,
            PgEndpoint::Proxy => self
                .proxy_host
                .clone()
                .ok_or_else(|| ProbeError::missing("PG_PROXY_ENDPOINT"))?,
        };

        Ok(SqlTarget {
            host,
            port: self.port,
            dbname: self.dbname.clone(),
            user: self.user.clone().ok_or_else(|| ProbeError::missing("PG_USER"))?,
            password: self.password.clone().unwrap_or_default(),
            connect_timeout: self.connect_timeout,
        })
    }
}

/// Connect, read `version()` and disconnect. Never fails; errors end up in the report.
pub async fn probe_postgres(
    connector: &dyn SqlConnector,
    config: &PostgresConfig,
    endpoint: PgEndpoint,
) -> ProbeReport {
    let backend = endpoint.backend();
    let outcome = run(connector, config, endpoint).await;

    match &outcome {
        Ok(text) => info!(backend = backend.label(), "Query result: {}", text),
        Err(e) => error!(backend = backend.label(), error = %e, "PostgreSQL probe failed"),
    }

    ProbeReport { backend, outcome }
}

async fn run(
    connector: &dyn SqlConnector,
    config: &PostgresConfig,
    endpoint: PgEndpoint,
) -> Result<String, ProbeError> {
    let backend = endpoint.backend();
    let target = config.target(endpoint)?;
    info!(backend = backend.label(), "Connecting to PostgreSQL: {}", target.display_url());

    let session = connector.connect(&target).await?;
    info!(backend = backend.label(), "PostgreSQL connection established");

    let version = with_session(session, |s| s.server_version()).await?;

    Ok(match version {
        Some(version) => format!("Versión de PostgreSQL: {version}"),
        None => "No se pudo obtener la versión de PostgreSQL.".to_string(),
    })
}
