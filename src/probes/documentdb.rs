//! DocumentDB (MongoDB wire protocol) probe.

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::Client;
use tracing::{error, info};

use super::{with_session, DocumentConnector, DocumentSession, ProbeError, ProbeReport, Session};
use crate::config::DocumentDbConfig;
use crate::types::Backend;

const APP_NAME: &str = "dbprobe";

/// Connection URI with TLS required, a fixed replica set and retryable writes off.
#[derive(Clone)]
pub struct DocumentUri {
    uri: String,
    redacted: String,
    database: String,
}

impl DocumentUri {
    pub fn from_config(config: &DocumentDbConfig) -> Result<Self, ProbeError> {
        let host = config.host.as_deref().ok_or_else(|| ProbeError::missing("DOCDB_HOST"))?;
        let user = config.user.as_deref().ok_or_else(|| ProbeError::missing("DOCDB_USER"))?;
        let password = config
            .password
            .as_deref()
            .ok_or_else(|| ProbeError::missing("DOCDB_PASSWORD"))?;

        let mut query = format!(
            "tls=true&replicaSet={}&retryWrites=false",
            urlencoding::encode(&config.replica_set)
        );
        if let Some(ca_file) = &config.tls_ca_file {
            query.push_str(&format!("&tlsCAFile={}", urlencoding::encode(ca_file)));
        }

        let user = urlencoding::encode(user);
        let location = format!("{}:{}/{}?{}", host, config.port, config.dbname, query);

        Ok(Self {
            uri: format!("mongodb://{}:{}@{}", user, urlencoding::encode(password), location),
            redacted: format!("mongodb://{}:***@{}", user, location),
            database: config.dbname.clone(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// The URI with the password masked, for logs.
    pub fn redacted(&self) -> &str {
        &self.redacted
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

/// Builds a fresh `mongodb::Client` per probe.
pub struct MongoConnector;

pub struct MongoSession {
    client: Client,
    database: String,
}

#[async_trait]
impl DocumentConnector for MongoConnector {
    async fn connect(&self, uri: &DocumentUri) -> Result<Box<dyn DocumentSession>, ProbeError> {
        let mut options = ClientOptions::parse(uri.as_str())
            .await
            .map_err(ProbeError::connection)?;
        options.app_name = Some(APP_NAME.to_string());

        let client = Client::with_options(options).map_err(ProbeError::connection)?;

        Ok(Box::new(MongoSession {
            client,
            database: uri.database().to_string(),
        }))
    }
}

impl MongoSession {
    async fn run_command(&self, command: Document) -> Result<String, ProbeError> {
        let reply = self
            .client
            .database(&self.database)
            .run_command(command)
            .await
            .map_err(classify)?;

        Ok(Bson::Document(reply).into_relaxed_extjson().to_string())
    }
}

/// The client connects lazily, so an unreachable server first shows up as a
/// server selection failure on the first command.
fn classify(err: mongodb::error::Error) -> ProbeError {
    if matches!(*err.kind, ErrorKind::ServerSelection { .. }) {
        ProbeError::connection(err)
    } else {
        ProbeError::query(err)
    }
}

#[async_trait]
impl Session for MongoSession {
    async fn close(self: Box<Self>) -> Result<(), ProbeError> {
        self.client.shutdown().await;
        Ok(())
    }
}

#[async_trait]
impl DocumentSession for MongoSession {
    async fn ping(&mut self) -> Result<String, ProbeError> {
        self.run_command(doc! { "ping": 1 }).await
    }

    async fn build_info(&mut self) -> Result<String, ProbeError> {
        self.run_command(doc! { "buildInfo": 1 }).await
    }
}

/// Ping the server, then fetch `buildInfo`. Never fails; errors end up in the report.
pub async fn probe_documentdb(
    connector: &dyn DocumentConnector,
    config: &DocumentDbConfig,
) -> ProbeReport {
    let outcome = run(connector, config).await;

    if let Err(e) = &outcome {
        error!(error = %e, "DocumentDB probe failed");
    }

    ProbeReport {
        backend: Backend::DocumentDb,
        outcome,
    }
}

async fn run(connector: &dyn DocumentConnector, config: &DocumentDbConfig) -> Result<String, ProbeError> {
    let uri = DocumentUri::from_config(config)?;
    info!("Connecting to DocumentDB with URI: {}", uri.redacted());

    let session = connector.connect(&uri).await?;

    let build_info = with_session(session, |s| {
        Box::pin(async move {
            let ping = s.ping().await?;
            info!("Ping to DocumentDB -> {}", ping);
            s.build_info().await
        })
    })
    .await?;

    Ok(format!("DocumentDB buildInfo: {build_info}"))
}
