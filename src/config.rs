use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Default log filter when neither `--log-level` nor RUST_LOG is set
pub const DEFAULT_LOG_FILTER: &str = "dbprobe=debug,tower_http=debug";

/// Value sent in both fixed response headers. The body is plain text.
pub const PROBE_CONTENT_TYPE: &str = "application/json";
pub const CUSTOM_HEADER_NAME: &str = "x-custom-header";

/// Liveness route, reserved next to the probe path
pub const HEALTH_PATH: &str = "/api/health";

/// Set by the Lambda runtime in every function sandbox
pub const LAMBDA_RUNTIME_ENV: &str = "AWS_LAMBDA_RUNTIME_API";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub documentdb: DocumentDbConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub probe_path: String,
}

#[derive(Clone, Deserialize)]
pub struct PostgresConfig {
    pub host: Option<String>,
    pub proxy_host: Option<String>,
    pub port: u16,
    pub dbname: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub connect_timeout: Option<Duration>,
}

#[derive(Clone, Deserialize)]
pub struct DocumentDbConfig {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: String,
    pub replica_set: String,
    pub tls_ca_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// "text" or "json"
    pub format: String,
}

// Credentials stay out of Debug output so configs can be logged freely.
impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("proxy_host", &self.proxy_host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl std::fmt::Debug for DocumentDbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentDbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("dbname", &self.dbname)
            .field("replica_set", &self.replica_set)
            .field("tls_ca_file", &self.tls_ca_file)
            .finish()
    }
}

impl Config {
    /// Load `.env` (if any) and read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset. Only malformed numbers and an
    /// unroutable PROBE_PATH are errors; a missing host or credential surfaces
    /// later as a failed probe.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let running_on_lambda = get(LAMBDA_RUNTIME_ENV).is_some();

        Ok(Self {
            server: ServerConfig {
                port: parse_or(get("PORT"), "PORT", 3000)?,
                host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                probe_path: probe_path(get("PROBE_PATH"))?,
            },
            postgres: PostgresConfig {
                host: get("PG_HOST"),
                proxy_host: get("PG_PROXY_ENDPOINT"),
                port: parse_or(get("PG_PORT"), "PG_PORT", 5432)?,
                dbname: get("PG_DBNAME").unwrap_or_else(|| "postgres".to_string()),
                user: get("PG_USER"),
                password: get("PG_PASSWORD"),
                connect_timeout: get("PG_CONNECT_TIMEOUT_SECS")
                    .map(|v| {
                        v.trim()
                            .parse::<u64>()
                            .map(Duration::from_secs)
                            .with_context(|| format!("PG_CONNECT_TIMEOUT_SECS is not a number: {v}"))
                    })
                    .transpose()?,
            },
            documentdb: DocumentDbConfig {
                host: get("DOCDB_HOST"),
                port: parse_or(get("DOCDB_PORT"), "DOCDB_PORT", 27017)?,
                user: get("DOCDB_USER"),
                password: get("DOCDB_PASSWORD"),
                dbname: get("DOCDB_DBNAME").unwrap_or_else(|| "admin".to_string()),
                replica_set: get("DOCDB_REPLICA_SET").unwrap_or_else(|| "rs0".to_string()),
                tls_ca_file: get("DOCDB_TLS_CA_FILE"),
            },
            logging: LoggingConfig {
                format: get("LOG_FORMAT").unwrap_or_else(|| {
                    let format = if running_on_lambda { "json" } else { "text" };
                    format.to_string()
                }),
            },
        })
    }
}

/// Normalise PROBE_PATH to a leading `/` and reject values the router cannot
/// register as a plain static route.
fn probe_path(value: Option<String>) -> Result<String> {
    let path = match value {
        Some(p) => format!("/{}", p.trim().trim_start_matches('/')),
        None => return Ok("/hello".to_string()),
    };

    if path == HEALTH_PATH {
        bail!("PROBE_PATH {path} collides with the health route");
    }
    if path.contains(['{', '}']) {
        bail!("PROBE_PATH must be a static path without route parameters: {path}");
    }
    Ok(path)
}

fn parse_or(value: Option<String>, key: &str, default: u16) -> Result<u16> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{key} is not a valid port: {v}")),
        None => Ok(default),
    }
}
