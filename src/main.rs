use clap::Parser;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

use dbprobe::{
    config::{Config, DEFAULT_LOG_FILTER, LAMBDA_RUNTIME_ENV},
    models::{AppState, ProbeResponse},
    probes::Connectors,
    routes::{create_router, probe::handle_probe},
    utils::init_logger,
};

/// dbprobe: check connectivity to PostgreSQL, a PostgreSQL proxy and DocumentDB
#[derive(Parser, Debug)]
#[command(name = "dbprobe", version, about)]
struct Args {
    /// Log level filter (e.g., "dbprobe=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,

    /// Run the probes once for this dbType, print the result and exit
    #[arg(long, value_name = "DB_TYPE")]
    once: Option<String>,

    /// Serve HTTP on HOST:PORT even inside a Lambda sandbox
    #[arg(long)]
    local: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    init_logger(&log_filter, &config.logging.format);

    info!("Configuration loaded: {:?}", config.server);

    let state = AppState::new(config.clone(), Connectors::live());

    if let Some(db_type) = args.once {
        let response = handle_probe(&state, Some(db_type.as_str()))
            .await
            .unwrap_or_else(ProbeResponse::from);
        println!("{} {}", response.status.as_u16(), response.body);
        if !response.status.is_success() {
            std::process::exit(2);
        }
        return Ok(());
    }

    let app = create_router(state);

    if std::env::var(LAMBDA_RUNTIME_ENV).is_ok() {
        if args.local {
            warn!("Lambda runtime detected but --local given, serving HTTP");
        } else {
            info!("Starting Lambda runtime");
            return lambda_http::run(app)
                .await
                .map_err(|e| anyhow::anyhow!("Lambda runtime error: {}", e));
        }
    }

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
