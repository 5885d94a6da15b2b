//! tenx-api - 10xDev backend service
//!
//! REST API for card features, videos, projects and templates, plus the
//! GitHub import pipeline with SSE progress streaming.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tenx_common::config::{load_dotenv, TomlConfig};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tenx_api::middleware::rate_limit;
use tenx_api::AppState;

/// Command-line arguments for tenx-api
#[derive(Parser, Debug)]
#[command(name = "tenx-api")]
#[command(about = "10xDev backend API")]
#[command(version)]
struct Args {
    /// Config file (overrides TENX_CONFIG and the user config file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenx_api=info,tenx_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // After tracing so its outcome is logged; RUST_LOG in .env is not honoured
    load_dotenv();

    let args = Args::parse();

    info!(
        "Starting tenx-api v{} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Config file, then environment, then command line
    let mut config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(path) = args.database {
        config.database.path = Some(path);
    }
    let jwt_secret = config.auth.resolve_secret()?;

    let db_path = config.database.resolved_path();
    info!("Database: {}", db_path.display());
    let db_pool = tenx_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    // Jobs cannot survive a restart: their tasks died with the old process
    let interrupted = tenx_api::db::import_jobs::mark_interrupted(&db_pool).await?;
    if interrupted > 0 {
        warn!("Marked {} unfinished import job(s) as interrupted", interrupted);
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    let state = AppState::new(db_pool, config, jwt_secret)?;
    if let Some(limiters) = &state.rate_limiters {
        rate_limit::spawn_pruner(limiters.clone(), rate_limit::PRUNE_INTERVAL);
    }
    let app = tenx_api::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
