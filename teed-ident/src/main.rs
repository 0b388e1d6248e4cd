//! teed-ident - Product identification service
//!
//! Turns a text description, product URL or photo into ranked product
//! candidates: corrections, then the product library, then a hosted model,
//! then web search.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use teed_common::config::{
    default_config_path, load_toml_config, RootFolderInitializer, RootFolderResolver,
};
use teed_ident::AppState;

const MODULE_NAME: &str = "teed-ident";
const DEFAULT_PORT: u16 = 5780;

/// Command-line arguments for teed-ident
#[derive(Parser, Debug)]
#[command(name = "teed-ident")]
#[command(about = "Product identification service")]
#[command(version)]
struct Args {
    /// Port to listen on (default 5780)
    #[arg(short, long, env = "TEED_PORT")]
    port: Option<u16>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "TEED_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_path = args.config.clone().unwrap_or_else(|| default_config_path(MODULE_NAME));
    // Read before logging starts so the configured level applies
    let config_result = load_toml_config(&toml_path);
    let level = config_result
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("teed_ident={},teed_common={},tower_http=info", level, level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config_result.context("Failed to load configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("TEED_GIT_HASH"),
        built = env!("TEED_BUILT_AT"),
        profile = env!("TEED_BUILD_PROFILE"),
        "Starting teed-ident"
    );

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder.clone())
        .with_toml(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = teed_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let state = AppState::initialize(db, &config, toml_path)
        .await
        .context("Failed to initialize services")?;
    let app = teed_ident::build_router(state);

    let port = args.port.or(config.port).unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

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
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
