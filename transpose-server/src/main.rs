//! transpose-server - cross-provider music link transposition service
//!
//! Accepts a share link's parsed (provider, type, id) triple, finds the
//! equivalent element on every other configured provider, and mints a
//! durable short link that re-serves the assembled result.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use transpose_common::config::{self, Config};
use transpose_server::providers::ProviderRegistry;
use transpose_server::AppState;

#[derive(Parser)]
#[command(
    name = "transpose-server",
    version,
    about = "Cross-provider music link transposition service"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting transpose-server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config_path = config::resolve_config_path(args.config.as_deref());
    info!("Config: {}", config_path.display());
    let config = Config::load(&config_path)?;

    let db_pool = transpose_server::db::init_database_pool(&config.database_path).await?;
    info!("Database: {}", config.database_path.display());

    let registry = Arc::new(
        ProviderRegistry::from_config(&config)
            .map_err(|e| anyhow::anyhow!("Failed to construct provider adapters: {}", e))?,
    );

    let state = AppState::new(db_pool, registry, &config);
    let app = transpose_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
