//! Bingo engine server binary

use anyhow::Context;
use bingo_core::{BingoEngine, Config};
use prometheus::{Encoder, TextEncoder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    if std::env::var_os("BINGO_LOG_JSON").is_some() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("Starting bingo server");

    // Load configuration: file given as first argument, else environment
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => Config::from_env().context("failed to load config from environment")?,
    };
    tracing::debug!(config = %serde_json::to_string(&config)?, "Configuration loaded");

    let engine = BingoEngine::open(config).context("failed to open engine")?;
    tracing::info!(
        data_dir = %engine.config().data_dir.display(),
        "Engine opened successfully"
    );

    tokio::signal::ctrl_c().await?;

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&engine.metrics().registry().gather(), &mut buffer)?;
    tracing::info!(metrics = %String::from_utf8_lossy(&buffer), "Final metrics");

    tracing::info!("Shutting down bingo server");
    engine.shutdown().context("failed to close store")?;
    Ok(())
}
