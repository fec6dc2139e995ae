//! Charter Daemon - governance service for the agent charter
//!
//! The charter daemon provides:
//! - REST API for proposals, votes and charter versions
//! - Hourly expiration sweep of stale proposals
//! - Event streaming for observers

use anyhow::Context;
use charter_daemon::{DaemonConfig, Server};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Charter Daemon CLI
#[derive(Parser)]
#[command(name = "charterd")]
#[command(about = "Charter Daemon - proposals, votes and the versioned charter", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CHARTER_CONFIG")]
    config: Option<String>,

    /// Listen address (overrides the configuration file)
    #[arg(short, long, env = "CHARTER_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level (overrides the configuration file)
    #[arg(long, env = "CHARTER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "CHARTER_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        DaemonConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .with_context(|| format!("invalid listen address: {listen}"))?;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        sweep_interval_secs = config.sweeper.interval_secs,
        "Starting charter daemon"
    );

    let server = Server::new(config).await?;
    server.run().await?;
    Ok(())
}
