//! NotWP server binary

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notwp::{config::Config, server};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notwp=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting NotWP {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::var("NOTWP_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yml"));

    let mut config = Config::load_with_env(&config_path)?;
    if !config.installed {
        server::run_install(config, &config_path).await?;
        config = Config::load_with_env(&config_path)?;
    }
    tracing::info!("Configuration loaded from {}", config_path.display());

    let state = server::prepare(config).await?;
    server::serve(state).await
}
