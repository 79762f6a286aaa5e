//! reef trader entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Order reconciliation market maker
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via REEF_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    reef_telemetry::init_logging()?;

    info!("Starting reef v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > REEF_CONFIG > default
    let config_path = args
        .config
        .or_else(|| std::env::var("REEF_CONFIG").ok())
        .unwrap_or_else(|| "config/paper.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = reef_bot::AppConfig::from_file(&config_path)?;

    let app = reef_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
