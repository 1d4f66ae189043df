use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::startup::validate_environment;

#[derive(Parser)]
#[command(name = "vandar-core")]
#[command(about = "Vandar Core - Payment Gateway Service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Validate configuration and probe the payment gateway
    Config,
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    let report = validate_environment(config).await;
    report.print(config);

    if !report.is_valid() {
        anyhow::bail!("configuration validation failed");
    }

    tracing::info!("Configuration is valid");
    Ok(())
}
