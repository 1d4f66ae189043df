use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vandar_core::adapters::MemoryTransactionRepository;
use vandar_core::cli::{handle_config_validate, Cli, Commands};
use vandar_core::config::{Config, LogFormat};
use vandar_core::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command {
        Some(Commands::Config) => handle_config_validate(&config).await,
        Some(Commands::Serve) | None => serve(config).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!(
        base_url = %config.gateway.base_url,
        sandbox = config.gateway.sandbox_mode,
        "payment gateway client configured"
    );

    let repository = Arc::new(MemoryTransactionRepository::new());
    let state = AppState::new(config, repository)?;
    let app = create_app(state);

    tracing::info!("listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
