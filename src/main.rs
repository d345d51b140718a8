use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use benefit_gate::adapters::{CondoDirectoryClient, PartnerClient, RetryPolicy};
use benefit_gate::app::{build_app, AppState};
use benefit_gate::config::AppConfig;
use benefit_gate::database;
use benefit_gate::services::ValidationService;

#[derive(Parser)]
#[command(name = "benefit-gate")]
#[command(about = "CPF validation backend for the condominium benefits club")]
#[command(version)]
struct Args {
    #[arg(long, help = "YAML file overlaid on the environment preset")]
    config: Option<PathBuf>,

    #[arg(long, help = "Port to listen on (overrides PORT and the config file)")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up credentials and DATABASE_URL
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("benefit_gate=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    let config = Arc::new(config);
    tracing::info!(
        "Starting benefit-gate in {:?} mode (activation: {:?})",
        config.environment,
        config.activation.mode
    );

    let membership = CondoDirectoryClient::new(&config.membership)
        .context("failed to build membership directory client")?;
    let partner = PartnerClient::new(&config.partner, RetryPolicy::from_config(&config.retry))
        .context("failed to build partner client")?;
    let repository = database::lead_repository(&config.database)
        .await
        .context("failed to initialize lead persistence")?;

    let service = ValidationService::new(config.clone(), Arc::new(membership), Arc::new(partner), repository);
    let app = build_app(AppState::new(config.clone(), service));

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
