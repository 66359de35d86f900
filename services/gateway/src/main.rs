//! Gateway server entry point

use anyhow::{Context, Result};
use clap::Parser;
use poke_gateway::{GatewayConfig, GatewayServer};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "poke-gateway")]
#[command(about = "Publish single messages to a broker over HTTP")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML, or JSON by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    bind_address: Option<String>,

    /// Port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Origin allowed by CORS in production
    #[arg(long, env = "CLIENT_ORIGIN")]
    client_origin: Option<String>,

    /// Deployment environment
    #[arg(long, env = "POKE_ENV")]
    environment: Option<String>,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn apply(&self, config: &mut GatewayConfig) {
        if let Some(bind_address) = &self.bind_address {
            config.server.bind_address = bind_address.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(origin) = &self.client_origin {
            config.server.client_origin = origin.clone();
        }
        if let Some(environment) = &self.environment {
            config.server.environment = environment.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    info!("Starting poke gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => GatewayConfig::load(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        "Environment: {}, port: {}",
        config.server.environment, config.server.port
    );

    let server = GatewayServer::new(config);
    if let Err(e) = server.run(shutdown_signal()).await {
        error!("Gateway server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(args.log_level.to_lowercase()))
        .context("Invalid log level")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(args.json_logs.then(|| fmt::layer().json()))
        .with((!args.json_logs).then(|| fmt::layer()))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
