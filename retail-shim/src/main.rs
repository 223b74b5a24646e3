use std::sync::Arc;

use clap::Parser;
use retail_core::RetailConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use retail_shim::http::{self, ShimState};

#[derive(Parser, Debug)]
#[command(author, version, about = "Demo backend for the retail storefront client", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "retail.toml")]
    config: String,

    /// Override the listen port from config
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = match RetailConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    if let Some(port) = args.port {
        config.shim.port = port;
    }

    let (tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = tx.send(());
    });

    let environment = std::env::var("RETAIL_ENV").unwrap_or_else(|_| "development".to_string());
    let state = Arc::new(ShimState::new(environment));

    http::start_http_server(&config.shim, state, shutdown_rx).await?;

    tracing::info!("Retail demo backend stopped");
    Ok(())
}
