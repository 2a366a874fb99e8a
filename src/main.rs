use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use fragment_gateway::config::{load_config, GatewayConfig};
use fragment_gateway::lifecycle::{wait_for_signal, Shutdown};
use fragment_gateway::observability::{logging, metrics};
use fragment_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "fragment-gateway")]
#[command(about = "Resolves and caches HTML fragments for page composition", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability.log_level)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fragment-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        cache_enabled = config.cache.enabled,
        breaker_enabled = config.circuit_breaker.enabled,
        failure_threshold = config.circuit_breaker.failure_threshold,
        cookie_whitelist = config.cookies.whitelist.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config);
    let serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal(&shutdown).await;
    serving.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
