//! Edge Gateway
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ routing (first match, rewrite)
//!                                         │
//!                                         ▼
//!                                  retry executor ◀──▶ circuit breaker (per name)
//!                                         │
//!                                         ▼
//!                                  proxy forwarder ──▶ service registry ──▶ Backend
//!                                         │
//!     Client Response                     ▼
//!     ◀────────────── backend response, or fallback 503 when degraded
//! ```

use clap::Parser;
use std::path::PathBuf;

use edge_gateway::config::{load_config, GatewayConfig};
use edge_gateway::lifecycle;
use edge_gateway::observability::init_logging;

#[derive(Debug, Parser)]
#[command(name = "edge-gateway", version, about = "Routing and resilience gateway for HTTP services")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
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

    init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        backends = config.backends.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    lifecycle::run(config).await?;
    Ok(())
}
