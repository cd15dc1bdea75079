//! Integration gateway server.
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!     Client request      │  request id → trace → panic guard → limits   │
//!     ────────────────────┼─▶ rate limit → dispatcher (RouteTable)        │
//!                         │        │                                     │
//!                         │        ├─ health / probes ──┐                │
//!                         │        ├─ crm ──────────────┼─▶ Upstreams ───┼──▶ CRM, OpenAI,
//!                         │        ├─ inventory         │   breaker      │    Anthropic,
//!                         │        ├─ webhooks (HMAC)   │   retry        │    Pinecone,
//!                         │        └─ metrics (API key) │   timeout      │    Shopify
//!                         │                             └─▶ MongoDB ping │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use integration_gateway::config::load_config;
use integration_gateway::lifecycle::{signals, startup, Shutdown};
use integration_gateway::net::load_tls_config;
use integration_gateway::observability::{logging, metrics};
use integration_gateway::{AppState, GatewayServer};

#[derive(Parser)]
#[command(name = "integration-gateway", version, about = "Outbound integration gateway")]
struct Args {
    /// TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Validate configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    if args.check {
        println!("configuration OK");
        return Ok(());
    }

    let _log_guard = logging::init_logging(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "integration-gateway starting"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics();
    }
    startup::log_security_warnings(&config);

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let state = AppState::from_config(config.clone(), shutdown.clone())?;
    let server = GatewayServer::new(state.clone());

    match &config.listener.tls {
        Some(tls) => {
            let addr: SocketAddr = config.listener.bind_address.parse()?;
            let tls = load_tls_config(tls).await?;
            server.run_tls(addr, tls).await?;
        }
        None => {
            let listener = startup::bind_listener(&config.listener.bind_address).await?;
            server.run(listener).await?;
        }
    }

    state.probes.close().await;

    if shutdown.is_fatal() {
        tracing::error!("Shutdown complete after fatal error");
        return Err("gateway terminated after a fatal error".into());
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
