//! offline-gateway entry point.
//!
//! Loads configuration, installs and activates the gateway, then serves it as
//! a local caching proxy until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use offline_gateway::cache::MemoryStorage;
use offline_gateway::config::GatewayConfig;
use offline_gateway::events::{Dispatcher, Event, EventOutcome, LoggingClients};
use offline_gateway::gateway::{Gateway, LifecycleState};
use offline_gateway::network::{Fetch, HttpFetcher};
use offline_gateway::server::{ProxyService, Server};

#[derive(Parser, Debug)]
#[command(name = "offline-gateway")]
#[command(about = "Offline-first caching proxy in front of a site origin")]
#[command(version)]
struct Args {
    /// Path to a TOML config file (also read from OFFLINE_GATEWAY_CONFIG_FILE)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = GatewayConfig::load(args.config.as_deref()).context("loading configuration")?;
    let listen = args.listen.unwrap_or_else(|| config.listen.clone());

    let network: Arc<dyn Fetch> =
        Arc::new(HttpFetcher::new(&config).context("building HTTP client")?);
    let gateway = Arc::new(Gateway::new(
        config,
        Arc::new(MemoryStorage::new()),
        Arc::clone(&network),
        Arc::new(LoggingClients),
    ));
    let dispatcher = Dispatcher::new(Arc::clone(&gateway));

    if let EventOutcome::Installed(report) = dispatcher.dispatch(Event::Install).await? {
        tracing::info!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            "precache finished"
        );
    }
    if gateway.state() == LifecycleState::Installed {
        tracing::info!("waiting for a skipWaiting message before activating");
    }

    let service = ProxyService::new(dispatcher, network);
    let server = Server::bind(&listen).await?;
    tracing::info!(address = %server.local_addr(), origin = %gateway.config().origin, "serving");

    server
        .run_until(
            move |req| {
                let service = service.clone();
                async move { service.handle(req).await }
            },
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            },
        )
        .await?;

    gateway.drain_background().await;
    tracing::info!("shut down");

    Ok(())
}
