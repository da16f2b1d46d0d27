//! Polymarket Cross-Outcome Arbitrage Engine - Entry Point
//!
//! Real-time detector for N-outcome arbitrage on Polymarket prediction
//! markets: discovery polls the catalog, a WebSocket pool streams
//! top-of-book per outcome token, and the event-driven detector fires
//! whenever the sum of best asks drops below the configured threshold
//! after fees and venue size constraints.

// Platform-specific allocator: jemalloc on Linux, system default elsewhere
#[cfg(all(target_os = "linux", target_env = "gnu"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

mod adapters;
mod config;
mod domain;
mod error;
mod ports;
mod usecases;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::catalog::{CatalogClient, MetadataCache};
use crate::adapters::feeds::SubscriptionPool;
use crate::adapters::metrics::{HttpServer, MetricsRegistry, ServerState};
use crate::adapters::persistence::{ConsoleSink, PostgresSink};
use crate::ports::OpportunitySink;
use crate::usecases::{ArbDetector, DiscoveryService, MarketRegistry, OrderbookManager};

/// Application version from Cargo.toml.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long shutdown waits for tasks to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize structured logging; RUST_LOG overrides LOG_LEVEL.
    let default_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = VERSION,
        pid = std::process::id(),
        "Starting Polymarket arbitrage engine"
    );

    let app_config = config::loader::load_config().context("Failed to load configuration")?;

    // Root cancellation signal wired through every component.
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    // Shared state and adapters.
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to build metrics")?);
    let registry = Arc::new(MarketRegistry::new());
    let catalog = Arc::new(
        CatalogClient::new(&app_config.catalog_url).context("Failed to build catalog client")?,
    );
    let metadata = Arc::new(MetadataCache::new(Arc::clone(&catalog), Arc::clone(&metrics)));
    let books = Arc::new(OrderbookManager::new(
        Arc::clone(&registry),
        Arc::clone(&metrics),
        app_config.ws.message_buffer_size,
    ));
    let pool = Arc::new(SubscriptionPool::new(
        app_config.market_data_ws_url.clone(),
        app_config.ws.clone(),
        Arc::clone(&metrics),
    ));

    let sink: Arc<dyn OpportunitySink> = match &app_config.database_url {
        Some(url) => Arc::new(
            PostgresSink::connect(url)
                .await
                .context("Failed to connect opportunity store")?,
        ),
        None => Arc::new(ConsoleSink::new()),
    };

    let ready = Arc::new(AtomicBool::new(false));
    let (discovery, mut new_markets_rx) = DiscoveryService::new(
        Arc::clone(&catalog),
        Arc::clone(&registry),
        Arc::clone(&metrics),
        app_config.discovery.clone(),
        Arc::clone(&ready),
    );
    let discovery = Arc::new(discovery);

    let detector = Arc::new(ArbDetector::new(
        Arc::clone(&registry),
        Arc::clone(&books),
        Arc::clone(&metadata),
        Arc::clone(&sink),
        Arc::clone(&metrics),
        app_config.arb.clone(),
    ));

    // Wire the streams before any producer starts.
    let messages_rx = pool
        .take_messages()
        .context("Feed message stream already taken")?;
    let updates_rx = books
        .take_updates()
        .context("Orderbook update stream already taken")?;
    let mut opportunities_rx = detector
        .take_opportunities()
        .context("Opportunity stream already taken")?;

    let mut tasks: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

    // HTTP surface: /metrics /health /ready /api/orderbook.
    let http = HttpServer::new(
        ServerState {
            metrics: Arc::clone(&metrics),
            ready: Arc::clone(&ready),
            registry: Arc::clone(&registry),
            books: Arc::clone(&books),
        },
        app_config.http_port,
    );
    {
        let shutdown_rx = shutdown_tx.subscribe();
        tasks.push((
            "http_server",
            tokio::spawn(async move {
                if let Err(e) = http.run(shutdown_rx).await {
                    error!(error = %e, "HTTP server exited with error");
                }
            }),
        ));
    }

    // WebSocket readers.
    pool.start(&shutdown_tx).await;

    // Orderbook manager consumes the merged feed stream.
    {
        let books = Arc::clone(&books);
        let shutdown_rx = shutdown_tx.subscribe();
        tasks.push((
            "orderbook_manager",
            tokio::spawn(async move {
                books.run(messages_rx, shutdown_rx).await;
            }),
        ));
    }

    // Detector consumes snapshot updates.
    {
        let detector = Arc::clone(&detector);
        let shutdown_rx = shutdown_tx.subscribe();
        tasks.push((
            "detector",
            tokio::spawn(async move {
                detector.run(updates_rx, shutdown_rx).await;
            }),
        ));
    }

    // Admission handler: each announced market gets its tokens
    // subscribed on the pool.
    {
        let pool = Arc::clone(&pool);
        let mut shutdown_rx = shutdown_tx.subscribe();
        tasks.push((
            "subscription_bridge",
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        announced = new_markets_rx.recv() => match announced {
                            Some(subscription) => {
                                pool.subscribe(subscription.token_ids()).await;
                            }
                            None => break,
                        },
                    }
                }
            }),
        ));
    }

    // Downstream executor boundary: opportunities are persisted by the
    // sink; this drain keeps the bounded channel flowing for whoever
    // attaches in-process.
    {
        let mut shutdown_rx = shutdown_tx.subscribe();
        tasks.push((
            "opportunity_drain",
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        opportunity = opportunities_rx.recv() => match opportunity {
                            Some(opportunity) => {
                                debug!(
                                    id = %opportunity.id,
                                    market = %opportunity.market_slug,
                                    net_bps = opportunity.net_profit_bps,
                                    "Opportunity available for execution"
                                );
                            }
                            None => break,
                        },
                    }
                }
            }),
        ));
    }

    // Discovery loop (polls once immediately, then on its ticker).
    {
        let discovery = Arc::clone(&discovery);
        let shutdown_rx = shutdown_tx.subscribe();
        tasks.push((
            "discovery",
            tokio::spawn(async move {
                discovery.run(shutdown_rx).await;
            }),
        ));
    }

    info!(
        mode = %app_config.execution_mode,
        http_port = app_config.http_port,
        "Engine running, waiting for market events"
    );

    wait_for_shutdown_signal().await;
    info!("Shutdown signal received, initiating graceful shutdown");

    // Fan the cancellation out, then drain in dependency order.
    let _ = shutdown_tx.send(());

    info!("Step 1/3: closing feed connections");
    pool.close().await;

    info!("Step 2/3: waiting for pipeline tasks");
    for (name, task) in tasks {
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(_) => debug!(task = name, "Task finished"),
            Err(_) => warn!(task = name, "Task did not finish within grace period"),
        }
    }

    info!("Step 3/3: closing opportunity sink");
    if let Err(e) = sink.close().await {
        warn!(error = %e, "Opportunity sink close failed");
    }

    info!(version = VERSION, "Engine shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(signal) => signal,
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
