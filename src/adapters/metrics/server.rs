//! Engine HTTP Server - Metrics, Probes, and Orderbook Read API
//!
//! One axum server on the configured port:
//! - `/metrics`: Prometheus exposition of the engine registry
//! - `/health`: 200 while the process is up
//! - `/ready`: 200 only after discovery has completed one successful poll
//! - `/api/orderbook?slug=...`: read-only top-of-book view of a tracked
//!   market (400 missing param, 404 unknown slug, 405 non-GET)

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use super::prometheus::MetricsRegistry;
use crate::usecases::orderbook::OrderbookManager;
use crate::usecases::registry::MarketRegistry;

/// Shared state behind every HTTP handler.
#[derive(Clone)]
pub struct ServerState {
    pub metrics: Arc<MetricsRegistry>,
    /// Set by discovery after its first successful poll.
    pub ready: Arc<AtomicBool>,
    pub registry: Arc<MarketRegistry>,
    pub books: Arc<OrderbookManager>,
}

/// Per-outcome entry in the orderbook read API response.
#[derive(Debug, Serialize)]
struct OutcomeBookView {
    outcome: String,
    token_id: String,
    best_bid_price: f64,
    best_bid_size: f64,
    best_ask_price: f64,
    best_ask_size: f64,
}

/// Response body of `/api/orderbook`.
#[derive(Debug, Serialize)]
struct OrderbookView {
    market_id: String,
    market_slug: String,
    question: String,
    outcomes: Vec<OutcomeBookView>,
}

/// The engine's HTTP surface.
pub struct HttpServer {
    state: ServerState,
    port: u16,
}

impl HttpServer {
    pub fn new(state: ServerState, port: u16) -> Self {
        Self { state, port }
    }

    /// Build the router; split out so tests can serve it on an
    /// ephemeral listener.
    pub fn router(state: ServerState) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/api/orderbook", get(orderbook_handler))
            .with_state(state)
    }

    /// Bind and serve until shutdown.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(address = %addr, "HTTP server started");

        axum::serve(listener, Self::router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

async fn metrics_handler(State(state): State<ServerState>) -> impl IntoResponse {
    (StatusCode::OK, state.metrics.encode())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn ready_handler(State(state): State<ServerState>) -> impl IntoResponse {
    if state.ready.load(Ordering::SeqCst) {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn orderbook_handler(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let Some(slug) = params.get("slug").filter(|s| !s.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing slug parameter").into_response();
    };

    let Some(subscription) = state.registry.get_market_by_slug(slug) else {
        return (StatusCode::NOT_FOUND, "market not tracked").into_response();
    };

    let outcomes = subscription
        .outcomes
        .iter()
        .map(|outcome| {
            let snapshot = state.books.get_snapshot(&outcome.token_id).ok();
            let (bid_price, bid_size, ask_price, ask_size) = snapshot.map_or(
                (0.0, 0.0, 0.0, 0.0),
                |s| {
                    (
                        s.best_bid_price,
                        s.best_bid_size,
                        s.best_ask_price,
                        s.best_ask_size,
                    )
                },
            );
            OutcomeBookView {
                outcome: outcome.label.clone(),
                token_id: outcome.token_id.clone(),
                best_bid_price: bid_price,
                best_bid_size: bid_size,
                best_ask_price: ask_price,
                best_ask_size: ask_size,
            }
        })
        .collect();

    Json(OrderbookView {
        market_id: subscription.market_id,
        market_slug: subscription.slug,
        question: subscription.question,
        outcomes,
    })
    .into_response()
}
