//! Catalog Client Tests - Pagination, Slug Lookup, Metadata Fallback
//!
//! Runs the catalog client against a local stub server so pagination,
//! ordering parameters, error mapping, and the metadata cache's
//! single-flight and default-fallback behavior are all exercised over
//! real HTTP.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;

use polymarket_arb_bot::adapters::catalog::{CatalogClient, MetadataCache, OrderBy};
use polymarket_arb_bot::adapters::metrics::MetricsRegistry;
use polymarket_arb_bot::config::DiscoveryConfig;
use polymarket_arb_bot::error::EngineError;
use polymarket_arb_bot::usecases::{DiscoveryService, MarketRegistry};

struct Stub {
    markets: Vec<serde_json::Value>,
    market_queries: Mutex<Vec<HashMap<String, String>>>,
    token_requests: AtomicUsize,
    fail_listings: AtomicBool,
    fail_metadata: AtomicBool,
}

fn stub_market(index: usize, outcome_count: usize) -> serde_json::Value {
    let outcomes: Vec<String> = (0..outcome_count).map(|o| format!("Outcome {o}")).collect();
    let tokens: Vec<String> = (0..outcome_count)
        .map(|o| format!("m{index}-tok-{o}"))
        .collect();
    serde_json::json!({
        "id": format!("m-{index}"),
        "slug": format!("market-{index}"),
        "question": format!("Question {index}?"),
        "closed": false,
        "active": true,
        "outcomes": outcomes,
        "clobTokenIds": tokens,
        "endDate": "2027-01-01T00:00:00Z",
    })
}

async fn markets_handler(
    State(stub): State<Arc<Stub>>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    stub.market_queries.lock().push(params.clone());
    if stub.fail_listings.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }

    let limit: usize = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(100);
    let offset: usize = params
        .get("offset")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let start = offset.min(stub.markets.len());
    let end = (offset + limit).min(stub.markets.len());
    Json(stub.markets[start..end].to_vec()).into_response()
}

async fn token_handler(
    State(stub): State<Arc<Stub>>,
    Path(_token_id): Path<String>,
) -> axum::response::Response {
    stub.token_requests.fetch_add(1, Ordering::SeqCst);
    if stub.fail_metadata.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    Json(serde_json::json!({
        "minimumTickSize": "0.001",
        "minimumOrderSize": 15,
    }))
    .into_response()
}

async fn spawn_stub(market_count: usize) -> (String, Arc<Stub>) {
    let stub = Arc::new(Stub {
        markets: (0..market_count).map(|i| stub_market(i, 2)).collect(),
        market_queries: Mutex::new(Vec::new()),
        token_requests: AtomicUsize::new(0),
        fail_listings: AtomicBool::new(false),
        fail_metadata: AtomicBool::new(false),
    });

    let router = Router::new()
        .route("/markets", get(markets_handler))
        .route("/tokens/:token_id", get(token_handler))
        .with_state(Arc::clone(&stub));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{addr}"), stub)
}

#[tokio::test]
async fn test_unlimited_fetch_paginates_until_short_page() {
    let (url, stub) = spawn_stub(250).await;
    let client = CatalogClient::new(&url).unwrap();

    let page = client
        .fetch_active_markets(0, 0, OrderBy::VolumeRecent)
        .await
        .unwrap();

    assert_eq!(page.count, 250);
    assert_eq!(page.markets.len(), 250);
    // 100 + 100 + 50: the short page stops the loop.
    assert_eq!(stub.market_queries.lock().len(), 3);

    let queries = stub.market_queries.lock();
    assert_eq!(queries[0].get("order").unwrap(), "volume24hr");
    assert_eq!(queries[0].get("ascending").unwrap(), "false");
    assert_eq!(queries[0].get("closed").unwrap(), "false");
    assert_eq!(queries[1].get("offset").unwrap(), "100");
}

#[tokio::test]
async fn test_limited_fetch_stops_at_requested_total() {
    let (url, stub) = spawn_stub(250).await;
    let client = CatalogClient::new(&url).unwrap();

    let page = client
        .fetch_active_markets(120, 0, OrderBy::Created)
        .await
        .unwrap();

    assert_eq!(page.markets.len(), 120);
    assert_eq!(page.limit, 120);
    // 100 then 20.
    let queries = stub.market_queries.lock();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[1].get("limit").unwrap(), "20");
}

#[tokio::test]
async fn test_end_date_ordering_is_ascending() {
    let (url, stub) = spawn_stub(10).await;
    let client = CatalogClient::new(&url).unwrap();

    client
        .fetch_active_markets(10, 0, OrderBy::EndDate)
        .await
        .unwrap();

    let queries = stub.market_queries.lock();
    assert_eq!(queries[0].get("order").unwrap(), "endDate");
    assert_eq!(queries[0].get("ascending").unwrap(), "true");
}

#[tokio::test]
async fn test_slug_lookup_scans_pages() {
    let (url, _stub) = spawn_stub(180).await;
    let client = CatalogClient::new(&url).unwrap();

    let market = client.fetch_market_by_slug("market-150").await.unwrap();
    assert_eq!(market.id, "m-150");
    assert_eq!(market.outcomes.len(), 2);

    let missing = client.fetch_market_by_slug("market-999").await;
    assert!(matches!(missing, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn test_non_2xx_maps_to_transport_error() {
    let (url, stub) = spawn_stub(10).await;
    stub.fail_listings.store(true, Ordering::SeqCst);
    let client = CatalogClient::new(&url).unwrap();

    let result = client.fetch_active_markets(10, 0, OrderBy::VolumeRecent).await;
    assert!(matches!(result, Err(EngineError::Transport(_))));
}

#[tokio::test]
async fn test_metadata_success_and_caching() {
    let (url, stub) = spawn_stub(0).await;
    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let client = Arc::new(CatalogClient::new(&url).unwrap());
    let cache = MetadataCache::new(client, Arc::clone(&metrics));

    let metadata = cache.get("tok-1").await;
    assert_eq!(metadata.tick_size, 0.001);
    assert_eq!(metadata.min_order_size, 15.0);

    // A second read is served from cache.
    cache.get("tok-1").await;
    assert_eq!(stub.token_requests.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.metadata_errors_total.get(), 0);
}

#[tokio::test]
async fn test_metadata_failure_falls_back_to_defaults() {
    let (url, stub) = spawn_stub(0).await;
    stub.fail_metadata.store(true, Ordering::SeqCst);
    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let client = Arc::new(CatalogClient::new(&url).unwrap());
    let cache = MetadataCache::new(client, Arc::clone(&metrics));

    let metadata = cache.get("tok-1").await;
    assert_eq!(metadata.tick_size, 0.01);
    assert_eq!(metadata.min_order_size, 5.0);
    assert_eq!(metrics.metadata_errors_total.get(), 1);
}

#[tokio::test]
async fn test_metadata_single_flight_under_concurrency() {
    let (url, stub) = spawn_stub(0).await;
    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let client = Arc::new(CatalogClient::new(&url).unwrap());
    let cache = Arc::new(MetadataCache::new(client, metrics));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move { cache.get("tok-hot").await }));
    }
    for handle in handles {
        let metadata = handle.await.unwrap();
        assert_eq!(metadata.min_order_size, 15.0);
    }

    assert_eq!(stub.token_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_discovery_poll_against_catalog() {
    let (url, _stub) = spawn_stub(30).await;
    let registry = Arc::new(MarketRegistry::new());
    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let ready = Arc::new(AtomicBool::new(false));
    let (discovery, mut announcements) = DiscoveryService::new(
        Arc::new(CatalogClient::new(&url).unwrap()),
        Arc::clone(&registry),
        Arc::clone(&metrics),
        DiscoveryConfig {
            poll_interval: Duration::from_secs(30),
            market_limit: 0,
            max_market_duration: Duration::ZERO,
            market_slug: None,
            new_markets_buffer_size: 64,
        },
        Arc::clone(&ready),
    );

    assert!(!ready.load(Ordering::SeqCst));
    discovery.poll_once().await;

    assert!(ready.load(Ordering::SeqCst));
    assert_eq!(registry.tracked_count(), 30);
    assert_eq!(metrics.discovery_polls_total.get(), 1);

    let first = announcements.recv().await.unwrap();
    assert!(first.slug.starts_with("market-"));

    // A second poll admits nothing new.
    discovery.poll_once().await;
    assert_eq!(registry.tracked_count(), 30);
}
