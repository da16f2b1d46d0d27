//! Discovery Service - Market Polling and Admission
//!
//! One long-lived task polls the catalog, filters candidates by
//! lifecycle and duration, and admits survivors into the registry. Each
//! admission is announced on a bounded channel so the orchestrator can
//! subscribe the market's tokens. A failed poll is logged and skipped;
//! the loop never dies.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::adapters::catalog::{CatalogClient, OrderBy};
use crate::adapters::metrics::MetricsRegistry;
use crate::config::DiscoveryConfig;
use crate::domain::market::{Market, MarketSubscription};
use crate::error::Result;
use crate::usecases::registry::MarketRegistry;

/// Polls the catalog and maintains the tracked-market set.
pub struct DiscoveryService {
    catalog: Arc<CatalogClient>,
    registry: Arc<MarketRegistry>,
    metrics: Arc<MetricsRegistry>,
    config: DiscoveryConfig,
    new_markets_tx: mpsc::Sender<MarketSubscription>,
    /// Flips true after the first successful poll; drives `/ready`.
    ready: Arc<AtomicBool>,
}

impl DiscoveryService {
    /// Build the service and hand back the new-market announcement
    /// stream consumed by the subscription orchestrator.
    pub fn new(
        catalog: Arc<CatalogClient>,
        registry: Arc<MarketRegistry>,
        metrics: Arc<MetricsRegistry>,
        config: DiscoveryConfig,
        ready: Arc<AtomicBool>,
    ) -> (Self, mpsc::Receiver<MarketSubscription>) {
        let (new_markets_tx, new_markets_rx) =
            mpsc::channel(config.new_markets_buffer_size);
        (
            Self {
                catalog,
                registry,
                metrics,
                config,
                new_markets_tx,
                ready,
            },
            new_markets_rx,
        )
    }

    /// Polling loop: once at startup, then on every tick until shutdown.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            limit = self.config.market_limit,
            slug = self.config.market_slug.as_deref().unwrap_or("<all>"),
            "Discovery service started"
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => self.poll_once().await,
            }
        }
        info!("Discovery service stopped");
    }

    /// One poll: fetch, filter, admit, announce.
    pub async fn poll_once(&self) {
        let started = Instant::now();
        let outcome = if let Some(slug) = self.config.market_slug.clone() {
            self.poll_single(&slug).await
        } else {
            self.poll_listing().await
        };
        self.metrics
            .discovery_poll_duration_seconds
            .observe(started.elapsed().as_secs_f64());

        match outcome {
            Ok(admitted) => {
                self.metrics.discovery_polls_total.inc();
                self.ready.store(true, Ordering::SeqCst);
                info!(
                    admitted,
                    tracked = self.registry.tracked_count(),
                    elapsed_ms = started.elapsed().as_millis(),
                    "Discovery poll complete"
                );
            }
            Err(e) => {
                self.metrics.discovery_poll_failures_total.inc();
                warn!(error = %e, "Discovery poll failed, will retry next tick");
            }
        }
    }

    async fn poll_listing(&self) -> Result<usize> {
        let page = self
            .catalog
            .fetch_active_markets(self.config.market_limit, 0, OrderBy::VolumeRecent)
            .await?;

        let mut admitted = 0;
        for market in &page.markets {
            if self.try_admit(market) {
                admitted += 1;
            }
        }
        Ok(admitted)
    }

    /// Single-market debugging mode: track exactly one slug, once.
    async fn poll_single(&self, slug: &str) -> Result<usize> {
        if self.registry.is_tracked(slug) {
            return Ok(0);
        }
        let market = self.catalog.fetch_market_by_slug(slug).await?;
        Ok(usize::from(self.try_admit(&market)))
    }

    /// Apply the admission filters and admit on success. Public so
    /// harnesses can drive admission without a live catalog.
    pub fn try_admit(&self, market: &Market) -> bool {
        if self.registry.is_tracked(&market.slug) {
            return false;
        }

        if let Some(reason) = self.filter_market(market) {
            self.metrics
                .markets_filtered_total
                .with_label_values(&[reason])
                .inc();
            debug!(slug = %market.slug, reason, "Market filtered");
            return false;
        }

        let subscription = self.registry.insert_market(market);
        self.metrics
            .markets_tracked
            .set(self.registry.tracked_count() as i64);

        info!(
            slug = %subscription.slug,
            market_id = %subscription.market_id,
            outcomes = subscription.outcomes.len(),
            "Market admitted"
        );

        // Non-blocking announce: a stalled orchestrator must not stall
        // the poll loop.
        if self.new_markets_tx.try_send(subscription).is_err() {
            self.metrics
                .buffer_overflow_total
                .with_label_values(&["new_markets"])
                .inc();
            warn!(slug = %market.slug, "New-markets channel full, announcement dropped");
        }
        true
    }

    /// Admission filters in order; `None` means admit.
    fn filter_market(&self, market: &Market) -> Option<&'static str> {
        if market.outcomes.len() < 2 {
            return Some("insufficient_outcomes");
        }

        let max_duration = self.config.max_market_duration;
        if !max_duration.is_zero() {
            if let Some(end_date) = market.end_date {
                let now = Utc::now();
                if end_date <= now {
                    return Some("expired");
                }
                let until_end = (end_date - now).to_std().unwrap_or_default();
                if until_end > max_duration {
                    return Some("filtered_by_duration");
                }
            }
        }

        None
    }

    /// Evict markets from the tracked set; returns the removed entries
    /// so the caller can unsubscribe tokens and prune snapshots.
    pub fn remove_markets(&self, slugs: &[String]) -> Vec<MarketSubscription> {
        let removed = self.registry.remove_markets(slugs);
        self.metrics
            .markets_tracked
            .set(self.registry.tracked_count() as i64);
        removed
    }
}
