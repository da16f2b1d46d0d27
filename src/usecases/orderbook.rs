//! Orderbook Manager - Per-Token Top-of-Book State
//!
//! Ingests the merged feed stream and maintains one snapshot per outcome
//! token in a concurrent map, replaced atomically per token so readers
//! always observe a consistent (price, size, timestamp) tuple. Every
//! mutation is fanned out on a bounded update channel; ingest never
//! blocks on slow consumers.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::adapters::feeds::messages::{FeedEvent, Side};
use crate::adapters::metrics::MetricsRegistry;
use crate::domain::book::TopOfBook;
use crate::domain::market::TokenId;
use crate::error::{EngineError, Result};
use crate::usecases::registry::MarketRegistry;

/// Concurrent top-of-book store keyed by token id.
pub struct OrderbookManager {
    books: DashMap<TokenId, TopOfBook>,
    registry: Arc<MarketRegistry>,
    metrics: Arc<MetricsRegistry>,
    updates_tx: mpsc::Sender<TopOfBook>,
    updates_rx: Mutex<Option<mpsc::Receiver<TopOfBook>>>,
}

impl OrderbookManager {
    pub fn new(
        registry: Arc<MarketRegistry>,
        metrics: Arc<MetricsRegistry>,
        update_buffer_size: usize,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::channel(update_buffer_size);
        Self {
            books: DashMap::new(),
            registry,
            metrics,
            updates_tx,
            updates_rx: Mutex::new(Some(updates_rx)),
        }
    }

    /// Take the update stream. Single consumer; fan-out is external.
    pub fn take_updates(&self) -> Option<mpsc::Receiver<TopOfBook>> {
        self.updates_rx.lock().take()
    }

    /// Point-in-time copy of a token's snapshot.
    ///
    /// # Errors
    /// `EngineError::NotFound` when no message has been received for the
    /// token or its market is no longer tracked.
    pub fn get_snapshot(&self, token_id: &str) -> Result<TopOfBook> {
        self.books
            .get(token_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| EngineError::NotFound(format!("no snapshot for token {token_id}")))
    }

    /// Number of tokens with a live snapshot.
    pub fn snapshot_count(&self) -> usize {
        self.books.len()
    }

    /// Drop snapshots for removed tokens to bound memory.
    pub fn prune(&self, token_ids: &[TokenId]) {
        for token_id in token_ids {
            self.books.remove(token_id);
        }
    }

    /// Ingest loop: consume the merged feed stream until shutdown.
    pub async fn run(
        &self,
        mut messages_rx: mpsc::Receiver<FeedEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!("Orderbook manager started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                message = messages_rx.recv() => match message {
                    Some(event) => self.apply(event),
                    None => break,
                },
            }
        }
        info!(snapshots = self.snapshot_count(), "Orderbook manager stopped");
    }

    /// Apply one feed event: replace the token's snapshot and emit it.
    pub fn apply(&self, event: FeedEvent) {
        let token_id = event.asset_id().to_string();

        // Snapshots exist only for tracked markets; anything else is a
        // late message for a removed market and is dropped here.
        let Some((subscription, outcome_index)) =
            self.registry.get_market_by_token_id(&token_id)
        else {
            debug!(token_id = %token_id, "Dropping event for untracked token");
            return;
        };
        let outcome_label = subscription
            .outcomes
            .get(outcome_index)
            .map_or_else(String::new, |o| o.label.clone());

        let mut entry = self
            .books
            .entry(token_id.clone())
            .or_insert_with(|| {
                TopOfBook::empty(token_id.clone(), subscription.market_id.clone(), outcome_label)
            });
        let snapshot = entry.value_mut();

        match &event {
            FeedEvent::Book(book) => {
                // Full replacement of both sides; an empty side zeroes out
                // and stays invalid for the detector.
                let (bid_price, bid_size) = book
                    .bids
                    .first()
                    .map_or((0.0, 0.0), |level| (level.price, level.size));
                let (ask_price, ask_size) = book
                    .asks
                    .first()
                    .map_or((0.0, 0.0), |level| (level.price, level.size));
                snapshot.best_bid_price = bid_price;
                snapshot.best_bid_size = bid_size;
                snapshot.best_ask_price = ask_price;
                snapshot.best_ask_size = ask_size;
            }
            FeedEvent::PriceChange(change) => {
                // Best-level updates folded into the current snapshot; the
                // last change per side in a message wins.
                for level in &change.changes {
                    match level.side {
                        Side::Buy => {
                            snapshot.best_bid_price = level.price;
                            snapshot.best_bid_size = level.size;
                        }
                        Side::Sell => {
                            snapshot.best_ask_price = level.price;
                            snapshot.best_ask_size = level.size;
                        }
                    }
                }
            }
        }
        snapshot.last_updated = std::time::Instant::now();

        let emitted = snapshot.clone();
        drop(entry);

        if self.updates_tx.try_send(emitted).is_err() {
            self.metrics
                .buffer_overflow_total
                .with_label_values(&["orderbook_updates"])
                .inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::feeds::messages::{
        BookEvent, LevelChange, PriceChangeEvent, PriceLevel,
    };
    use crate::domain::market::{Market, Outcome};

    fn tracked_registry() -> Arc<MarketRegistry> {
        let registry = Arc::new(MarketRegistry::new());
        registry.insert_market(&Market {
            id: "m1".to_string(),
            slug: "slug-1".to_string(),
            question: "Q?".to_string(),
            closed: false,
            active: true,
            end_date: None,
            outcomes: vec![
                Outcome { token_id: "yes".to_string(), label: "Yes".to_string() },
                Outcome { token_id: "no".to_string(), label: "No".to_string() },
            ],
        });
        registry
    }

    fn manager() -> OrderbookManager {
        OrderbookManager::new(
            tracked_registry(),
            Arc::new(MetricsRegistry::new().unwrap()),
            64,
        )
    }

    fn book_event(token: &str, bid: Option<(f64, f64)>, ask: Option<(f64, f64)>) -> FeedEvent {
        FeedEvent::Book(BookEvent {
            asset_id: token.to_string(),
            bids: bid.map(|(p, s)| PriceLevel { price: p, size: s }).into_iter().collect(),
            asks: ask.map(|(p, s)| PriceLevel { price: p, size: s }).into_iter().collect(),
            timestamp_ms: 0,
        })
    }

    #[test]
    fn test_book_event_creates_snapshot() {
        let manager = manager();
        manager.apply(book_event("yes", Some((0.47, 120.0)), Some((0.48, 100.0))));

        let snap = manager.get_snapshot("yes").unwrap();
        assert_eq!(snap.best_bid_price, 0.47);
        assert_eq!(snap.best_ask_price, 0.48);
        assert_eq!(snap.best_ask_size, 100.0);
        assert_eq!(snap.market_id, "m1");
        assert_eq!(snap.outcome, "Yes");
    }

    #[test]
    fn test_missing_side_is_zeroed() {
        let manager = manager();
        manager.apply(book_event("yes", None, Some((0.48, 100.0))));

        let snap = manager.get_snapshot("yes").unwrap();
        assert_eq!(snap.best_bid_price, 0.0);
        assert_eq!(snap.best_bid_size, 0.0);
        assert!(!snap.has_bid());
        assert!(snap.has_ask());
    }

    #[test]
    fn test_price_change_folds_into_snapshot() {
        let manager = manager();
        manager.apply(book_event("yes", Some((0.47, 120.0)), Some((0.48, 100.0))));
        manager.apply(FeedEvent::PriceChange(PriceChangeEvent {
            asset_id: "yes".to_string(),
            changes: vec![LevelChange { side: Side::Sell, price: 0.46, size: 50.0 }],
            timestamp_ms: 0,
        }));

        let snap = manager.get_snapshot("yes").unwrap();
        assert_eq!(snap.best_ask_price, 0.46);
        assert_eq!(snap.best_ask_size, 50.0);
        // Untouched side survives.
        assert_eq!(snap.best_bid_price, 0.47);
    }

    #[test]
    fn test_price_change_before_book_leaves_other_side_invalid() {
        let manager = manager();
        manager.apply(FeedEvent::PriceChange(PriceChangeEvent {
            asset_id: "yes".to_string(),
            changes: vec![LevelChange { side: Side::Sell, price: 0.52, size: 10.0 }],
            timestamp_ms: 0,
        }));

        let snap = manager.get_snapshot("yes").unwrap();
        assert!(snap.has_ask());
        assert!(!snap.has_bid());
    }

    #[test]
    fn test_untracked_token_is_dropped() {
        let manager = manager();
        manager.apply(book_event("stranger", Some((0.4, 1.0)), Some((0.6, 1.0))));
        assert!(manager.get_snapshot("stranger").is_err());
        assert_eq!(manager.snapshot_count(), 0);
    }

    #[test]
    fn test_duplicate_replay_is_idempotent() {
        let manager = manager();
        let event = book_event("yes", Some((0.47, 120.0)), Some((0.48, 100.0)));
        manager.apply(event.clone());
        let first = manager.get_snapshot("yes").unwrap();
        manager.apply(event);
        let second = manager.get_snapshot("yes").unwrap();

        assert_eq!(first.best_bid_price, second.best_bid_price);
        assert_eq!(first.best_ask_price, second.best_ask_price);
        assert_eq!(first.best_ask_size, second.best_ask_size);
    }

    #[tokio::test]
    async fn test_updates_channel_receives_every_mutation() {
        let manager = manager();
        let mut updates = manager.take_updates().unwrap();
        assert!(manager.take_updates().is_none());

        manager.apply(book_event("yes", Some((0.47, 120.0)), Some((0.48, 100.0))));
        manager.apply(book_event("no", Some((0.46, 90.0)), Some((0.49, 80.0))));

        let first = updates.recv().await.unwrap();
        let second = updates.recv().await.unwrap();
        assert_eq!(first.token_id, "yes");
        assert_eq!(second.token_id, "no");
    }

    #[test]
    fn test_prune_removes_snapshots() {
        let manager = manager();
        manager.apply(book_event("yes", Some((0.47, 120.0)), Some((0.48, 100.0))));
        manager.apply(book_event("no", Some((0.46, 90.0)), Some((0.49, 80.0))));
        assert_eq!(manager.snapshot_count(), 2);

        manager.prune(&["yes".to_string()]);
        assert_eq!(manager.snapshot_count(), 1);
        assert!(manager.get_snapshot("yes").is_err());
        assert!(manager.get_snapshot("no").is_ok());
    }
}
