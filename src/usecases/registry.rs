//! Market Registry - Tracked Set and Token Reverse Index
//!
//! The single source of truth binding discovery and detection: a
//! slug-keyed tracked-market map, a token_id-keyed reverse index for the
//! hot-path lookup, and a TTL'd cache of raw catalog records. All three
//! mutate together under one write lock; discovery is the sole writer,
//! every other component takes read locks only.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;

use crate::domain::market::{Market, MarketId, MarketSubscription, TokenId};

/// How long an admitted market's catalog record stays cached.
const MARKET_CACHE_TTL_HOURS: i64 = 24;

/// Where a token lives: its market and position in the outcome list.
#[derive(Debug, Clone)]
pub struct TokenLocation {
    /// Tracked-map key of the owning market.
    pub slug: String,
    /// Stable id of the owning market.
    pub market_id: MarketId,
    /// Index into the market's ordered outcome list.
    pub outcome_index: usize,
}

struct CachedRecord {
    market: Market,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct RegistryInner {
    /// Tracked markets keyed by slug.
    markets: HashMap<String, MarketSubscription>,
    /// token_id -> owning market; one entry per outcome of every tracked
    /// market and no others.
    token_index: HashMap<TokenId, TokenLocation>,
    /// Raw catalog records by market id, refreshed on admission.
    record_cache: HashMap<MarketId, CachedRecord>,
}

/// Shared registry of tracked markets and their outcome tokens.
#[derive(Default)]
pub struct MarketRegistry {
    inner: RwLock<RegistryInner>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a market slug is already tracked.
    pub fn is_tracked(&self, slug: &str) -> bool {
        self.inner.read().markets.contains_key(slug)
    }

    /// Number of currently tracked markets.
    pub fn tracked_count(&self) -> usize {
        self.inner.read().markets.len()
    }

    /// Admit a market: tracked map, reverse index, and record cache are
    /// all updated under a single write lock.
    pub fn insert_market(&self, market: &Market) -> MarketSubscription {
        let subscription = MarketSubscription::from_market(market);
        let mut inner = self.inner.write();

        for (index, outcome) in subscription.outcomes.iter().enumerate() {
            inner.token_index.insert(
                outcome.token_id.clone(),
                TokenLocation {
                    slug: subscription.slug.clone(),
                    market_id: subscription.market_id.clone(),
                    outcome_index: index,
                },
            );
        }
        inner.record_cache.insert(
            market.id.clone(),
            CachedRecord {
                market: market.clone(),
                expires_at: Utc::now() + ChronoDuration::hours(MARKET_CACHE_TTL_HOURS),
            },
        );
        inner
            .markets
            .insert(subscription.slug.clone(), subscription.clone());

        subscription
    }

    /// Remove markets by slug. Tracked entries, index entries, and cache
    /// rows go away under one write lock; returns the removed
    /// subscriptions so the caller can unsubscribe and prune snapshots.
    pub fn remove_markets(&self, slugs: &[String]) -> Vec<MarketSubscription> {
        let mut inner = self.inner.write();
        let mut removed = Vec::new();

        for slug in slugs {
            if let Some(subscription) = inner.markets.remove(slug) {
                for outcome in &subscription.outcomes {
                    inner.token_index.remove(&outcome.token_id);
                }
                inner.record_cache.remove(&subscription.market_id);
                removed.push(subscription);
            }
        }

        removed
    }

    /// Snapshot of the tracked set.
    pub fn get_subscribed_markets(&self) -> Vec<MarketSubscription> {
        self.inner.read().markets.values().cloned().collect()
    }

    /// Tracked market by slug, if any.
    pub fn get_market_by_slug(&self, slug: &str) -> Option<MarketSubscription> {
        self.inner.read().markets.get(slug).cloned()
    }

    /// Hot-path lookup: owning market and outcome index for a token.
    pub fn get_market_by_token_id(
        &self,
        token_id: &str,
    ) -> Option<(MarketSubscription, usize)> {
        let inner = self.inner.read();
        let location = inner.token_index.get(token_id)?;
        let subscription = inner.markets.get(&location.slug)?;
        Some((subscription.clone(), location.outcome_index))
    }

    /// Cached catalog record for a market, if still fresh.
    pub fn get_cached_record(&self, market_id: &str) -> Option<Market> {
        let inner = self.inner.read();
        let cached = inner.record_cache.get(market_id)?;
        if cached.expires_at <= Utc::now() {
            return None;
        }
        Some(cached.market.clone())
    }

    /// All token ids in the reverse index. Test and diagnostics helper.
    pub fn indexed_token_ids(&self) -> Vec<TokenId> {
        self.inner.read().token_index.keys().cloned().collect()
    }

    #[cfg(test)]
    fn force_cache_expiry(&self, market_id: &str) {
        let mut inner = self.inner.write();
        if let Some(cached) = inner.record_cache.get_mut(market_id) {
            cached.expires_at = Utc::now() - ChronoDuration::seconds(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Outcome;

    fn market(id: &str, slug: &str, tokens: &[&str]) -> Market {
        Market {
            id: id.to_string(),
            slug: slug.to_string(),
            question: format!("{slug}?"),
            closed: false,
            active: true,
            end_date: None,
            outcomes: tokens
                .iter()
                .enumerate()
                .map(|(i, t)| Outcome {
                    token_id: (*t).to_string(),
                    label: format!("Outcome {i}"),
                })
                .collect(),
        }
    }

    #[test]
    fn test_insert_indexes_every_outcome() {
        let registry = MarketRegistry::new();
        registry.insert_market(&market("m1", "slug-1", &["t1", "t2", "t3"]));

        assert!(registry.is_tracked("slug-1"));
        assert_eq!(registry.tracked_count(), 1);

        for (i, token) in ["t1", "t2", "t3"].iter().enumerate() {
            let (sub, index) = registry.get_market_by_token_id(token).unwrap();
            assert_eq!(sub.market_id, "m1");
            assert_eq!(index, i);
        }
        assert_eq!(registry.indexed_token_ids().len(), 3);
    }

    #[test]
    fn test_remove_clears_index_and_cache() {
        let registry = MarketRegistry::new();
        registry.insert_market(&market("m1", "slug-1", &["t1", "t2"]));
        registry.insert_market(&market("m2", "slug-2", &["t3", "t4"]));

        let removed = registry.remove_markets(&["slug-1".to_string()]);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].market_id, "m1");

        assert!(!registry.is_tracked("slug-1"));
        assert!(registry.get_market_by_token_id("t1").is_none());
        assert!(registry.get_market_by_token_id("t2").is_none());
        assert!(registry.get_cached_record("m1").is_none());

        // The second market is untouched.
        assert!(registry.get_market_by_token_id("t3").is_some());
        assert_eq!(registry.indexed_token_ids().len(), 2);
    }

    #[test]
    fn test_remove_unknown_slug_is_noop() {
        let registry = MarketRegistry::new();
        registry.insert_market(&market("m1", "slug-1", &["t1", "t2"]));
        let removed = registry.remove_markets(&["missing".to_string()]);
        assert!(removed.is_empty());
        assert_eq!(registry.tracked_count(), 1);
    }

    #[test]
    fn test_record_cache_expires() {
        let registry = MarketRegistry::new();
        registry.insert_market(&market("m1", "slug-1", &["t1", "t2"]));
        assert!(registry.get_cached_record("m1").is_some());

        registry.force_cache_expiry("m1");
        assert!(registry.get_cached_record("m1").is_none());
    }

    #[test]
    fn test_readmission_overwrites_cleanly() {
        let registry = MarketRegistry::new();
        registry.insert_market(&market("m1", "slug-1", &["t1", "t2"]));
        // Same slug, refreshed token set (venue rotated the tokens).
        registry.insert_market(&market("m1", "slug-1", &["t5", "t6"]));

        assert_eq!(registry.tracked_count(), 1);
        assert!(registry.get_market_by_token_id("t5").is_some());
        // Stale entries linger only until an explicit remove; the detector
        // drops them because the snapshot gather fails.
        let (sub, _) = registry.get_market_by_token_id("t5").unwrap();
        assert_eq!(sub.token_ids(), vec!["t5", "t6"]);
    }
}
