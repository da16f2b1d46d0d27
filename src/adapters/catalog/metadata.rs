//! Token Metadata Cache - TTL'd, Bounded, Single-Flight
//!
//! Front for per-token tick size and minimum order size. A miss triggers
//! exactly one outbound call per token at a time; concurrent callers for
//! the same token wait on the in-flight fetch. An outbound failure never
//! propagates: the venue defaults are returned and the error is counted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::warn;

use super::client::CatalogClient;
use crate::adapters::metrics::MetricsRegistry;
use crate::domain::market::{TokenId, TokenMetadata};

/// How long a cached metadata entry stays valid.
const METADATA_TTL: Duration = Duration::from_secs(3600);

/// Entry cap; a sweep of expired entries runs when reached.
const MAX_ENTRIES: usize = 8192;

struct CacheEntry {
    metadata: TokenMetadata,
    fetched_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < METADATA_TTL
    }
}

/// Bounded in-process cache over `CatalogClient::fetch_token_metadata`.
pub struct MetadataCache {
    client: Arc<CatalogClient>,
    metrics: Arc<MetricsRegistry>,
    entries: DashMap<TokenId, CacheEntry>,
    inflight: DashMap<TokenId, Arc<Mutex<()>>>,
}

impl MetadataCache {
    pub fn new(client: Arc<CatalogClient>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            client,
            metrics,
            entries: DashMap::new(),
            inflight: DashMap::new(),
        }
    }

    /// Metadata for a token. Never fails: an unreachable catalog yields
    /// the defaults (tick 0.01, min order size 5.0).
    pub async fn get(&self, token_id: &str) -> TokenMetadata {
        if let Some(entry) = self.entries.get(token_id) {
            if entry.is_fresh() {
                return entry.metadata;
            }
        }

        // Single flight: one fetch per token, losers wait and re-check.
        let gate = self
            .inflight
            .entry(token_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = gate.lock().await;

        if let Some(entry) = self.entries.get(token_id) {
            if entry.is_fresh() {
                return entry.metadata;
            }
        }

        let metadata = match self.client.fetch_token_metadata(token_id).await {
            Ok(metadata) => metadata,
            Err(e) => {
                self.metrics.metadata_errors_total.inc();
                warn!(
                    token_id,
                    error = %e,
                    "Token metadata fetch failed, using defaults"
                );
                TokenMetadata::default()
            }
        };

        if self.entries.len() >= MAX_ENTRIES {
            self.entries.retain(|_, entry| entry.is_fresh());
        }
        self.entries.insert(
            token_id.to_string(),
            CacheEntry {
                metadata,
                fetched_at: Instant::now(),
            },
        );
        self.inflight.remove(token_id);

        metadata
    }

    /// Number of cached entries, fresh or expired.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn insert_for_test(&self, token_id: &str, metadata: TokenMetadata) {
        self.entries.insert(
            token_id.to_string(),
            CacheEntry {
                metadata,
                fetched_at: Instant::now(),
            },
        );
    }
}
