//! Market Catalog Client - Listing and Metadata REST Access
//!
//! Plain GET client for the market catalog. Paginates listings in
//! fixed-size batches, resolves slugs by scanning a bounded number of
//! pages, and fetches per-token metadata. No retries here; retry policy
//! belongs to callers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::debug;

use super::types::{MarketsPage, OrderBy, RawMarket, RawTokenMetadata};
use crate::domain::market::{Market, TokenMetadata};
use crate::error::{EngineError, Result};

/// Listing page size used for internal pagination.
const PAGE_SIZE: u32 = 100;

/// Upper bound on pages scanned during a slug search.
const MAX_SLUG_PAGES: u32 = 50;

/// Request timeout for catalog calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum concurrent catalog requests.
const MAX_CONCURRENT: usize = 10;

/// HTTP client for the market catalog API.
pub struct CatalogClient {
    http: Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
}

impl CatalogClient {
    /// Create a catalog client for the given base URL.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("polymarket-arb-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT)),
        })
    }

    /// Fetch active markets, paginating internally.
    ///
    /// `limit == 0` means unlimited: pages are fetched until the catalog
    /// returns a short page. Ordering is ascending only for `EndDate`.
    ///
    /// # Errors
    /// `Transport` on connect/timeout/non-2xx, `Decode` on a malformed
    /// body.
    pub async fn fetch_active_markets(
        &self,
        limit: u32,
        offset: u32,
        order_by: OrderBy,
    ) -> Result<MarketsPage> {
        let mut markets: Vec<Market> = Vec::new();
        let mut page_offset = offset;

        loop {
            let remaining = if limit == 0 {
                PAGE_SIZE
            } else {
                (limit as usize - markets.len()).min(PAGE_SIZE as usize) as u32
            };
            if remaining == 0 {
                break;
            }

            let raw_page = self.fetch_page(remaining, page_offset, order_by).await?;
            let raw_len = raw_page.len();

            markets.extend(raw_page.into_iter().filter_map(RawMarket::into_market));

            // A short page is the end of the listing.
            if raw_len < remaining as usize {
                break;
            }
            page_offset += raw_len as u32;

            if limit != 0 && markets.len() >= limit as usize {
                markets.truncate(limit as usize);
                break;
            }
        }

        debug!(
            count = markets.len(),
            limit,
            offset,
            order = order_by.wire_name(),
            "Catalog listing fetched"
        );

        Ok(MarketsPage {
            count: markets.len(),
            limit,
            offset,
            markets,
        })
    }

    /// Find a market by slug, scanning listing pages.
    ///
    /// # Errors
    /// `NotFound` when the slug does not appear within the page bound;
    /// transport/decode errors as in `fetch_active_markets`.
    pub async fn fetch_market_by_slug(&self, slug: &str) -> Result<Market> {
        let mut page_offset = 0;

        for _ in 0..MAX_SLUG_PAGES {
            let raw_page = self
                .fetch_page(PAGE_SIZE, page_offset, OrderBy::VolumeRecent)
                .await?;
            let raw_len = raw_page.len();

            if let Some(market) = raw_page
                .into_iter()
                .filter_map(RawMarket::into_market)
                .find(|m| m.slug == slug)
            {
                return Ok(market);
            }

            if raw_len < PAGE_SIZE as usize {
                break;
            }
            page_offset += raw_len as u32;
        }

        Err(EngineError::NotFound(format!("market slug {slug}")))
    }

    /// Fetch tick size and minimum order size for one token.
    ///
    /// Absent fields fall back to the venue defaults; the metadata cache
    /// layers TTL and single-flight on top of this call.
    pub async fn fetch_token_metadata(&self, token_id: &str) -> Result<TokenMetadata> {
        let url = format!("{}/tokens/{token_id}", self.base_url);
        let raw: RawTokenMetadata = self.get_json(&url).await?;

        let defaults = TokenMetadata::default();
        Ok(TokenMetadata {
            tick_size: raw.minimum_tick_size.unwrap_or(defaults.tick_size),
            min_order_size: raw.minimum_order_size.unwrap_or(defaults.min_order_size),
        })
    }

    async fn fetch_page(
        &self,
        limit: u32,
        offset: u32,
        order_by: OrderBy,
    ) -> Result<Vec<RawMarket>> {
        let url = format!(
            "{}/markets?closed=false&active=true&limit={}&offset={}&order={}&ascending={}",
            self.base_url,
            limit,
            offset,
            order_by.wire_name(),
            order_by.ascending(),
        );
        self.get_json(&url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| EngineError::Cancelled)?;

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Transport(format!(
                "GET {url} returned {status}"
            )));
        }

        response.json::<T>().await.map_err(EngineError::from)
    }
}
