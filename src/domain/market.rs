//! Market Domain Types - Markets, Outcomes, and Venue Metadata
//!
//! Defines the tradable universe: a market with its ordered outcome list,
//! the per-token venue metadata (tick size, minimum order size), and the
//! tracked-set entry produced by discovery. No transport types here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable market identifier assigned by the catalog.
pub type MarketId = String;

/// Opaque outcome token identifier used by the market-data feed.
pub type TokenId = String;

/// Tick size applied when the catalog metadata is unreachable.
pub const DEFAULT_TICK_SIZE: f64 = 0.01;

/// Minimum order size (in tokens) applied when metadata is unreachable.
pub const DEFAULT_MIN_ORDER_SIZE: f64 = 5.0;

/// A prediction market with two or more mutually exclusive outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    /// Stable catalog identifier.
    pub id: MarketId,
    /// Human-readable URL slug.
    pub slug: String,
    /// Market question text.
    pub question: String,
    /// Whether the market has been closed for trading.
    pub closed: bool,
    /// Whether the market is currently active.
    pub active: bool,
    /// Resolution time; `None` when the catalog reports zero/unknown.
    pub end_date: Option<DateTime<Utc>>,
    /// Ordered outcome list, length >= 2 for tradable markets.
    pub outcomes: Vec<Outcome>,
}

impl Market {
    /// Token ids of all outcomes, in outcome order.
    pub fn token_ids(&self) -> Vec<TokenId> {
        self.outcomes.iter().map(|o| o.token_id.clone()).collect()
    }
}

/// One of the N mutually exclusive resolutions of a market.
///
/// Owned by its market; an outcome never changes markets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    /// Tradable token id for this outcome.
    pub token_id: TokenId,
    /// Outcome label (e.g. "Yes", "Candidate A").
    pub label: String,
}

/// Venue constraints for a single outcome token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Smallest price increment permitted by the venue.
    pub tick_size: f64,
    /// Smallest token count a single order may carry.
    pub min_order_size: f64,
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            tick_size: DEFAULT_TICK_SIZE,
            min_order_size: DEFAULT_MIN_ORDER_SIZE,
        }
    }
}

impl TokenMetadata {
    /// Whether the tick size is one the venue actually quotes.
    pub fn has_valid_tick(&self) -> bool {
        const VALID: [f64; 4] = [0.1, 0.01, 0.001, 0.0001];
        VALID.iter().any(|t| (self.tick_size - t).abs() < 1e-9)
    }

    /// Decimal places for quote-currency amounts at this tick size.
    ///
    /// 0.1 -> 3, 0.01 -> 4, 0.001 -> 5, 0.0001 -> 6. Unknown ticks get the
    /// default-tick precision.
    pub fn amount_precision(&self) -> u32 {
        if (self.tick_size - 0.1).abs() < 1e-9 {
            3
        } else if (self.tick_size - 0.01).abs() < 1e-9 {
            4
        } else if (self.tick_size - 0.001).abs() < 1e-9 {
            5
        } else if (self.tick_size - 0.0001).abs() < 1e-9 {
            6
        } else {
            4
        }
    }
}

/// Entry in the tracked-market set maintained by discovery.
#[derive(Debug, Clone)]
pub struct MarketSubscription {
    /// Stable catalog identifier.
    pub market_id: MarketId,
    /// Human-readable URL slug.
    pub slug: String,
    /// Market question text.
    pub question: String,
    /// Ordered outcome list carried over from the catalog record.
    pub outcomes: Vec<Outcome>,
    /// When discovery admitted the market.
    pub subscribed_at: DateTime<Utc>,
}

impl MarketSubscription {
    /// Build a tracked-set entry from a catalog market record.
    pub fn from_market(market: &Market) -> Self {
        Self {
            market_id: market.id.clone(),
            slug: market.slug.clone(),
            question: market.question.clone(),
            outcomes: market.outcomes.clone(),
            subscribed_at: Utc::now(),
        }
    }

    /// Token ids of all outcomes, in outcome order.
    pub fn token_ids(&self) -> Vec<TokenId> {
        self.outcomes.iter().map(|o| o.token_id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_metadata_matches_fallback() {
        let meta = TokenMetadata::default();
        assert_eq!(meta.tick_size, 0.01);
        assert_eq!(meta.min_order_size, 5.0);
        assert!(meta.has_valid_tick());
    }

    #[test]
    fn test_amount_precision_per_tick() {
        let precisions = [(0.1, 3), (0.01, 4), (0.001, 5), (0.0001, 6)];
        for (tick, expected) in precisions {
            let meta = TokenMetadata {
                tick_size: tick,
                min_order_size: 5.0,
            };
            assert_eq!(meta.amount_precision(), expected, "tick {tick}");
        }
    }

    #[test]
    fn test_unknown_tick_falls_back_to_default_precision() {
        let meta = TokenMetadata {
            tick_size: 0.05,
            min_order_size: 5.0,
        };
        assert!(!meta.has_valid_tick());
        assert_eq!(meta.amount_precision(), 4);
    }

    #[test]
    fn test_subscription_preserves_outcome_order() {
        let market = Market {
            id: "0xmarket".to_string(),
            slug: "who-wins".to_string(),
            question: "Who wins?".to_string(),
            closed: false,
            active: true,
            end_date: None,
            outcomes: vec![
                Outcome {
                    token_id: "tok-a".to_string(),
                    label: "A".to_string(),
                },
                Outcome {
                    token_id: "tok-b".to_string(),
                    label: "B".to_string(),
                },
                Outcome {
                    token_id: "tok-c".to_string(),
                    label: "C".to_string(),
                },
            ],
        };

        let sub = MarketSubscription::from_market(&market);
        assert_eq!(sub.token_ids(), vec!["tok-a", "tok-b", "tok-c"]);
        assert_eq!(sub.market_id, "0xmarket");
    }
}
