//! Top-of-Book Snapshot - Best Bid/Ask State per Token
//!
//! One snapshot per outcome token, replaced atomically by the orderbook
//! manager on every ingested feed message. Prices and sizes are plain f64;
//! a zeroed side means "no resting liquidity seen yet" and is treated as
//! invalid by the detector.

use std::time::Instant;

use crate::domain::market::{MarketId, TokenId};

/// Best bid and best ask for a single outcome token.
#[derive(Debug, Clone)]
pub struct TopOfBook {
    /// Outcome token this snapshot belongs to.
    pub token_id: TokenId,
    /// Owning market, resolved at subscription time.
    pub market_id: MarketId,
    /// Outcome label for logging and opportunity records.
    pub outcome: String,
    /// Highest resting buy price; 0 when the side is empty.
    pub best_bid_price: f64,
    /// Size available at the best bid.
    pub best_bid_size: f64,
    /// Lowest resting sell price; 0 when the side is empty.
    pub best_ask_price: f64,
    /// Size available at the best ask.
    pub best_ask_size: f64,
    /// Monotonic timestamp of the last mutation.
    pub last_updated: Instant,
}

impl TopOfBook {
    /// Empty snapshot for a token that has not received a full book yet.
    pub fn empty(token_id: TokenId, market_id: MarketId, outcome: String) -> Self {
        Self {
            token_id,
            market_id,
            outcome,
            best_bid_price: 0.0,
            best_bid_size: 0.0,
            best_ask_price: 0.0,
            best_ask_size: 0.0,
            last_updated: Instant::now(),
        }
    }

    /// Whether the ask side carries a usable price and size.
    pub fn has_ask(&self) -> bool {
        self.best_ask_price > 0.0 && self.best_ask_size > 0.0
    }

    /// Whether the bid side carries a usable price and size.
    pub fn has_bid(&self) -> bool {
        self.best_bid_price > 0.0 && self.best_bid_size > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_has_no_liquidity() {
        let snap = TopOfBook::empty(
            "tok".to_string(),
            "mkt".to_string(),
            "Yes".to_string(),
        );
        assert!(!snap.has_ask());
        assert!(!snap.has_bid());
    }

    #[test]
    fn test_zero_size_ask_is_not_usable() {
        let mut snap = TopOfBook::empty(
            "tok".to_string(),
            "mkt".to_string(),
            "Yes".to_string(),
        );
        snap.best_ask_price = 0.45;
        snap.best_ask_size = 0.0;
        assert!(!snap.has_ask());

        snap.best_ask_size = 100.0;
        assert!(snap.has_ask());
    }
}
