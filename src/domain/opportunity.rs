//! Arbitrage Opportunity Record - Immutable Detection Output
//!
//! The record emitted when the sum of best asks across all outcomes of a
//! market drops below the configured threshold with positive net profit
//! after taker fees. Also home to the executor-facing rounding rules so
//! downstream order construction and the detector agree on precision.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::market::{MarketId, TokenId};

/// Decimal places used when rounding token counts for order construction.
pub const SIZE_PRECISION: u32 = 2;

/// Ask-side quote captured for one outcome at detection time.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeQuote {
    /// Outcome label.
    pub outcome: String,
    /// Outcome token id.
    pub token_id: TokenId,
    /// Best ask price at detection time.
    pub ask_price: f64,
    /// Size available at the best ask, in tokens.
    pub ask_size: f64,
}

/// A detected cross-outcome arbitrage, immutable once emitted.
#[derive(Debug, Clone, Serialize)]
pub struct Opportunity {
    /// Fresh unique id for this emission.
    pub id: Uuid,
    /// Owning market id.
    pub market_id: MarketId,
    /// Owning market slug.
    pub market_slug: String,
    /// Market question text.
    pub market_question: String,
    /// Wall-clock detection time.
    pub detected_at: DateTime<Utc>,
    /// Per-outcome ask snapshot, in outcome order.
    pub outcomes: Vec<OutcomeQuote>,
    /// Sum of best ask prices across all outcomes.
    pub price_sum: f64,
    /// Configured detection threshold the sum was compared against.
    pub threshold: f64,
    /// Raw spread: 1 - price_sum.
    pub spread: f64,
    /// Raw spread in basis points.
    pub profit_bps: i64,
    /// Selected notional per outcome, in quote currency.
    pub trade_size: f64,
    /// Gross profit at the selected notional, before fees.
    pub gross_profit: f64,
    /// Total taker fees across all legs.
    pub total_fees: f64,
    /// Profit after fees.
    pub net_profit: f64,
    /// Net profit relative to notional, in basis points.
    pub net_profit_bps: i64,
    /// Label of the outcome whose ask size constrained the notional.
    pub bottleneck_outcome: String,
}

/// Convert a fraction into basis points, rounding to nearest.
pub fn to_bps(fraction: f64) -> i64 {
    (fraction * 10_000.0).round() as i64
}

/// Round a token count to order size precision, ties to even.
pub fn round_token_count(tokens: f64) -> f64 {
    round_half_even(tokens, SIZE_PRECISION)
}

/// Round a quote-currency amount to the precision its tick size implies,
/// ties to even.
pub fn round_quote_amount(amount: f64, amount_precision: u32) -> f64 {
    round_half_even(amount, amount_precision)
}

fn round_half_even(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_bps_rounds_to_nearest() {
        assert_eq!(to_bps(0.0304), 304);
        assert_eq!(to_bps(0.03), 300);
        assert_eq!(to_bps(0.00005), 1);
        assert_eq!(to_bps(0.0), 0);
    }

    #[test]
    fn test_token_count_half_even() {
        // 0.125 and 0.375 are exactly representable; both scale to a .5 tie.
        assert_eq!(round_token_count(0.125), 0.12);
        assert_eq!(round_token_count(0.375), 0.38);
        assert_eq!(round_token_count(10.114), 10.11);
        assert_eq!(round_token_count(10.116), 10.12);
    }

    #[test]
    fn test_quote_amount_precision_follows_tick() {
        // 0.03125 = 1/32, so 0.03125 * 10^4 = 312.5 exactly: ties to 312.
        assert_eq!(round_quote_amount(0.03125, 4), 0.0312);
        // At 3 decimal places the same amount rounds normally.
        assert_eq!(round_quote_amount(0.03125, 3), 0.031);
        assert_eq!(round_quote_amount(0.123_456, 4), 0.1235);
        assert_eq!(round_quote_amount(0.123_456, 6), 0.123_456);
    }
}
