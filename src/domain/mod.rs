//! Domain layer - Core business types for arbitrage detection.
//!
//! Pure data and arithmetic only: markets and outcomes, top-of-book
//! snapshots, and the opportunity record with its rounding rules. No
//! transport or persistence dependencies here (hexagonal inner ring).

pub mod book;
pub mod market;
pub mod opportunity;

// Re-export core types for convenience
pub use book::TopOfBook;
pub use market::{
    DEFAULT_MIN_ORDER_SIZE, DEFAULT_TICK_SIZE, Market, MarketId, MarketSubscription, Outcome,
    TokenId, TokenMetadata,
};
pub use opportunity::{Opportunity, OutcomeQuote, to_bps};
