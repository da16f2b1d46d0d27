//! Opportunity Sink Port - Persistence Boundary for Detections
//!
//! The detector hands every emitted opportunity to this trait and is
//! oblivious to what sits behind it (console, Postgres, a broadcast
//! relay). Implementations must tolerate duplicate stores: the detector
//! does not debounce rapid re-emissions.

use async_trait::async_trait;

use crate::domain::opportunity::Opportunity;

/// Consumer of emitted arbitrage opportunities.
#[async_trait]
pub trait OpportunitySink: Send + Sync + 'static {
    /// Persist or forward one opportunity.
    ///
    /// Must be safe to call with duplicates; errors are logged and
    /// counted by the detector, never fatal.
    async fn store(&self, opportunity: &Opportunity) -> anyhow::Result<()>;

    /// Flush and release resources at shutdown.
    async fn close(&self) -> anyhow::Result<()>;
}
