//! Engine Error Types - Categorical Failure Kinds
//!
//! Every component-boundary failure maps to one of these kinds so callers
//! can route it: "count and continue" (detector, discovery) or "surface"
//! (startup validation). Adapters keep `anyhow` internally and convert at
//! their public edge.

use thiserror::Error;

/// Categorical error kinds shared across the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Network or HTTP-level failure (connect, timeout, non-2xx status).
    #[error("transport error: {0}")]
    Transport(String),

    /// Payload received but could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// The requested market, slug, or token is not known.
    #[error("not found: {0}")]
    NotFound(String),

    /// Input rejected by validation before any I/O happened.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A bounded channel was full when a producer needed to enqueue.
    #[error("buffer overflow on channel {0}")]
    BufferOverflow(&'static str),

    /// A message was dropped deliberately to protect the hot path.
    #[error("backpressure drop on channel {0}")]
    BackpressureDrop(&'static str),

    /// The operation was interrupted by shutdown.
    #[error("cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Convenience alias used at component boundaries.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_kind() {
        let err = EngineError::NotFound("slug=does-not-exist".to_string());
        assert!(err.to_string().contains("not found"));

        let err = EngineError::BufferOverflow("orderbook_updates");
        assert!(err.to_string().contains("orderbook_updates"));
    }
}
