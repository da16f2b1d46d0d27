//! Metrics and Monitoring Adapters
//!
//! Prometheus metrics for every pipeline stage plus the engine HTTP
//! server exposing `/metrics`, `/health`, `/ready`, and the read-only
//! `/api/orderbook` endpoint via axum 0.7.

pub mod prometheus;
pub mod server;

pub use prometheus::MetricsRegistry;
pub use server::{HttpServer, ServerState};
