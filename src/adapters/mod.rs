//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Concrete implementations over external dependencies (HTTP, WebSocket,
//! Postgres, Prometheus). Each sub-module groups adapters by
//! infrastructure concern.
//!
//! Adapter categories:
//! - `catalog`: market catalog REST client and token metadata cache
//! - `feeds`: market-data WebSocket subscription pool
//! - `metrics`: Prometheus registry and the engine HTTP server
//! - `persistence`: opportunity sinks (console, Postgres)

pub mod catalog;
pub mod feeds;
pub mod metrics;
pub mod persistence;
