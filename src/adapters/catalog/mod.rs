//! Market Catalog Adapters - REST Listing and Token Metadata
//!
//! HTTP access to the market catalog: paginated listings, slug lookup,
//! and the TTL'd single-flight metadata cache the detector consults for
//! sizing constraints.

pub mod client;
pub mod metadata;
pub mod types;

pub use client::CatalogClient;
pub use metadata::MetadataCache;
pub use types::{MarketsPage, OrderBy, RawMarket};
