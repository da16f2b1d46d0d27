//! Market Data Feed Adapters - WebSocket Subscription Pool
//!
//! Streams top-of-book events from the venue's market-data endpoint:
//! - `messages`: wire frames and tagged event decoding
//! - `connection`: one reader actor with reconnect/backoff/ping-pong
//! - `pool`: fixed-size connection pool with a merged message stream

pub mod connection;
pub mod messages;
pub mod pool;

pub use connection::{ConnectionCommand, ConnectionState, WsConnection};
pub use messages::{BookEvent, FeedEvent, LevelChange, PriceChangeEvent, PriceLevel, Side};
pub use pool::SubscriptionPool;
