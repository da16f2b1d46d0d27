//! Market-Data Wire Messages - Frames and Event Decoding
//!
//! The venue speaks JSON text frames: the client sends a subscribe frame
//! carrying token ids, the server pushes events keyed by `event_type`.
//! A text frame may carry a single event or an array of events. Dynamic
//! shapes (levels as `{price,size}` objects or `[price, size]` pairs,
//! string-or-number timestamps) are normalized here so downstream code
//! only ever sees typed records.

use serde::Deserialize;

use crate::domain::market::TokenId;
use crate::error::EngineError;

/// Build the venue subscribe frame for a batch of token ids.
pub fn subscribe_frame(token_ids: &[TokenId]) -> String {
    serde_json::json!({
        "assets_ids": token_ids,
        "type": "market",
    })
    .to_string()
}

/// Build the venue unsubscribe frame for a batch of token ids.
pub fn unsubscribe_frame(token_ids: &[TokenId]) -> String {
    serde_json::json!({
        "assets_ids": token_ids,
        "operation": "unsubscribe",
    })
    .to_string()
}

/// One price level: price and total size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub size: f64,
}

/// Which side of the book a price-change touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// Full top-of-book replacement for one token.
#[derive(Debug, Clone)]
pub struct BookEvent {
    /// Outcome token the book belongs to.
    pub asset_id: TokenId,
    /// Bid levels, best first.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best first.
    pub asks: Vec<PriceLevel>,
    /// Server timestamp (Unix ms); 0 when absent.
    pub timestamp_ms: u64,
}

/// Incremental update to the best level(s) of one token.
#[derive(Debug, Clone)]
pub struct PriceChangeEvent {
    /// Outcome token the change belongs to.
    pub asset_id: TokenId,
    /// Changed levels with their side.
    pub changes: Vec<LevelChange>,
    /// Server timestamp (Unix ms); 0 when absent.
    pub timestamp_ms: u64,
}

/// A single changed level inside a `price_change` event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelChange {
    pub side: Side,
    pub price: f64,
    pub size: f64,
}

/// A decoded market-data event relevant to top-of-book tracking.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Book(BookEvent),
    PriceChange(PriceChangeEvent),
}

impl FeedEvent {
    /// Token the event applies to.
    pub fn asset_id(&self) -> &str {
        match self {
            Self::Book(e) => &e.asset_id,
            Self::PriceChange(e) => &e.asset_id,
        }
    }

    /// Wire name of the event kind, for metrics labels.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Book(_) => "book",
            Self::PriceChange(_) => "price_change",
        }
    }
}

/// Result of decoding one text frame.
#[derive(Debug, Default)]
pub struct ParsedFrame {
    /// Events usable for top-of-book tracking, in frame order.
    pub events: Vec<FeedEvent>,
    /// Events of kinds we do not track (trades, tick-size changes, ...).
    pub ignored: usize,
}

/// Levels arrive either as `{"price": "...", "size": "..."}` objects or
/// as `["price", "size"]` pairs depending on the feed version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLevel {
    Object { price: String, size: String },
    Pair(Vec<String>),
}

impl RawLevel {
    fn to_level(&self) -> Option<PriceLevel> {
        let (price, size) = match self {
            Self::Object { price, size } => (price.as_str(), size.as_str()),
            Self::Pair(pair) => (pair.first()?.as_str(), pair.get(1)?.as_str()),
        };
        Some(PriceLevel {
            price: price.parse().ok()?,
            size: size.parse().ok()?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(u64),
    Text(String),
}

impl RawTimestamp {
    fn as_millis(&self) -> u64 {
        match self {
            Self::Millis(ms) => *ms,
            Self::Text(s) => s.parse().unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawChange {
    #[serde(default)]
    price: String,
    #[serde(default)]
    size: String,
    #[serde(default)]
    side: String,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    event_type: String,
    #[serde(default)]
    asset_id: String,
    #[serde(default)]
    bids: Vec<RawLevel>,
    #[serde(default)]
    asks: Vec<RawLevel>,
    #[serde(default)]
    changes: Vec<RawChange>,
    timestamp: Option<RawTimestamp>,
}

/// Decode one text frame into its trackable events.
///
/// # Errors
/// `EngineError::Decode` when the frame is not valid JSON or not an
/// event shape at all. Unknown event kinds inside a valid frame are not
/// errors; they land in `ParsedFrame::ignored`.
pub fn parse_frame(text: &str) -> Result<ParsedFrame, EngineError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| EngineError::Decode(format!("invalid frame JSON: {e}")))?;

    let raw_events: Vec<RawEvent> = if value.is_array() {
        serde_json::from_value(value)
            .map_err(|e| EngineError::Decode(format!("invalid event array: {e}")))?
    } else {
        vec![
            serde_json::from_value(value)
                .map_err(|e| EngineError::Decode(format!("invalid event object: {e}")))?,
        ]
    };

    let mut parsed = ParsedFrame::default();
    for raw in raw_events {
        match convert_event(raw) {
            Some(event) => parsed.events.push(event),
            None => parsed.ignored += 1,
        }
    }
    Ok(parsed)
}

fn convert_event(raw: RawEvent) -> Option<FeedEvent> {
    if raw.asset_id.is_empty() {
        return None;
    }
    let timestamp_ms = raw.timestamp.as_ref().map_or(0, RawTimestamp::as_millis);

    match raw.event_type.as_str() {
        "book" => Some(FeedEvent::Book(BookEvent {
            asset_id: raw.asset_id,
            bids: raw.bids.iter().filter_map(RawLevel::to_level).collect(),
            asks: raw.asks.iter().filter_map(RawLevel::to_level).collect(),
            timestamp_ms,
        })),
        "price_change" => {
            let changes = raw
                .changes
                .iter()
                .filter_map(|c| {
                    let side = match c.side.to_ascii_uppercase().as_str() {
                        "BUY" | "BID" => Side::Buy,
                        "SELL" | "ASK" => Side::Sell,
                        _ => return None,
                    };
                    Some(LevelChange {
                        side,
                        price: c.price.parse().ok()?,
                        size: c.size.parse().ok()?,
                    })
                })
                .collect();
            Some(FeedEvent::PriceChange(PriceChangeEvent {
                asset_id: raw.asset_id,
                changes,
                timestamp_ms,
            }))
        }
        _ => None,
    }
}
