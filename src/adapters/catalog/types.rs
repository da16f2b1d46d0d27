//! Catalog API Types - Raw Listing DTOs and Conversions
//!
//! The catalog returns loosely-typed JSON: outcome labels and token ids
//! arrive either as real arrays or as strings containing JSON arrays,
//! numbers may be quoted, and `end_date` may be absent, zero, or RFC3339.
//! Everything is normalized here; downstream code only sees
//! `domain::Market`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::domain::market::{Market, Outcome};

/// Listing sort orders accepted by `fetch_active_markets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    /// Recent trading volume, busiest first.
    VolumeRecent,
    /// Creation time, newest first.
    Created,
    /// Resolution time, soonest first.
    EndDate,
}

impl OrderBy {
    /// Field name on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::VolumeRecent => "volume24hr",
            Self::Created => "createdAt",
            Self::EndDate => "endDate",
        }
    }

    /// Only the end-date ordering paginates ascending.
    pub fn ascending(self) -> bool {
        matches!(self, Self::EndDate)
    }
}

/// One page of converted market records.
#[derive(Debug, Clone)]
pub struct MarketsPage {
    /// Converted market records.
    pub markets: Vec<Market>,
    /// Number of records in this result.
    pub count: usize,
    /// Limit the caller requested (0 = unlimited).
    pub limit: u32,
    /// Offset the listing started from.
    pub offset: u32,
}

/// Raw market record as served by the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarket {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub active: bool,
    /// Outcome labels; array or stringified array.
    #[serde(default, deserialize_with = "flexible_string_list")]
    pub outcomes: Vec<String>,
    /// Outcome token ids; array or stringified array.
    #[serde(
        default,
        alias = "clob_token_ids",
        deserialize_with = "flexible_string_list"
    )]
    pub clob_token_ids: Vec<String>,
    /// RFC3339 resolution time; absent, empty or "0" means unknown.
    #[serde(default, alias = "end_date")]
    pub end_date: Option<String>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
}

impl RawMarket {
    /// Convert into the domain record.
    ///
    /// Returns `None` when the record has no usable identity; shape
    /// problems like too few outcomes are left for the discovery filter.
    pub fn into_market(self) -> Option<Market> {
        if self.id.is_empty() || self.slug.is_empty() {
            debug!(slug = %self.slug, "Skipping catalog record without identity");
            return None;
        }

        let outcomes = self
            .outcomes
            .iter()
            .zip(self.clob_token_ids.iter())
            .map(|(label, token_id)| Outcome {
                token_id: token_id.clone(),
                label: label.clone(),
            })
            .collect();

        Some(Market {
            id: self.id,
            slug: self.slug,
            question: self.question,
            closed: self.closed,
            active: self.active,
            end_date: parse_end_date(self.end_date.as_deref()),
            outcomes,
        })
    }
}

/// Raw per-token metadata record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenMetadata {
    #[serde(
        default,
        alias = "minimum_tick_size",
        deserialize_with = "flexible_f64"
    )]
    pub minimum_tick_size: Option<f64>,
    #[serde(
        default,
        alias = "minimum_order_size",
        deserialize_with = "flexible_f64"
    )]
    pub minimum_order_size: Option<f64>,
}

fn parse_end_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() || raw == "0" {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Accept `["a", "b"]` or `"[\"a\", \"b\"]"`.
fn flexible_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(ToOwned::to_owned))
            .collect(),
        serde_json::Value::String(text) => {
            serde_json::from_str::<Vec<String>>(&text).unwrap_or_default()
        }
        _ => Vec::new(),
    })
}

/// Accept `0.01`, `"0.01"`, or nothing.
fn flexible_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    })
}
