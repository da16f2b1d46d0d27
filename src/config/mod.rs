//! Configuration Module - Environment-based Engine Configuration
//!
//! All tunables come from environment variables (with `.env` support via
//! dotenvy at startup). Defaults match production deployment values; the
//! loader validates every range before the engine starts. Nothing is
//! hardcoded in the domain layer.

pub mod loader;

use std::str::FromStr;
use std::time::Duration;

/// Top-level engine configuration.
///
/// Assembled from environment variables at startup. All fields are
/// validated before any component is constructed.
#[derive(Debug, Clone)]
pub struct AppConfig {
  /// Log level filter (trace, debug, info, warn, error).
  pub log_level: String,
  /// Bind port for the metrics/health/orderbook HTTP server.
  pub http_port: u16,
  /// Market catalog REST base URL.
  pub catalog_url: String,
  /// Market-data WebSocket URL.
  pub market_data_ws_url: String,
  /// Optional Postgres URL for the relational opportunity sink.
  pub database_url: Option<String>,
  /// Execution mode forwarded to downstream consumers.
  pub execution_mode: ExecutionMode,
  /// Market discovery loop settings.
  pub discovery: DiscoveryConfig,
  /// WebSocket subscription pool settings.
  pub ws: WsConfig,
  /// Arbitrage detection settings.
  pub arb: ArbConfig,
}

/// Market discovery loop configuration.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
  /// Interval between catalog polls.
  pub poll_interval: Duration,
  /// Maximum markets fetched per poll; 0 means unlimited.
  pub market_limit: u32,
  /// Maximum time to resolution for admitted markets; zero disables.
  pub max_market_duration: Duration,
  /// When set, track only this market slug (debugging mode).
  pub market_slug: Option<String>,
  /// Capacity of the new-markets announcement channel.
  pub new_markets_buffer_size: usize,
}

/// WebSocket subscription pool configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
  /// Number of reader connections (1-20).
  pub pool_size: usize,
  /// Timeout for establishing one connection.
  pub dial_timeout: Duration,
  /// Application-level ping cadence.
  pub ping_interval: Duration,
  /// Connection is considered dead after this long without a pong.
  pub pong_timeout: Duration,
  /// First reconnect delay.
  pub reconnect_initial_delay: Duration,
  /// Reconnect delay cap.
  pub reconnect_max_delay: Duration,
  /// Multiplier applied to the delay after each failed attempt.
  pub reconnect_backoff_multiplier: f64,
  /// Capacity of the merged message channel.
  pub message_buffer_size: usize,
}

/// Arbitrage detector configuration.
#[derive(Debug, Clone)]
pub struct ArbConfig {
  /// Opportunity fires only when the ask sum is strictly below this.
  /// May exceed 1.0 (up to 1.10) for research mode.
  pub max_price_sum: f64,
  /// Smallest notional worth emitting, in quote currency.
  pub min_trade_size: f64,
  /// Notional cap per outcome, in quote currency.
  pub max_trade_size: f64,
  /// Taker fee charged on consumed notional.
  pub taker_fee_rate: f64,
  /// Capacity of the outbound opportunity channel.
  pub opportunity_buffer_size: usize,
}

/// How detected opportunities are meant to be acted on downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
  /// Simulated fills, full pipeline.
  Paper,
  /// Real order flow (executor out of process).
  Live,
  /// Detection only, no execution side effects.
  DryRun,
}

impl FromStr for ExecutionMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "paper" => Ok(Self::Paper),
      "live" => Ok(Self::Live),
      "dry-run" | "dryrun" => Ok(Self::DryRun),
      other => Err(format!(
        "unknown execution mode '{other}', expected paper|live|dry-run"
      )),
    }
  }
}

impl std::fmt::Display for ExecutionMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Paper => write!(f, "paper"),
      Self::Live => write!(f, "live"),
      Self::DryRun => write!(f, "dry-run"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_execution_mode_parse() {
    assert_eq!("paper".parse::<ExecutionMode>().unwrap(), ExecutionMode::Paper);
    assert_eq!("LIVE".parse::<ExecutionMode>().unwrap(), ExecutionMode::Live);
    assert_eq!(
      "dry-run".parse::<ExecutionMode>().unwrap(),
      ExecutionMode::DryRun
    );
    assert!("maker".parse::<ExecutionMode>().is_err());
  }

  #[test]
  fn test_execution_mode_display_round_trip() {
    for mode in [ExecutionMode::Paper, ExecutionMode::Live, ExecutionMode::DryRun] {
      let parsed: ExecutionMode = mode.to_string().parse().unwrap();
      assert_eq!(parsed, mode);
    }
  }
}
