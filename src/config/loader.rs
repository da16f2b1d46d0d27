//! Configuration Loader - Environment Parsing and Validation
//!
//! Reads every recognized environment variable, applies defaults, and
//! validates all ranges with clear error messages. Startup is the only
//! place configuration failures are surfaced; after this point the
//! engine treats its config as immutable.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, ArbConfig, DiscoveryConfig, ExecutionMode, WsConfig};

/// Load and validate configuration from the process environment.
///
/// # Errors
/// Returns a detailed error if a required variable is missing, a value
/// fails to parse, or a validation rule is violated.
pub fn load_config() -> Result<AppConfig> {
  let config = AppConfig {
    log_level: env_or("LOG_LEVEL", "info"),
    http_port: env_parse("HTTP_PORT", 8080)?,
    catalog_url: env_required("MARKET_CATALOG_URL")?,
    market_data_ws_url: env_required("MARKET_DATA_WS_URL")?,
    database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
    execution_mode: env_or("EXECUTION_MODE", "paper")
      .parse::<ExecutionMode>()
      .map_err(|e| anyhow::anyhow!(e))?,
    discovery: DiscoveryConfig {
      poll_interval: env_duration_secs("DISCOVERY_POLL_INTERVAL", 30)?,
      market_limit: env_parse("DISCOVERY_MARKET_LIMIT", 1000)?,
      max_market_duration: env_duration_secs("ARB_MAX_MARKET_DURATION", 0)?,
      market_slug: std::env::var("ARB_MARKET_SLUG").ok().filter(|v| !v.is_empty()),
      new_markets_buffer_size: env_parse("DISCOVERY_MARKET_BUFFER_SIZE", 100)?,
    },
    ws: WsConfig {
      pool_size: env_parse("WS_POOL_SIZE", 5)?,
      dial_timeout: env_duration_secs("WS_DIAL_TIMEOUT", 10)?,
      ping_interval: env_duration_secs("WS_PING_INTERVAL", 10)?,
      pong_timeout: env_duration_secs("WS_PONG_TIMEOUT", 15)?,
      reconnect_initial_delay: env_duration_secs("WS_RECONNECT_INITIAL_DELAY", 1)?,
      reconnect_max_delay: env_duration_secs("WS_RECONNECT_MAX_DELAY", 30)?,
      reconnect_backoff_multiplier: env_parse("WS_RECONNECT_BACKOFF_MULTIPLIER", 2.0)?,
      message_buffer_size: env_parse("WS_MESSAGE_BUFFER_SIZE", 1000)?,
    },
    arb: ArbConfig {
      max_price_sum: env_parse("ARB_MAX_PRICE_SUM", 0.995)?,
      min_trade_size: env_parse("ARB_MIN_TRADE_SIZE", 1.0)?,
      max_trade_size: env_parse("ARB_MAX_TRADE_SIZE", 2.0)?,
      taker_fee_rate: env_parse("ARB_TAKER_FEE", 0.01)?,
      opportunity_buffer_size: env_parse("ARB_OPPORTUNITY_BUFFER_SIZE", 1000)?,
    },
  };

  validate_config(&config)?;

  info!(
    catalog_url = %config.catalog_url,
    ws_url = %config.market_data_ws_url,
    pool_size = config.ws.pool_size,
    max_price_sum = config.arb.max_price_sum,
    mode = %config.execution_mode,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Pool size and buffer capacities within operational bounds
/// - Threshold inside (0, 1.10], including research mode above parity
/// - Sensible trade size and fee ranges
/// - Non-degenerate timing values
pub fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.catalog_url.is_empty(),
    "MARKET_CATALOG_URL must not be empty"
  );
  anyhow::ensure!(
    !config.market_data_ws_url.is_empty(),
    "MARKET_DATA_WS_URL must not be empty"
  );

  // WebSocket pool validation
  anyhow::ensure!(
    (1..=20).contains(&config.ws.pool_size),
    "WS_POOL_SIZE must be in [1, 20], got {}",
    config.ws.pool_size
  );
  anyhow::ensure!(
    config.ws.message_buffer_size > 0,
    "WS_MESSAGE_BUFFER_SIZE must be positive"
  );
  anyhow::ensure!(
    config.ws.reconnect_backoff_multiplier >= 1.0,
    "WS_RECONNECT_BACKOFF_MULTIPLIER must be >= 1.0, got {}",
    config.ws.reconnect_backoff_multiplier
  );
  anyhow::ensure!(
    config.ws.reconnect_initial_delay <= config.ws.reconnect_max_delay,
    "WS_RECONNECT_INITIAL_DELAY must not exceed WS_RECONNECT_MAX_DELAY"
  );
  anyhow::ensure!(
    !config.ws.ping_interval.is_zero() && !config.ws.pong_timeout.is_zero(),
    "WS_PING_INTERVAL and WS_PONG_TIMEOUT must be positive"
  );
  anyhow::ensure!(
    !config.ws.dial_timeout.is_zero(),
    "WS_DIAL_TIMEOUT must be positive"
  );

  // Discovery validation
  anyhow::ensure!(
    !config.discovery.poll_interval.is_zero(),
    "DISCOVERY_POLL_INTERVAL must be positive"
  );
  anyhow::ensure!(
    config.discovery.new_markets_buffer_size > 0,
    "DISCOVERY_MARKET_BUFFER_SIZE must be positive"
  );

  // Arbitrage validation. Threshold above 1.0 is legitimate (research
  // mode); reject rather than clamp anything outside (0, 1.10].
  anyhow::ensure!(
    config.arb.max_price_sum > 0.0 && config.arb.max_price_sum <= 1.10,
    "ARB_MAX_PRICE_SUM must be in (0, 1.10], got {}",
    config.arb.max_price_sum
  );
  anyhow::ensure!(
    config.arb.min_trade_size > 0.0,
    "ARB_MIN_TRADE_SIZE must be positive, got {}",
    config.arb.min_trade_size
  );
  anyhow::ensure!(
    config.arb.max_trade_size >= config.arb.min_trade_size,
    "ARB_MAX_TRADE_SIZE ({}) must be >= ARB_MIN_TRADE_SIZE ({})",
    config.arb.max_trade_size,
    config.arb.min_trade_size
  );
  anyhow::ensure!(
    (0.0..1.0).contains(&config.arb.taker_fee_rate),
    "ARB_TAKER_FEE must be in [0, 1), got {}",
    config.arb.taker_fee_rate
  );
  anyhow::ensure!(
    (1..=10_000).contains(&config.arb.opportunity_buffer_size),
    "ARB_OPPORTUNITY_BUFFER_SIZE must be in [1, 10000], got {}",
    config.arb.opportunity_buffer_size
  );

  Ok(())
}

fn env_or(key: &str, default: &str) -> String {
  std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_required(key: &str) -> Result<String> {
  let value = std::env::var(key)
    .with_context(|| format!("Required environment variable {key} is not set"))?;
  anyhow::ensure!(!value.is_empty(), "{key} must not be empty");
  Ok(value)
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match std::env::var(key) {
    Ok(raw) => raw
      .parse::<T>()
      .map_err(|e| anyhow::anyhow!("Failed to parse {key}='{raw}': {e}")),
    Err(_) => Ok(default),
  }
}

fn env_duration_secs(key: &str, default_secs: u64) -> Result<Duration> {
  Ok(Duration::from_secs(env_parse(key, default_secs)?))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn valid_config() -> AppConfig {
    AppConfig {
      log_level: "info".to_string(),
      http_port: 8080,
      catalog_url: "https://gamma-api.example.com".to_string(),
      market_data_ws_url: "wss://ws.example.com/market".to_string(),
      database_url: None,
      execution_mode: ExecutionMode::Paper,
      discovery: DiscoveryConfig {
        poll_interval: Duration::from_secs(30),
        market_limit: 1000,
        max_market_duration: Duration::ZERO,
        market_slug: None,
        new_markets_buffer_size: 100,
      },
      ws: WsConfig {
        pool_size: 5,
        dial_timeout: Duration::from_secs(10),
        ping_interval: Duration::from_secs(10),
        pong_timeout: Duration::from_secs(15),
        reconnect_initial_delay: Duration::from_secs(1),
        reconnect_max_delay: Duration::from_secs(30),
        reconnect_backoff_multiplier: 2.0,
        message_buffer_size: 1000,
      },
      arb: ArbConfig {
        max_price_sum: 0.995,
        min_trade_size: 1.0,
        max_trade_size: 2.0,
        taker_fee_rate: 0.01,
        opportunity_buffer_size: 1000,
      },
    }
  }

  #[test]
  fn test_valid_config_passes() {
    assert!(validate_config(&valid_config()).is_ok());
  }

  #[test]
  fn test_pool_size_bounds() {
    let mut config = valid_config();
    config.ws.pool_size = 0;
    assert!(validate_config(&config).is_err());
    config.ws.pool_size = 21;
    assert!(validate_config(&config).is_err());
    config.ws.pool_size = 20;
    assert!(validate_config(&config).is_ok());
  }

  #[test]
  fn test_threshold_allows_research_mode_but_not_beyond() {
    let mut config = valid_config();
    config.arb.max_price_sum = 1.05;
    assert!(validate_config(&config).is_ok());
    config.arb.max_price_sum = 1.11;
    assert!(validate_config(&config).is_err());
    config.arb.max_price_sum = 0.0;
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_trade_size_ordering_enforced() {
    let mut config = valid_config();
    config.arb.min_trade_size = 5.0;
    config.arb.max_trade_size = 2.0;
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_taker_fee_range() {
    let mut config = valid_config();
    config.arb.taker_fee_rate = 1.0;
    assert!(validate_config(&config).is_err());
    config.arb.taker_fee_rate = 0.0;
    assert!(validate_config(&config).is_ok());
  }

  #[test]
  fn test_backoff_multiplier_must_not_shrink() {
    let mut config = valid_config();
    config.ws.reconnect_backoff_multiplier = 0.5;
    assert!(validate_config(&config).is_err());
  }
}
