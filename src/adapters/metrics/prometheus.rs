//! Prometheus Metrics Registry - Pipeline Observability
//!
//! Registers and exposes Prometheus metrics for every pipeline stage:
//! detection latency and duration, per-reason rejection counters, WebSocket
//! reconnects and drops, discovery poll health, and tracked-market gauges.
//! Metrics are the authoritative runtime signal; logs are secondary.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Centralized Prometheus metrics for the arbitrage engine.
///
/// All metrics follow the naming convention `arb_engine_*`. Vec metrics
/// carry a `reason`, `channel`, `connection` or `event_type` label.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// End-to-end latency from venue update to evaluation (seconds).
    pub detection_latency_seconds: Histogram,
    /// Time spent inside a single detector evaluation (seconds).
    pub detection_duration_seconds: Histogram,
    /// Evaluations rejected, by categorical reason.
    pub rejections_total: IntCounterVec,
    /// Opportunities emitted.
    pub opportunities_total: IntCounter,
    /// Raw spread of emitted opportunities (basis points).
    pub opportunity_profit_bps: Histogram,
    /// Net profit after fees of emitted opportunities (basis points).
    pub opportunity_net_profit_bps: Histogram,
    /// WebSocket reconnect attempts, by connection index.
    pub ws_reconnects_total: IntCounterVec,
    /// Parsed feed messages, by event type.
    pub ws_messages_total: IntCounterVec,
    /// Feed frames that failed to decode.
    pub ws_decode_errors_total: IntCounter,
    /// Per-connection state code (0=dialing .. 7=closed).
    pub ws_connection_state: IntGaugeVec,
    /// Messages dropped because a bounded channel was full, by channel.
    pub buffer_overflow_total: IntCounterVec,
    /// Discovery polls completed successfully.
    pub discovery_polls_total: IntCounter,
    /// Discovery polls that failed and were skipped.
    pub discovery_poll_failures_total: IntCounter,
    /// Wall time of one discovery poll (seconds).
    pub discovery_poll_duration_seconds: Histogram,
    /// Markets filtered out during admission, by reason.
    pub markets_filtered_total: IntCounterVec,
    /// Currently tracked markets.
    pub markets_tracked: IntGauge,
    /// Token metadata lookups that fell back to defaults.
    pub metadata_errors_total: IntCounter,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let detection_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "arb_engine_detection_latency_seconds",
                "Latency from newest venue update to evaluation",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;

        let detection_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "arb_engine_detection_duration_seconds",
                "Time spent evaluating a single top-of-book update",
            )
            .buckets(vec![
                0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05,
            ]),
        )?;

        let rejections_total = IntCounterVec::new(
            Opts::new(
                "arb_engine_rejections_total",
                "Evaluations rejected before emission, by reason",
            ),
            &["reason"],
        )?;

        let opportunities_total = IntCounter::new(
            "arb_engine_opportunities_total",
            "Arbitrage opportunities emitted",
        )?;

        let opportunity_profit_bps = Histogram::with_opts(
            HistogramOpts::new(
                "arb_engine_opportunity_profit_bps",
                "Raw spread of emitted opportunities in basis points",
            )
            .buckets(vec![10.0, 25.0, 50.0, 100.0, 200.0, 400.0, 800.0, 1600.0]),
        )?;

        let opportunity_net_profit_bps = Histogram::with_opts(
            HistogramOpts::new(
                "arb_engine_opportunity_net_profit_bps",
                "Net profit after fees in basis points",
            )
            .buckets(vec![10.0, 25.0, 50.0, 100.0, 200.0, 400.0, 800.0, 1600.0]),
        )?;

        let ws_reconnects_total = IntCounterVec::new(
            Opts::new(
                "arb_engine_ws_reconnects_total",
                "WebSocket reconnect attempts",
            ),
            &["connection"],
        )?;

        let ws_messages_total = IntCounterVec::new(
            Opts::new(
                "arb_engine_ws_messages_total",
                "Parsed market-data messages",
            ),
            &["event_type"],
        )?;

        let ws_decode_errors_total = IntCounter::new(
            "arb_engine_ws_decode_errors_total",
            "Market-data frames dropped as malformed",
        )?;

        let ws_connection_state = IntGaugeVec::new(
            Opts::new(
                "arb_engine_ws_connection_state",
                "Connection state code (0=dialing 3=healthy 6=reconnecting 7=closed)",
            ),
            &["connection"],
        )?;

        let buffer_overflow_total = IntCounterVec::new(
            Opts::new(
                "arb_engine_buffer_overflow_total",
                "Messages dropped on full bounded channels",
            ),
            &["channel"],
        )?;

        let discovery_polls_total = IntCounter::new(
            "arb_engine_discovery_polls_total",
            "Successful discovery polls",
        )?;

        let discovery_poll_failures_total = IntCounter::new(
            "arb_engine_discovery_poll_failures_total",
            "Discovery polls that failed",
        )?;

        let discovery_poll_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "arb_engine_discovery_poll_duration_seconds",
                "Wall time of one discovery poll",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        let markets_filtered_total = IntCounterVec::new(
            Opts::new(
                "arb_engine_markets_filtered_total",
                "Markets rejected during admission, by reason",
            ),
            &["reason"],
        )?;

        let markets_tracked = IntGauge::new(
            "arb_engine_markets_tracked",
            "Markets currently tracked for detection",
        )?;

        let metadata_errors_total = IntCounter::new(
            "arb_engine_metadata_errors_total",
            "Token metadata fetches that fell back to defaults",
        )?;

        registry.register(Box::new(detection_latency_seconds.clone()))?;
        registry.register(Box::new(detection_duration_seconds.clone()))?;
        registry.register(Box::new(rejections_total.clone()))?;
        registry.register(Box::new(opportunities_total.clone()))?;
        registry.register(Box::new(opportunity_profit_bps.clone()))?;
        registry.register(Box::new(opportunity_net_profit_bps.clone()))?;
        registry.register(Box::new(ws_reconnects_total.clone()))?;
        registry.register(Box::new(ws_messages_total.clone()))?;
        registry.register(Box::new(ws_decode_errors_total.clone()))?;
        registry.register(Box::new(ws_connection_state.clone()))?;
        registry.register(Box::new(buffer_overflow_total.clone()))?;
        registry.register(Box::new(discovery_polls_total.clone()))?;
        registry.register(Box::new(discovery_poll_failures_total.clone()))?;
        registry.register(Box::new(discovery_poll_duration_seconds.clone()))?;
        registry.register(Box::new(markets_filtered_total.clone()))?;
        registry.register(Box::new(markets_tracked.clone()))?;
        registry.register(Box::new(metadata_errors_total.clone()))?;

        Ok(Self {
            registry,
            detection_latency_seconds,
            detection_duration_seconds,
            rejections_total,
            opportunities_total,
            opportunity_profit_bps,
            opportunity_net_profit_bps,
            ws_reconnects_total,
            ws_messages_total,
            ws_decode_errors_total,
            ws_connection_state,
            buffer_overflow_total,
            discovery_polls_total,
            discovery_poll_failures_total,
            discovery_poll_duration_seconds,
            markets_filtered_total,
            markets_tracked,
            metadata_errors_total,
        })
    }

    /// Render the registry in the Prometheus exposition format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds_and_encodes() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.opportunities_total.inc();
        metrics
            .rejections_total
            .with_label_values(&["price_above_threshold"])
            .inc();

        let exposition = metrics.encode();
        assert!(exposition.contains("arb_engine_opportunities_total 1"));
        assert!(exposition.contains("price_above_threshold"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        // Each engine instance owns its registry; a second build is fine.
        assert!(MetricsRegistry::new().is_ok());
        assert!(MetricsRegistry::new().is_ok());
    }
}
