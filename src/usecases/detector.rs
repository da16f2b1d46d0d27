//! Arbitrage Detector - Event-Driven Cross-Outcome Evaluation
//!
//! Driven entirely by top-of-book update events; there is no timer scan.
//! Each update locates its market through the reverse index, gathers the
//! sibling snapshots, and runs the evaluation ladder: input validation,
//! the strict price-sum predicate, bottleneck sizing, venue size
//! constraints, and fee-aware profit. Every failure is a counted
//! rejection; the detector itself never errors.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::catalog::MetadataCache;
use crate::adapters::metrics::MetricsRegistry;
use crate::config::ArbConfig;
use crate::domain::book::TopOfBook;
use crate::domain::market::{MarketSubscription, TokenMetadata};
use crate::domain::opportunity::{Opportunity, OutcomeQuote, to_bps};
use crate::ports::opportunity_sink::OpportunitySink;
use crate::usecases::orderbook::OrderbookManager;
use crate::usecases::registry::MarketRegistry;

/// Slack for floating-point comparisons against venue minimums.
const SIZE_EPSILON: f64 = 1e-9;

/// Why an evaluation stopped short of emitting an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Update for a token with no reverse-index entry; dropped quietly.
    TokenNotTracked,
    /// At least one sibling outcome has never received a snapshot.
    MissingSnapshots,
    /// An outcome's best ask price was zero or negative.
    InvalidPrice,
    /// An outcome's best ask size was zero or negative.
    InvalidSize,
    /// Sum of asks was at or above the configured threshold.
    PriceAboveThreshold,
    /// Bottleneck notional fell below the configured minimum.
    BelowMinSize,
    /// An implied token count fell below the venue minimum order size.
    BelowMarketMin,
    /// Fees consumed the entire spread.
    NegativeProfitAfterFees,
}

impl RejectReason {
    /// Stable label used on the rejection counter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TokenNotTracked => "token_not_tracked",
            Self::MissingSnapshots => "missing_snapshots",
            Self::InvalidPrice => "invalid_price",
            Self::InvalidSize => "invalid_size",
            Self::PriceAboveThreshold => "price_above_threshold",
            Self::BelowMinSize => "below_min_size",
            Self::BelowMarketMin => "below_market_min",
            Self::NegativeProfitAfterFees => "negative_profit_after_fees",
        }
    }
}

/// Event-driven cross-outcome arbitrage detector.
pub struct ArbDetector {
    registry: Arc<MarketRegistry>,
    books: Arc<OrderbookManager>,
    metadata: Arc<MetadataCache>,
    sink: Arc<dyn OpportunitySink>,
    metrics: Arc<MetricsRegistry>,
    config: ArbConfig,
    opportunities_tx: mpsc::Sender<Opportunity>,
    opportunities_rx: Mutex<Option<mpsc::Receiver<Opportunity>>>,
}

impl ArbDetector {
    pub fn new(
        registry: Arc<MarketRegistry>,
        books: Arc<OrderbookManager>,
        metadata: Arc<MetadataCache>,
        sink: Arc<dyn OpportunitySink>,
        metrics: Arc<MetricsRegistry>,
        config: ArbConfig,
    ) -> Self {
        let (opportunities_tx, opportunities_rx) =
            mpsc::channel(config.opportunity_buffer_size);
        Self {
            registry,
            books,
            metadata,
            sink,
            metrics,
            config,
            opportunities_tx,
            opportunities_rx: Mutex::new(Some(opportunities_rx)),
        }
    }

    /// Take the outbound opportunity stream. Single consumer.
    pub fn take_opportunities(&self) -> Option<mpsc::Receiver<Opportunity>> {
        self.opportunities_rx.lock().take()
    }

    /// Evaluation loop: one update in, at most one opportunity out.
    pub async fn run(
        &self,
        mut updates_rx: mpsc::Receiver<TopOfBook>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!(
            threshold = self.config.max_price_sum,
            taker_fee = self.config.taker_fee_rate,
            "Arbitrage detector started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                update = updates_rx.recv() => match update {
                    Some(update) => self.process_update(update).await,
                    None => break,
                },
            }
        }
        info!("Arbitrage detector stopped");
    }

    /// Evaluate one update; emissions and rejections both end here.
    pub async fn process_update(&self, update: TopOfBook) {
        let started = Instant::now();

        match self.evaluate(&update).await {
            Ok(opportunity) => self.publish(opportunity).await,
            Err(reason) => {
                self.metrics
                    .rejections_total
                    .with_label_values(&[reason.as_str()])
                    .inc();
            }
        }

        self.metrics
            .detection_duration_seconds
            .observe(started.elapsed().as_secs_f64());
    }

    async fn evaluate(&self, update: &TopOfBook) -> Result<Opportunity, RejectReason> {
        // Step 1: locate the owning market. O(1) through the reverse
        // index; updates for unknown tokens are dropped without noise.
        let Some((subscription, _outcome_index)) =
            self.registry.get_market_by_token_id(&update.token_id)
        else {
            return Err(RejectReason::TokenNotTracked);
        };

        // Step 2: gather every sibling snapshot. A missing one defers
        // evaluation until all outcomes have reported at least once.
        let mut snapshots = Vec::with_capacity(subscription.outcomes.len());
        for outcome in &subscription.outcomes {
            match self.books.get_snapshot(&outcome.token_id) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(_) => return Err(RejectReason::MissingSnapshots),
            }
        }

        // End-to-end latency is measured from the freshest snapshot: the
        // market is only as stale as its newest update.
        if let Some(newest) = snapshots.iter().map(|s| s.last_updated).max() {
            self.metrics
                .detection_latency_seconds
                .observe(newest.elapsed().as_secs_f64());
        }

        // Steps 3-5 run before any metadata I/O so a market that fails
        // the price predicate costs nothing.
        validate_and_size(&snapshots, &self.config)?;

        let mut metadata = Vec::with_capacity(snapshots.len());
        for snapshot in &snapshots {
            metadata.push(self.metadata.get(&snapshot.token_id).await);
        }

        evaluate_quotes(&subscription, &snapshots, &metadata, &self.config)
    }

    async fn publish(&self, opportunity: Opportunity) {
        self.metrics.opportunities_total.inc();
        self.metrics
            .opportunity_profit_bps
            .observe(opportunity.profit_bps as f64);
        self.metrics
            .opportunity_net_profit_bps
            .observe(opportunity.net_profit_bps as f64);

        debug!(
            market = %opportunity.market_slug,
            price_sum = opportunity.price_sum,
            net_bps = opportunity.net_profit_bps,
            size = opportunity.trade_size,
            "Opportunity detected"
        );

        if let Err(e) = self.sink.store(&opportunity).await {
            warn!(error = %e, id = %opportunity.id, "Opportunity sink store failed");
        }

        if self.opportunities_tx.try_send(opportunity).is_err() {
            self.metrics
                .buffer_overflow_total
                .with_label_values(&["opportunities"])
                .inc();
        }
    }
}

/// Steps 3-5: validate ask inputs, apply the strict price predicate, and
/// pick the bottleneck notional.
fn validate_and_size(
    snapshots: &[TopOfBook],
    config: &ArbConfig,
) -> Result<(f64, f64, usize), RejectReason> {
    for snapshot in snapshots {
        if snapshot.best_ask_price <= 0.0 {
            return Err(RejectReason::InvalidPrice);
        }
        if snapshot.best_ask_size <= 0.0 {
            return Err(RejectReason::InvalidSize);
        }
    }

    let price_sum: f64 = snapshots.iter().map(|s| s.best_ask_price).sum();
    // Strict inequality: a sum exactly at the threshold is not an edge.
    if price_sum >= config.max_price_sum {
        return Err(RejectReason::PriceAboveThreshold);
    }

    // The same quote-currency notional is spent on every outcome, so the
    // smallest ask size is the bottleneck.
    let mut bottleneck_index = 0;
    let mut candidate = f64::INFINITY;
    for (index, snapshot) in snapshots.iter().enumerate() {
        if snapshot.best_ask_size < candidate {
            candidate = snapshot.best_ask_size;
            bottleneck_index = index;
        }
    }

    let candidate = candidate.min(config.max_trade_size);
    if candidate < config.min_trade_size {
        return Err(RejectReason::BelowMinSize);
    }

    Ok((price_sum, candidate, bottleneck_index))
}

/// Steps 3-7 over gathered snapshots and metadata: the full evaluation
/// ladder as a pure function. The detector's async path calls this after
/// prefetching metadata; tests and benches call it directly.
pub fn evaluate_quotes(
    subscription: &MarketSubscription,
    snapshots: &[TopOfBook],
    metadata: &[TokenMetadata],
    config: &ArbConfig,
) -> Result<Opportunity, RejectReason> {
    let (price_sum, mut notional, bottleneck_index) =
        validate_and_size(snapshots, config)?;

    // Step 6: venue constraints. The largest per-outcome minimum
    // notional may raise the trade size; raising keeps every leg at the
    // same quote amount, so the arbitrage invariant survives.
    let mut required_notional: f64 = 0.0;
    for (snapshot, meta) in snapshots.iter().zip(metadata) {
        required_notional =
            required_notional.max(meta.min_order_size * snapshot.best_ask_price);
    }
    if notional < required_notional {
        notional = required_notional;
    }

    for (snapshot, meta) in snapshots.iter().zip(metadata) {
        let implied_tokens = notional / snapshot.best_ask_price;
        if implied_tokens + SIZE_EPSILON < meta.min_order_size {
            return Err(RejectReason::BelowMarketMin);
        }
    }

    // Step 7: fee-aware profit. Fees accrue on consumed notional.
    let spread = 1.0 - price_sum;
    let gross_profit = spread * notional;
    let total_fees = price_sum * notional * config.taker_fee_rate;
    let net_profit = gross_profit - total_fees;
    if net_profit <= 0.0 {
        return Err(RejectReason::NegativeProfitAfterFees);
    }

    let outcomes = snapshots
        .iter()
        .map(|s| OutcomeQuote {
            outcome: s.outcome.clone(),
            token_id: s.token_id.clone(),
            ask_price: s.best_ask_price,
            ask_size: s.best_ask_size,
        })
        .collect();

    Ok(Opportunity {
        id: Uuid::new_v4(),
        market_id: subscription.market_id.clone(),
        market_slug: subscription.slug.clone(),
        market_question: subscription.question.clone(),
        detected_at: Utc::now(),
        outcomes,
        price_sum,
        threshold: config.max_price_sum,
        spread,
        profit_bps: to_bps(spread),
        trade_size: notional,
        gross_profit,
        total_fees,
        net_profit,
        net_profit_bps: to_bps(net_profit / notional),
        bottleneck_outcome: snapshots[bottleneck_index].outcome.clone(),
    })
}
