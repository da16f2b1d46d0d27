//! Detector Benchmarks - Evaluation Ladder Hot Path
//!
//! Measures the pure evaluation function the detector runs on every
//! top-of-book update, across outcome counts and across the emit/reject
//! paths.

use chrono::Utc;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use polymarket_arb_bot::config::ArbConfig;
use polymarket_arb_bot::domain::book::TopOfBook;
use polymarket_arb_bot::domain::market::{MarketSubscription, Outcome, TokenMetadata};
use polymarket_arb_bot::usecases::evaluate_quotes;

fn subscription(n: usize) -> MarketSubscription {
    MarketSubscription {
        market_id: "m1".to_string(),
        slug: "bench-market".to_string(),
        question: "Bench?".to_string(),
        outcomes: (0..n)
            .map(|i| Outcome {
                token_id: format!("tok-{i}"),
                label: format!("O{i}"),
            })
            .collect(),
        subscribed_at: Utc::now(),
    }
}

fn snapshots(n: usize, ask: f64) -> Vec<TopOfBook> {
    (0..n)
        .map(|i| {
            let mut snap =
                TopOfBook::empty(format!("tok-{i}"), "m1".to_string(), format!("O{i}"));
            snap.best_bid_price = ask - 0.01;
            snap.best_bid_size = 250.0;
            snap.best_ask_price = ask;
            snap.best_ask_size = 100.0 + i as f64;
            snap
        })
        .collect()
}

fn config() -> ArbConfig {
    ArbConfig {
        max_price_sum: 0.995,
        min_trade_size: 1.0,
        max_trade_size: 1000.0,
        taker_fee_rate: 0.01,
        opportunity_buffer_size: 64,
    }
}

fn bench_evaluation(c: &mut Criterion) {
    let config = config();

    let mut group = c.benchmark_group("evaluate_quotes");
    for outcome_count in [2usize, 3, 5, 8] {
        let sub = subscription(outcome_count);
        // Asks sum below threshold: the full ladder runs and emits.
        let ask = 0.90 / outcome_count as f64;
        let snaps = snapshots(outcome_count, ask);
        let metadata = vec![TokenMetadata::default(); outcome_count];

        group.bench_function(format!("emit_{outcome_count}_outcomes"), |b| {
            b.iter(|| {
                let result = evaluate_quotes(
                    black_box(&sub),
                    black_box(&snaps),
                    black_box(&metadata),
                    black_box(&config),
                );
                debug_assert!(result.is_ok());
                result
            })
        });
    }

    // The common case in production: the predicate fails fast.
    let sub = subscription(2);
    let snaps = snapshots(2, 0.51);
    let metadata = vec![TokenMetadata::default(); 2];
    group.bench_function("reject_price_above_threshold", |b| {
        b.iter(|| {
            evaluate_quotes(
                black_box(&sub),
                black_box(&snaps),
                black_box(&metadata),
                black_box(&config),
            )
        })
    });
    group.finish();
}

criterion_group!(benches, bench_evaluation);
criterion_main!(benches);
