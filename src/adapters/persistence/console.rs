//! Console Sink - Human-Scannable Opportunity Printer
//!
//! Writes a pretty multi-line block per opportunity to stdout. Meant for
//! interactive runs and paper mode; production deployments wire the
//! Postgres sink instead.

use async_trait::async_trait;

use crate::domain::opportunity::Opportunity;
use crate::ports::opportunity_sink::OpportunitySink;

/// Opportunity sink that pretty-prints to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }

    fn render(opportunity: &Opportunity) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "\n=== ARBITRAGE OPPORTUNITY {} ===\n",
            opportunity.id
        ));
        out.push_str(&format!(
            "market:    {} ({})\n",
            opportunity.market_slug, opportunity.market_id
        ));
        out.push_str(&format!("question:  {}\n", opportunity.market_question));
        out.push_str(&format!("detected:  {}\n", opportunity.detected_at));
        for quote in &opportunity.outcomes {
            out.push_str(&format!(
                "  {:<24} ask {:.4} x {:.2}\n",
                quote.outcome, quote.ask_price, quote.ask_size
            ));
        }
        out.push_str(&format!(
            "price sum: {:.4} (threshold {:.4}, spread {} bps)\n",
            opportunity.price_sum, opportunity.threshold, opportunity.profit_bps
        ));
        out.push_str(&format!(
            "size:      {:.2} per outcome (bottleneck: {})\n",
            opportunity.trade_size, opportunity.bottleneck_outcome
        ));
        out.push_str(&format!(
            "profit:    gross {:.4}, fees {:.4}, net {:.4} ({} bps)\n",
            opportunity.gross_profit,
            opportunity.total_fees,
            opportunity.net_profit,
            opportunity.net_profit_bps
        ));
        out
    }
}

#[async_trait]
impl OpportunitySink for ConsoleSink {
    async fn store(&self, opportunity: &Opportunity) -> anyhow::Result<()> {
        println!("{}", Self::render(opportunity));
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
