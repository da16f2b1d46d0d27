//! Postgres Sink - Relational Opportunity Store
//!
//! Maps opportunity records onto a fixed `opportunities` table. The
//! schema is created on connect if missing; inserts are idempotent on
//! the opportunity id so duplicate stores after reconnects are harmless.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use crate::domain::opportunity::Opportunity;
use crate::ports::opportunity_sink::OpportunitySink;

const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS opportunities (
    id UUID PRIMARY KEY,
    market_id TEXT NOT NULL,
    market_slug TEXT NOT NULL,
    market_question TEXT NOT NULL,
    detected_at TIMESTAMPTZ NOT NULL,
    first_ask_price DOUBLE PRECISION NOT NULL,
    first_ask_size DOUBLE PRECISION NOT NULL,
    second_ask_price DOUBLE PRECISION NOT NULL,
    second_ask_size DOUBLE PRECISION NOT NULL,
    price_sum DOUBLE PRECISION NOT NULL,
    profit_margin DOUBLE PRECISION NOT NULL,
    profit_bps BIGINT NOT NULL,
    max_trade_size DOUBLE PRECISION NOT NULL,
    estimated_profit DOUBLE PRECISION NOT NULL,
    total_fees DOUBLE PRECISION NOT NULL,
    net_profit DOUBLE PRECISION NOT NULL,
    net_profit_bps BIGINT NOT NULL,
    config_threshold DOUBLE PRECISION NOT NULL
)";

const INSERT_OPPORTUNITY: &str = r"
INSERT INTO opportunities (
    id, market_id, market_slug, market_question, detected_at,
    first_ask_price, first_ask_size, second_ask_price, second_ask_size,
    price_sum, profit_margin, profit_bps, max_trade_size,
    estimated_profit, total_fees, net_profit, net_profit_bps,
    config_threshold
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
ON CONFLICT (id) DO NOTHING";

/// Opportunity sink backed by a Postgres table.
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    /// Connect and ensure the opportunities table exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to opportunities database")?;

        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .context("Failed to create opportunities table")?;

        info!("Opportunity store connected");
        Ok(Self { pool })
    }
}

#[async_trait]
impl OpportunitySink for PostgresSink {
    async fn store(&self, opportunity: &Opportunity) -> Result<()> {
        // The fixed schema carries the first two outcome legs; the full
        // per-outcome detail stays on the in-process record.
        let first = opportunity.outcomes.first();
        let second = opportunity.outcomes.get(1);

        sqlx::query(INSERT_OPPORTUNITY)
            .bind(opportunity.id)
            .bind(&opportunity.market_id)
            .bind(&opportunity.market_slug)
            .bind(&opportunity.market_question)
            .bind(opportunity.detected_at)
            .bind(first.map_or(0.0, |q| q.ask_price))
            .bind(first.map_or(0.0, |q| q.ask_size))
            .bind(second.map_or(0.0, |q| q.ask_price))
            .bind(second.map_or(0.0, |q| q.ask_size))
            .bind(opportunity.price_sum)
            .bind(opportunity.spread)
            .bind(opportunity.profit_bps)
            .bind(opportunity.trade_size)
            .bind(opportunity.gross_profit)
            .bind(opportunity.total_fees)
            .bind(opportunity.net_profit)
            .bind(opportunity.net_profit_bps)
            .bind(opportunity.threshold)
            .execute(&self.pool)
            .await
            .context("Failed to insert opportunity")?;

        debug!(id = %opportunity.id, slug = %opportunity.market_slug, "Opportunity stored");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
