//! WebSocket Connection Actor - One Reader of the Market-Data Feed
//!
//! Each actor owns a subset of the pool's token subscriptions and keeps
//! one framed connection alive forever: dial with timeout, replay the
//! subscription set, then stream until an I/O error or a missed pong
//! forces a reconnect with full-jitter exponential backoff. Messages are
//! forwarded into the pool's merged channel without blocking; the channel
//! drops on overflow.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::adapters::feeds::messages::{self, FeedEvent};
use crate::adapters::metrics::MetricsRegistry;
use crate::config::WsConfig;
use crate::domain::market::TokenId;

/// Lifecycle of a single feed connection.
///
/// `DIALING -> CONNECTED -> SUBSCRIBED -> HEALTHY <-> DEGRADED`; any live
/// state falls into `RECONNECTING` on error, `CLOSING -> CLOSED` on
/// shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Dialing,
    Connected,
    Subscribed,
    Healthy,
    Degraded,
    Reconnecting,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Numeric code exported on the state gauge.
    pub fn code(self) -> i64 {
        match self {
            Self::Dialing => 0,
            Self::Connected => 1,
            Self::Subscribed => 2,
            Self::Healthy => 3,
            Self::Degraded => 4,
            Self::Reconnecting => 5,
            Self::Closing => 6,
            Self::Closed => 7,
        }
    }
}

/// Control messages from the pool to one connection actor.
#[derive(Debug)]
pub enum ConnectionCommand {
    /// Add tokens to this connection and send a subscribe frame.
    Subscribe(Vec<TokenId>),
    /// Remove tokens and send an unsubscribe frame.
    Unsubscribe(Vec<TokenId>),
}

/// How a streaming session ended.
enum SessionEnd {
    /// Root shutdown or pool drop; do not reconnect.
    Shutdown,
}

/// One reader connection of the subscription pool.
pub struct WsConnection {
    /// Pool-assigned index, also the metrics label.
    id: usize,
    label: String,
    url: String,
    config: WsConfig,
    /// Tokens this connection is responsible for.
    subscriptions: HashSet<TokenId>,
    cmd_rx: mpsc::Receiver<ConnectionCommand>,
    out_tx: mpsc::Sender<FeedEvent>,
    metrics: Arc<MetricsRegistry>,
    state: ConnectionState,
}

impl WsConnection {
    pub fn new(
        id: usize,
        url: String,
        config: WsConfig,
        cmd_rx: mpsc::Receiver<ConnectionCommand>,
        out_tx: mpsc::Sender<FeedEvent>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            id,
            label: id.to_string(),
            url,
            config,
            subscriptions: HashSet::new(),
            cmd_rx,
            out_tx,
            metrics,
            state: ConnectionState::Dialing,
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(connection = self.id, from = ?self.state, to = ?state, "Connection state change");
            self.state = state;
        }
        self.metrics
            .ws_connection_state
            .with_label_values(&[&self.label])
            .set(state.code());
    }

    /// Run the connection until shutdown.
    ///
    /// Transient failures never escape this loop; they feed the backoff
    /// schedule and the reconnect counter.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut delay = self.config.reconnect_initial_delay;

        loop {
            self.set_state(ConnectionState::Dialing);

            match self.session(&mut shutdown_rx).await {
                Ok(SessionEnd::Shutdown) => break,
                Err(e) => {
                    // A session that made it to healthy restarts the
                    // backoff schedule from the initial delay.
                    if matches!(
                        self.state,
                        ConnectionState::Healthy | ConnectionState::Degraded
                    ) {
                        delay = self.config.reconnect_initial_delay;
                    }
                    self.set_state(ConnectionState::Reconnecting);
                    self.metrics
                        .ws_reconnects_total
                        .with_label_values(&[&self.label])
                        .inc();

                    let sleep_for = full_jitter(delay);
                    warn!(
                        connection = self.id,
                        error = %e,
                        delay_ms = sleep_for.as_millis(),
                        "Feed connection lost, reconnecting"
                    );

                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(sleep_for) => {}
                    }

                    delay = next_backoff(
                        delay,
                        self.config.reconnect_backoff_multiplier,
                        self.config.reconnect_max_delay,
                    );
                }
            }
        }

        self.set_state(ConnectionState::Closed);
        info!(connection = self.id, "Feed connection closed");
    }

    /// One session: dial, resubscribe, stream until error or shutdown.
    async fn session(
        &mut self,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<SessionEnd> {
        let (ws_stream, _) = timeout(self.config.dial_timeout, connect_async(&self.url))
            .await
            .context("dial timed out")?
            .context("dial failed")?;
        self.set_state(ConnectionState::Connected);

        let (mut write, mut read) = ws_stream.split();

        // The current subscription set is replayed before any message is
        // forwarded, so a reconnect is invisible to downstream consumers
        // apart from possible duplicates.
        if !self.subscriptions.is_empty() {
            let ids: Vec<TokenId> = self.subscriptions.iter().cloned().collect();
            write
                .send(Message::Text(messages::subscribe_frame(&ids)))
                .await
                .context("resubscribe failed")?;
            debug!(connection = self.id, tokens = ids.len(), "Subscription set replayed");
        }
        self.set_state(ConnectionState::Subscribed);

        let mut ping_timer = interval(self.config.ping_interval);
        ping_timer.tick().await; // consume the immediate first tick
        let mut last_pong = Instant::now();
        self.set_state(ConnectionState::Healthy);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    self.set_state(ConnectionState::Closing);
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ConnectionCommand::Subscribe(ids)) => {
                        let fresh: Vec<TokenId> = ids
                            .into_iter()
                            .filter(|id| self.subscriptions.insert(id.clone()))
                            .collect();
                        if !fresh.is_empty() {
                            write
                                .send(Message::Text(messages::subscribe_frame(&fresh)))
                                .await
                                .context("subscribe send failed")?;
                            debug!(connection = self.id, tokens = fresh.len(), "Subscribed");
                        }
                    }
                    Some(ConnectionCommand::Unsubscribe(ids)) => {
                        let dropped: Vec<TokenId> = ids
                            .into_iter()
                            .filter(|id| self.subscriptions.remove(id))
                            .collect();
                        if !dropped.is_empty() {
                            write
                                .send(Message::Text(messages::unsubscribe_frame(&dropped)))
                                .await
                                .context("unsubscribe send failed")?;
                            debug!(connection = self.id, tokens = dropped.len(), "Unsubscribed");
                        }
                    }
                    None => {
                        // Pool dropped its handle: graceful close.
                        self.set_state(ConnectionState::Closing);
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(SessionEnd::Shutdown);
                    }
                },
                _ = ping_timer.tick() => {
                    if last_pong.elapsed() > self.config.pong_timeout {
                        self.set_state(ConnectionState::Degraded);
                        anyhow::bail!(
                            "no pong for {}ms",
                            last_pong.elapsed().as_millis()
                        );
                    }
                    write
                        .send(Message::Ping(Vec::new()))
                        .await
                        .context("ping send failed")?;
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let body: &str = text.as_ref();
                        if body.eq_ignore_ascii_case("pong") {
                            last_pong = Instant::now();
                        } else {
                            self.forward_frame(body);
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        if self.state == ConnectionState::Degraded {
                            self.set_state(ConnectionState::Healthy);
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write
                            .send(Message::Pong(data))
                            .await
                            .context("pong send failed")?;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        anyhow::bail!("closed by remote");
                    }
                    Some(Err(e)) => {
                        return Err(anyhow::Error::from(e).context("read failed"));
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    /// Decode one text frame and forward its events, never blocking.
    fn forward_frame(&self, body: &str) {
        let parsed = match messages::parse_frame(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.metrics.ws_decode_errors_total.inc();
                debug!(connection = self.id, error = %e, "Dropping malformed frame");
                return;
            }
        };

        if parsed.ignored > 0 {
            self.metrics
                .ws_messages_total
                .with_label_values(&["ignored"])
                .inc_by(parsed.ignored as u64);
        }

        for event in parsed.events {
            self.metrics
                .ws_messages_total
                .with_label_values(&[event.event_type()])
                .inc();

            if self.out_tx.try_send(event).is_err() {
                self.metrics
                    .buffer_overflow_total
                    .with_label_values(&["market_data"])
                    .inc();
            }
        }
    }
}

/// Full jitter: sleep a uniform random duration in [0, delay].
fn full_jitter(delay: Duration) -> Duration {
    let cap_ms = delay.as_millis() as u64;
    if cap_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=cap_ms))
}

/// Multiply the delay, saturating at the configured cap.
fn next_backoff(delay: Duration, multiplier: f64, max: Duration) -> Duration {
    let next = delay.as_secs_f64() * multiplier;
    Duration::from_secs_f64(next.min(max.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_to_cap() {
        let max = Duration::from_secs(30);
        let mut delay = Duration::from_secs(1);
        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push(delay);
            delay = next_backoff(delay, 2.0, max);
        }
        assert_eq!(seen[0], Duration::from_secs(1));
        assert_eq!(seen[1], Duration::from_secs(2));
        assert_eq!(seen[5], Duration::from_secs(30));
        assert_eq!(delay, Duration::from_secs(30));
    }

    #[test]
    fn test_full_jitter_stays_within_delay() {
        let delay = Duration::from_millis(500);
        for _ in 0..100 {
            assert!(full_jitter(delay) <= delay);
        }
        assert_eq!(full_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_state_codes_are_distinct() {
        let states = [
            ConnectionState::Dialing,
            ConnectionState::Connected,
            ConnectionState::Subscribed,
            ConnectionState::Healthy,
            ConnectionState::Degraded,
            ConnectionState::Reconnecting,
            ConnectionState::Closing,
            ConnectionState::Closed,
        ];
        let mut codes: Vec<i64> = states.iter().map(|s| s.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), states.len());
    }
}
