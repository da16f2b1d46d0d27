//! WebSocket Subscription Pool - Fan-out Over a Fixed Connection Set
//!
//! Keeps a configured number of reader connections to the market-data
//! endpoint and spreads token subscriptions across them by least-loaded
//! assignment, bounding per-connection fan-out. All connections feed one
//! merged bounded channel; ordering holds within a connection, never
//! across connections.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::feeds::connection::{ConnectionCommand, WsConnection};
use crate::adapters::feeds::messages::FeedEvent;
use crate::adapters::metrics::MetricsRegistry;
use crate::config::WsConfig;
use crate::domain::market::TokenId;

/// Capacity of each connection's command channel.
const COMMAND_BUFFER: usize = 64;

/// How long `close` waits for reader tasks to finish.
const CLOSE_GRACE: Duration = Duration::from_secs(10);

struct ConnectionHandle {
    cmd_tx: mpsc::Sender<ConnectionCommand>,
    task: JoinHandle<()>,
}

/// Pool of feed connections with a single merged message stream.
pub struct SubscriptionPool {
    url: String,
    config: WsConfig,
    metrics: Arc<MetricsRegistry>,
    connections: tokio::sync::Mutex<Vec<ConnectionHandle>>,
    /// token -> connection index; also the idempotence record.
    assignment: Mutex<HashMap<TokenId, usize>>,
    /// Tokens subscribed before `start`, flushed once connections exist.
    pending: Mutex<Vec<TokenId>>,
    started: AtomicBool,
    messages_tx: mpsc::Sender<FeedEvent>,
    messages_rx: Mutex<Option<mpsc::Receiver<FeedEvent>>>,
}

impl SubscriptionPool {
    pub fn new(url: String, config: WsConfig, metrics: Arc<MetricsRegistry>) -> Self {
        let (messages_tx, messages_rx) = mpsc::channel(config.message_buffer_size);
        Self {
            url,
            config,
            metrics,
            connections: tokio::sync::Mutex::new(Vec::new()),
            assignment: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            messages_tx,
            messages_rx: Mutex::new(Some(messages_rx)),
        }
    }

    /// Open all connections and begin reading.
    ///
    /// Buffered subscriptions accumulated before start are flushed once
    /// the readers are up.
    pub async fn start(&self, shutdown_tx: &broadcast::Sender<()>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut connections = self.connections.lock().await;
            for id in 0..self.config.pool_size {
                let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
                let connection = WsConnection::new(
                    id,
                    self.url.clone(),
                    self.config.clone(),
                    cmd_rx,
                    self.messages_tx.clone(),
                    Arc::clone(&self.metrics),
                );
                let task = tokio::spawn(connection.run(shutdown_tx.subscribe()));
                connections.push(ConnectionHandle { cmd_tx, task });
            }
        }

        info!(
            pool_size = self.config.pool_size,
            url = %self.url,
            "Subscription pool started"
        );

        let buffered: Vec<TokenId> = std::mem::take(&mut *self.pending.lock());
        if !buffered.is_empty() {
            debug!(tokens = buffered.len(), "Flushing pre-start subscriptions");
            self.subscribe(buffered).await;
        }
    }

    /// Subscribe a batch of tokens. Idempotent: already-assigned tokens
    /// are skipped; new ones go to the least-loaded connection.
    pub async fn subscribe(&self, token_ids: Vec<TokenId>) {
        if !self.started.load(Ordering::SeqCst) {
            self.pending.lock().extend(token_ids);
            return;
        }

        let groups = {
            let mut assignment = self.assignment.lock();
            let mut loads = vec![0usize; self.config.pool_size];
            for index in assignment.values() {
                loads[*index] += 1;
            }

            let mut groups: HashMap<usize, Vec<TokenId>> = HashMap::new();
            for token_id in token_ids {
                if assignment.contains_key(&token_id) {
                    continue;
                }
                let target = loads
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, load)| **load)
                    .map_or(0, |(i, _)| i);
                loads[target] += 1;
                assignment.insert(token_id.clone(), target);
                groups.entry(target).or_default().push(token_id);
            }
            groups
        };

        self.dispatch(groups, ConnectionCommand::Subscribe).await;
    }

    /// Unsubscribe a batch of tokens; unknown tokens are ignored.
    pub async fn unsubscribe(&self, token_ids: Vec<TokenId>) {
        let groups = {
            let mut assignment = self.assignment.lock();
            let mut groups: HashMap<usize, Vec<TokenId>> = HashMap::new();
            for token_id in token_ids {
                if let Some(index) = assignment.remove(&token_id) {
                    groups.entry(index).or_default().push(token_id);
                }
            }
            groups
        };

        self.dispatch(groups, ConnectionCommand::Unsubscribe).await;
    }

    async fn dispatch<F>(&self, groups: HashMap<usize, Vec<TokenId>>, make: F)
    where
        F: Fn(Vec<TokenId>) -> ConnectionCommand,
    {
        let connections = self.connections.lock().await;
        for (index, tokens) in groups {
            let Some(handle) = connections.get(index) else {
                continue;
            };
            if handle.cmd_tx.send(make(tokens)).await.is_err() {
                warn!(connection = index, "Command channel closed, connection gone");
            }
        }
    }

    /// Take the merged message stream. Single consumer; the second call
    /// returns `None`.
    pub fn take_messages(&self) -> Option<mpsc::Receiver<FeedEvent>> {
        self.messages_rx.lock().take()
    }

    /// Number of tokens currently assigned to connections.
    pub fn subscription_count(&self) -> usize {
        self.assignment.lock().len()
    }

    /// Close all connections: drop command handles (each reader sends a
    /// close frame and exits) and wait up to the grace period.
    pub async fn close(&self) {
        let handles: Vec<ConnectionHandle> =
            std::mem::take(&mut *self.connections.lock().await);

        // Dropping a command sender is the close signal for its reader.
        let join_all = async {
            for handle in handles {
                drop(handle.cmd_tx);
                let _ = handle.task.await;
            }
        };

        if tokio::time::timeout(CLOSE_GRACE, join_all).await.is_err() {
            warn!("Subscription pool close timed out, abandoning readers");
        } else {
            info!("Subscription pool closed");
        }
    }
}
