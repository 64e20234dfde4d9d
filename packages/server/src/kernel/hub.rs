//! Notification hub: the in-memory registry and fan-out engine for
//! live WebSocket connections.
//!
//! The hub is a single explicitly constructed object shared by `Arc`;
//! there is no process-global state. Broadcasting takes a read lock
//! over the registry and performs a non-blocking write per matching
//! connection, so one slow or dead peer never stalls delivery to the
//! others. Dead connections are removed asynchronously, after the read
//! guard is dropped.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use axum::extract::ws::Message;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::messages::BusEvent;

/// Outbox depth per connection. A peer that falls this far behind is
/// treated as dead on the next broadcast.
pub const OUTBOX_CAPACITY: usize = 64;

/// Atomic counter for thread-safe incrementing.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Atomic gauge for thread-safe value tracking.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct HubMetrics {
    pub active_connections: Gauge,
    pub broadcasts: Counter,
    pub partial_broadcasts: Counter,
    pub messages_delivered: Counter,
    pub send_failures: Counter,
    /// Total lifetime of removed connections, in milliseconds.
    pub connection_duration_ms: Counter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Subscribe,
    Unsubscribe,
}

/// Inbound client control frame: `{"action":"subscribe","group":"<jobId>"}`.
#[derive(Debug, Deserialize)]
pub struct ControlFrame {
    pub action: ControlAction,
    pub group: String,
}

/// A live client connection: an outbox to the socket's write pump plus
/// the connection's own group-subscription set.
///
/// The group set has its own lock so a client's subscribe/unsubscribe
/// frames never contend with the hub's registry lock during a
/// broadcast sweep.
pub struct WsConnection {
    id: Uuid,
    groups: Mutex<HashSet<String>>,
    outbox: mpsc::Sender<Message>,
    cancel: CancellationToken,
    connected_at: Instant,
}

impl WsConnection {
    fn new(outbox: mpsc::Sender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            groups: Mutex::new(HashSet::new()),
            outbox,
            cancel: CancellationToken::new(),
            connected_at: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Token cancelled when the hub closes this connection.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self, group: &str) {
        self.groups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(group.to_string());
    }

    pub fn unsubscribe(&self, group: &str) {
        self.groups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(group);
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(group)
    }

    /// Apply a decoded client control frame. Both actions are
    /// idempotent.
    pub fn apply(&self, frame: ControlFrame) {
        match frame.action {
            ControlAction::Subscribe => self.subscribe(&frame.group),
            ControlAction::Unsubscribe => self.unsubscribe(&frame.group),
        }
    }

    fn try_send(&self, msg: Message) -> bool {
        self.outbox.try_send(msg).is_ok()
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

pub struct NotificationHub {
    connections: RwLock<HashMap<Uuid, Arc<WsConnection>>>,
    metrics: HubMetrics,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            metrics: HubMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &HubMetrics {
        &self.metrics
    }

    pub fn connection_count(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Register a connection whose write pump drains `outbox`.
    pub fn register(&self, outbox: mpsc::Sender<Message>) -> Arc<WsConnection> {
        let conn = Arc::new(WsConnection::new(outbox));
        let count = {
            let mut conns = self.connections.write().unwrap_or_else(|e| e.into_inner());
            conns.insert(conn.id, Arc::clone(&conn));
            conns.len()
        };
        self.metrics.active_connections.set(count as u64);
        info!(conn_id = %conn.id, active = count, "connection registered");
        conn
    }

    /// Remove and close a connection. Removing twice is a no-op.
    pub fn remove(&self, id: Uuid) {
        let removed = {
            let mut conns = self.connections.write().unwrap_or_else(|e| e.into_inner());
            let removed = conns.remove(&id);
            self.metrics.active_connections.set(conns.len() as u64);
            removed
        };
        if let Some(conn) = removed {
            conn.close();
            let duration_ms = conn.connected_at.elapsed().as_millis() as u64;
            self.metrics.connection_duration_ms.add(duration_ms);
            debug!(conn_id = %id, duration_ms, "connection removed");
        }
    }

    /// Broadcast to every connection.
    pub fn broadcast(self: &Arc<Self>, event: &BusEvent) {
        self.broadcast_to_group(event, "");
    }

    /// Broadcast to connections subscribed to `group`; an empty group
    /// matches every connection. Zero matches is a silent no-op.
    pub fn broadcast_to_group(self: &Arc<Self>, event: &BusEvent, group: &str) {
        // Serialize once for the whole sweep.
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "failed to serialize broadcast payload");
                return;
            }
        };

        let started = Instant::now();
        let mut attempted = 0u64;
        let mut delivered = 0u64;
        let mut dead: Vec<Uuid> = Vec::new();

        {
            let conns = self.connections.read().unwrap_or_else(|e| e.into_inner());
            for (id, conn) in conns.iter() {
                if !group.is_empty() && !conn.has_group(group) {
                    continue;
                }
                attempted += 1;
                if conn.try_send(Message::Text(payload.clone())) {
                    delivered += 1;
                } else {
                    dead.push(*id);
                }
            }
        }

        self.metrics.broadcasts.inc();
        self.metrics.messages_delivered.add(delivered);
        if delivered < attempted {
            self.metrics.partial_broadcasts.inc();
            self.metrics.send_failures.add(attempted - delivered);
        }
        if attempted > 0 {
            debug!(
                message_type = ?event.message_type(),
                group,
                attempted,
                delivered,
                elapsed_us = started.elapsed().as_micros() as u64,
                "broadcast swept"
            );
        }

        // Removal happens off the sweep path: taking the write lock
        // here would be a read-to-write upgrade on the registry.
        if !dead.is_empty() {
            let hub = Arc::clone(self);
            tokio::spawn(async move {
                for id in dead {
                    warn!(conn_id = %id, "removing connection after failed write");
                    hub.remove(id);
                }
            });
        }
    }

    /// Close every connection and clear the registry. Process shutdown
    /// only.
    pub fn close_all(&self) {
        let mut conns = self.connections.write().unwrap_or_else(|e| e.into_inner());
        for conn in conns.values() {
            conn.close();
        }
        conns.clear();
        self.metrics.active_connections.set(0);
        info!("hub closed");
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_frame_parses_subscribe() {
        let frame: ControlFrame =
            serde_json::from_str(r#"{"action":"subscribe","group":"job-1"}"#).unwrap();
        assert_eq!(frame.action, ControlAction::Subscribe);
        assert_eq!(frame.group, "job-1");
    }

    #[test]
    fn control_frame_rejects_unknown_action() {
        assert!(serde_json::from_str::<ControlFrame>(r#"{"action":"ping","group":"x"}"#).is_err());
        assert!(serde_json::from_str::<ControlFrame>(r#"{"group":"x"}"#).is_err());
    }

    #[tokio::test]
    async fn group_subscription_is_idempotent() {
        let hub = Arc::new(NotificationHub::new());
        let (tx, _rx) = mpsc::channel(OUTBOX_CAPACITY);
        let conn = hub.register(tx);

        conn.subscribe("job-1");
        conn.subscribe("job-1");
        assert!(conn.has_group("job-1"));

        conn.unsubscribe("job-1");
        conn.unsubscribe("job-1");
        assert!(!conn.has_group("job-1"));
    }

    #[tokio::test]
    async fn remove_is_idempotent_and_updates_gauge() {
        let hub = Arc::new(NotificationHub::new());
        let (tx, _rx) = mpsc::channel(OUTBOX_CAPACITY);
        let conn = hub.register(tx);
        assert_eq!(hub.metrics().active_connections.get(), 1);

        std::thread::sleep(std::time::Duration::from_millis(5));
        hub.remove(conn.id());
        let lifetime = hub.metrics().connection_duration_ms.get();
        assert!(lifetime >= 5);

        // Second remove is a no-op, including for the duration total.
        hub.remove(conn.id());
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.metrics().active_connections.get(), 0);
        assert_eq!(hub.metrics().connection_duration_ms.get(), lifetime);
    }
}
