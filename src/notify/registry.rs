use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::metrics::Metrics;
use super::OrderNotification;

pub type ClientId = Uuid;

/// Messages a client may have queued before it counts as stalled
pub const DEFAULT_CLIENT_QUEUE: usize = 256;

/// A connected staff client. Dropping the receiver disconnects the client
/// at the next broadcast.
pub struct StaffConnection {
    pub id: ClientId,
    pub receiver: mpsc::Receiver<Arc<str>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub pruned: usize,
}

/// Connected staff clients (Client ID -> outbound channel)
#[derive(Clone)]
pub struct ConnectionRegistry {
    clients: Arc<DashMap<ClientId, mpsc::Sender<Arc<str>>>>,
    queue_capacity: usize,
    metrics: Option<Arc<Metrics>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self {
            clients: Arc::new(DashMap::new()),
            queue_capacity: DEFAULT_CLIENT_QUEUE,
            metrics: None,
        }
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-client queue bound; a client that falls this far behind is dropped
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn connect(&self) -> StaffConnection {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = Uuid::new_v4();
        self.clients.insert(id, tx);
        self.update_gauge();

        tracing::info!(client_id = %id, connected = self.clients.len(), "🔌 Staff client connected");
        StaffConnection { id, receiver: rx }
    }

    pub fn disconnect(&self, id: &ClientId) -> bool {
        let removed = self.clients.remove(id).is_some();
        if removed {
            self.update_gauge();
            tracing::info!(client_id = %id, "Staff client disconnected");
        }
        removed
    }

    pub fn connected(&self) -> usize {
        self.clients.len()
    }

    /// Send to every client connected when the broadcast starts. A failed
    /// send only prunes that client.
    pub fn broadcast(&self, notification: &OrderNotification) -> BroadcastReport {
        let payload: Arc<str> = match serde_json::to_string(notification) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize staff notification");
                return BroadcastReport::default();
            }
        };

        // Snapshot first: no map guard is held while sending
        let snapshot: Vec<(ClientId, mpsc::Sender<Arc<str>>)> = self
            .clients
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut report = BroadcastReport::default();
        for (id, sender) in snapshot {
            match sender.try_send(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    let reason = match e {
                        TrySendError::Full(_) => "queue full",
                        TrySendError::Closed(_) => "gone",
                    };
                    tracing::warn!(client_id = %id, reason, "Staff client pruned");
                    self.clients.remove(&id);
                    report.pruned += 1;
                }
            }
        }

        if report.pruned > 0 {
            self.update_gauge();
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_broadcast(notification.kind.label(), report.delivered, report.pruned);
        }

        tracing::debug!(
            order_id = notification.order_id,
            kind = notification.kind.label(),
            delivered = report.delivered,
            pruned = report.pruned,
            "📣 Broadcast staff notification"
        );
        report
    }

    fn update_gauge(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.notification_clients_connected.set(self.clients.len() as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationType;

    #[tokio::test]
    async fn test_broadcast_reaches_all_clients() {
        let registry = ConnectionRegistry::new();
        let mut a = registry.connect();
        let mut b = registry.connect();

        let report = registry.broadcast(&OrderNotification::new_order(1, "N1"));
        assert_eq!(report, BroadcastReport { delivered: 2, pruned: 0 });

        for conn in [&mut a, &mut b] {
            let raw = conn.receiver.recv().await.unwrap();
            let msg: OrderNotification = serde_json::from_str(&raw).unwrap();
            assert_eq!(msg.kind, NotificationType::NewOrder);
            assert_eq!(msg.order_id, 1);
        }
    }

    #[tokio::test]
    async fn test_dead_client_is_pruned_without_affecting_others() {
        let registry = ConnectionRegistry::new();
        let dead = registry.connect();
        let mut alive = registry.connect();
        drop(dead.receiver);

        let report = registry.broadcast(&OrderNotification::reminder(5, "N5"));
        assert_eq!(report, BroadcastReport { delivered: 1, pruned: 1 });
        assert_eq!(registry.connected(), 1);
        assert!(alive.receiver.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_stalled_client_is_pruned_when_queue_fills() {
        let registry = ConnectionRegistry::new().with_queue_capacity(2);
        let _stalled = registry.connect();
        let mut reader = registry.connect();

        for n in 1..=2 {
            let report = registry.broadcast(&OrderNotification::new_order(n, "N"));
            assert_eq!(report, BroadcastReport { delivered: 2, pruned: 0 });
            reader.receiver.recv().await.unwrap();
        }

        let report = registry.broadcast(&OrderNotification::new_order(3, "N3"));
        assert_eq!(report, BroadcastReport { delivered: 1, pruned: 1 });
        assert_eq!(registry.connected(), 1);
        assert!(reader.receiver.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_late_client_gets_no_replay() {
        let registry = ConnectionRegistry::new();
        registry.broadcast(&OrderNotification::new_order(1, "N1"));

        let mut late = registry.connect();
        assert!(late.receiver.try_recv().is_err());
    }

    #[test]
    fn test_disconnect() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let registry = ConnectionRegistry::new().with_metrics(metrics.clone());
        let conn = registry.connect();
        assert_eq!(metrics.notification_clients_connected.get(), 1);

        assert!(registry.disconnect(&conn.id));
        assert!(!registry.disconnect(&conn.id));
        assert_eq!(registry.connected(), 0);
        assert_eq!(metrics.notification_clients_connected.get(), 0);
    }
}
