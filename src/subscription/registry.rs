use crate::subscription::protocol::{Frame, ServerEvent};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Frames a connection may have queued before further frames are dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Per-connection bookkeeping, owned by the registry
#[derive(Debug)]
pub struct ConnectionState {
    pub id: ConnectionId,
    pub connected_at: DateTime<Utc>,
    alive: AtomicBool,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            connected_at: Utc::now(),
            alive: AtomicBool::new(true),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn mark_disconnected(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

/// A single connection send failed
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryError {
    UnknownConnection(ConnectionId),
    Disconnected(ConnectionId),
    /// The connection is not draining its queue; the frame was dropped
    Full(ConnectionId),
    Encode(String),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::UnknownConnection(id) => write!(f, "connection {} is not registered", id),
            DeliveryError::Disconnected(id) => write!(f, "connection {} has disconnected", id),
            DeliveryError::Full(id) => write!(f, "connection {} outbound queue is full", id),
            DeliveryError::Encode(e) => write!(f, "failed to encode event: {}", e),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Send-capable handle to one connection's outbound queue
#[derive(Clone)]
pub struct ConnectionHandle {
    state: Arc<ConnectionState>,
    tx: mpsc::Sender<Frame>,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.state.id
    }

    pub fn state(&self) -> &Arc<ConnectionState> {
        &self.state
    }

    /// Queue a frame. Never blocks; frames are written in queue order.
    /// A full queue drops the frame for this connection only.
    pub fn deliver(&self, frame: Frame) -> Result<(), DeliveryError> {
        if !self.state.is_alive() {
            return Err(DeliveryError::Disconnected(self.state.id));
        }
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full(self.state.id),
            TrySendError::Closed(_) => DeliveryError::Disconnected(self.state.id),
        })
    }
}

/// Registry of live connections.
///
/// Lock-free concurrent map; iteration goes through [`ConnectionRegistry::snapshot`]
/// so removal during a broadcast never contends with it.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionHandle>,
    queue_capacity: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Registry whose connections each buffer at most `queue_capacity` frames
    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self {
            connections: DashMap::new(),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new connection and hand back its outbound queue
    pub fn register(&self) -> (Arc<ConnectionState>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let state = Arc::new(ConnectionState::new());
        let handle = ConnectionHandle {
            state: Arc::clone(&state),
            tx,
        };
        self.connections.insert(state.id, handle);
        debug!(connection_id = %state.id, "Connection registered");
        (state, rx)
    }

    /// Remove a connection. Returns false if it was not registered.
    pub fn deregister(&self, id: ConnectionId, reason: &str) -> bool {
        match self.connections.remove(&id) {
            Some((_, handle)) => {
                handle.state.mark_disconnected();
                info!(
                    connection_id = %id,
                    reason = reason,
                    clients = self.connections.len(),
                    "Client disconnected"
                );
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections.get(&id).map(|h| h.clone())
    }

    /// Send an event to one connection only
    pub fn send_to(&self, id: ConnectionId, event: &ServerEvent) -> Result<(), DeliveryError> {
        let handle = self
            .get(id)
            .ok_or(DeliveryError::UnknownConnection(id))?;
        let frame = event
            .to_frame()
            .map_err(|e| DeliveryError::Encode(e.to_string()))?;
        handle.deliver(frame)
    }

    /// Copy of the current connection handles
    pub fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.connections.iter().map(|h| h.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_deregister() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = registry.register();
        let (b, _rx_b) = registry.register();
        assert_ne!(a.id, b.id);
        assert_eq!(registry.len(), 2);

        assert!(registry.deregister(a.id, "test"));
        assert!(!a.is_alive());
        assert!(b.is_alive());
        assert_eq!(registry.len(), 1);

        // Second deregister is a no-op
        assert!(!registry.deregister(a.id, "test"));
    }

    #[test]
    fn test_send_to_targets_one_connection() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = registry.register();
        let (_b, mut rx_b) = registry.register();

        registry.send_to(a.id, &ServerEvent::pong()).unwrap();

        let frame = rx_a.try_recv().unwrap();
        assert!(frame.contains("\"pong\""));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_send_to_unknown_connection() {
        let registry = ConnectionRegistry::new();
        let id = Uuid::now_v7();
        assert_eq!(
            registry.send_to(id, &ServerEvent::pong()),
            Err(DeliveryError::UnknownConnection(id))
        );
    }

    #[test]
    fn test_send_to_dropped_receiver_fails_locally() {
        let registry = ConnectionRegistry::new();
        let (a, rx_a) = registry.register();
        drop(rx_a);

        assert_eq!(
            registry.send_to(a.id, &ServerEvent::pong()),
            Err(DeliveryError::Disconnected(a.id))
        );
    }

    #[test]
    fn test_snapshot_survives_removal() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = registry.register();
        let (_b, _rx_b) = registry.register();

        let snapshot = registry.snapshot();
        registry.deregister(a.id, "test");

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 1);
        let removed = snapshot.iter().find(|h| h.id() == a.id).unwrap();
        assert!(removed.deliver(Frame::from("x")).is_err());
    }

    #[test]
    fn test_stalled_connection_is_capped() {
        let registry = ConnectionRegistry::with_capacity(4);
        let (stalled, mut rx_stalled) = registry.register();
        let (_healthy, mut rx_healthy) = registry.register();

        let mut received = 0;
        for i in 0..50 {
            for handle in registry.snapshot() {
                let result = handle.deliver(Frame::from(format!("frame-{}", i)));
                if handle.id() == stalled.id && i >= 4 {
                    assert_eq!(result, Err(DeliveryError::Full(stalled.id)));
                } else {
                    assert!(result.is_ok());
                }
            }
            while rx_healthy.try_recv().is_ok() {
                received += 1;
            }
        }

        assert_eq!(received, 50);
        let mut queued = Vec::new();
        while let Ok(frame) = rx_stalled.try_recv() {
            queued.push(frame.to_string());
        }
        assert_eq!(queued, vec!["frame-0", "frame-1", "frame-2", "frame-3"]);
        assert!(stalled.is_alive());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let registry = ConnectionRegistry::with_capacity(0);
        let (a, mut rx) = registry.register();
        registry.send_to(a.id, &ServerEvent::pong()).unwrap();
        assert!(rx.try_recv().is_ok());
    }
}
