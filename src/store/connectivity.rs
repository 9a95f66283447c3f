use serde::Serialize;
use std::fmt;
use tokio::sync::watch;
use tracing::{info, warn};

/// Connectivity state of a store adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    Connecting,
    Ready,
    Error,
    Closed,
}

impl StoreStatus {
    pub fn is_available(self) -> bool {
        self == StoreStatus::Ready
    }
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StoreStatus::Connecting => "connecting",
            StoreStatus::Ready => "ready",
            StoreStatus::Error => "error",
            StoreStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Single-writer connectivity state machine.
///
/// The owning adapter is the only writer; everything else observes through
/// [`Connectivity::subscribe`]. `Closed` is terminal.
pub struct Connectivity {
    tx: watch::Sender<StoreStatus>,
}

impl Connectivity {
    pub fn new(initial: StoreStatus) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> StoreStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreStatus> {
        self.tx.subscribe()
    }

    /// Move to `next`. Returns false if nothing changed (same state, or
    /// already closed).
    pub fn transition(&self, next: StoreStatus) -> bool {
        let mut previous = next;
        let changed = self.tx.send_if_modified(|state| {
            if *state == next || *state == StoreStatus::Closed {
                return false;
            }
            previous = *state;
            *state = next;
            true
        });

        if changed {
            match next {
                StoreStatus::Error => warn!(from = %previous, "Store connection error"),
                _ => info!(from = %previous, to = %next, "Store connectivity changed"),
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_notifies_subscribers() {
        let conn = Connectivity::new(StoreStatus::Connecting);
        let mut rx = conn.subscribe();

        assert!(conn.transition(StoreStatus::Ready));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), StoreStatus::Ready);
        assert!(conn.current().is_available());
    }

    #[test]
    fn test_same_state_is_not_a_transition() {
        let conn = Connectivity::new(StoreStatus::Ready);
        let rx = conn.subscribe();

        assert!(!conn.transition(StoreStatus::Ready));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_closed_is_terminal() {
        let conn = Connectivity::new(StoreStatus::Ready);
        assert!(conn.transition(StoreStatus::Closed));
        assert!(!conn.transition(StoreStatus::Ready));
        assert_eq!(conn.current(), StoreStatus::Closed);
    }

    #[test]
    fn test_only_ready_is_available() {
        assert!(StoreStatus::Ready.is_available());
        assert!(!StoreStatus::Connecting.is_available());
        assert!(!StoreStatus::Error.is_available());
        assert!(!StoreStatus::Closed.is_available());
    }
}
