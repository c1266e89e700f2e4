//! Connection-lifecycle event hub.
//!
//! A single `tokio::sync::broadcast` channel shared by all connection tasks.
//! The closing connection publishes its own id after deregistering; every
//! other task forwards the notice to its client. Receivers that fall behind
//! skip events (RecvError::Lagged) and recover via later snapshots.

use relay_shared::protocol::SessionId;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEvent {
    /// The given session's socket closed and its registry entry is gone.
    Disconnected(SessionId),
}

/// Cloneable handle to the event channel. Store in AppState.
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<RelayEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to lifecycle events. Each connection task calls this once,
    /// before it could miss a peer's disconnect.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribed connections.
    pub fn publish(&self, event: RelayEvent) {
        // send() errors when there are no receivers - that's fine.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = EventHub::new(8);
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();

        let id = Uuid::new_v4();
        hub.publish(RelayEvent::Disconnected(id));

        assert_eq!(rx1.recv().await.unwrap(), RelayEvent::Disconnected(id));
        assert_eq!(rx2.recv().await.unwrap(), RelayEvent::Disconnected(id));
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let hub = EventHub::new(8);
        hub.publish(RelayEvent::Disconnected(Uuid::new_v4()));
    }
}
