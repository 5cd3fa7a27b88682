//! Multicast channel for task state transitions.
//!
//! A single broadcast channel publishes every [`TaskEvent`] system-wide.
//! Publishing never blocks the producer; late subscribers miss prior events
//! by design (live-progress semantics), and a consumer that falls behind
//! observes a `Lagged` error and skips ahead. Progress ticks are
//! rate-bounded at the fetch layer, so terminal events are not flushed out
//! of the buffer by a burst of `Downloading` updates in practice.

use tokio::sync::broadcast;

use crate::state::TaskEvent;

/// Default capacity of the event buffer.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Non-blocking fanout of task lifecycle events.
#[derive(Debug, Clone)]
pub struct StateBroadcaster {
    tx: broadcast::Sender<TaskEvent>,
}

impl StateBroadcaster {
    /// Creates a broadcaster with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Registers a new subscriber.
    ///
    /// The receiver only observes events published after this call.
    /// Dropping the receiver unsubscribes it.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Never blocks; an event published with no subscribers is dropped.
    pub fn publish(&self, event: TaskEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of currently attached subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for StateBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TaskState;

    fn event(package: &str, state: TaskState) -> TaskEvent {
        TaskEvent {
            package: package.to_string(),
            display_name: package.to_string(),
            state,
        }
    }

    #[test]
    fn test_publish_without_subscribers_does_not_fail() {
        let broadcaster = StateBroadcaster::default();
        broadcaster.publish(event("com.example.a", TaskState::Pending));
        assert_eq!(broadcaster.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let broadcaster = StateBroadcaster::default();
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(event("com.example.a", TaskState::Pending));
        broadcaster.publish(event("com.example.a", TaskState::Connecting));

        assert_eq!(rx.recv().await.unwrap().state, TaskState::Pending);
        assert_eq!(rx.recv().await.unwrap().state, TaskState::Connecting);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_prior_events() {
        let broadcaster = StateBroadcaster::default();
        let mut early = broadcaster.subscribe();

        broadcaster.publish(event("com.example.a", TaskState::Pending));

        let mut late = broadcaster.subscribe();
        broadcaster.publish(event("com.example.a", TaskState::Cancelled));

        assert_eq!(early.recv().await.unwrap().state, TaskState::Pending);
        assert_eq!(early.recv().await.unwrap().state, TaskState::Cancelled);
        // The late subscriber only sees the event published after it joined.
        assert_eq!(late.recv().await.unwrap().state, TaskState::Cancelled);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_receive() {
        let broadcaster = StateBroadcaster::default();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();
        assert_eq!(broadcaster.receiver_count(), 2);

        broadcaster.publish(event("com.example.a", TaskState::Connecting));

        assert_eq!(a.recv().await.unwrap().state, TaskState::Connecting);
        assert_eq!(b.recv().await.unwrap().state, TaskState::Connecting);
    }
}
