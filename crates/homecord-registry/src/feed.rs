//! Change feed carrying entity change notifications to the relay

use homecord_core::ChangeEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Default channel capacity for change subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast feed of entity change notifications
///
/// Publishing with no live subscribers is not an error; the notification
/// is simply dropped. A subscriber that falls more than the channel
/// capacity behind observes `RecvError::Lagged` and skips ahead rather
/// than blocking the publisher.
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Create a feed with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a feed with a specific channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publish a change to all subscribers
    pub fn publish(&self, event: ChangeEvent) {
        trace!(entity_id = %event.entity_id, "Publishing change");
        // Ignore send errors - they just mean no active receivers
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
