//! Topic-based event bus.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::types::{Event, Topic};

/// Broadcast fan-out keyed by topic.
///
/// Consumers subscribe to the topics they care about; publishing never
/// blocks and events to topics without subscribers are dropped.
pub struct EventBus {
    channels: Arc<Channels>,
}

struct Channels {
    activation: broadcast::Sender<Event>,
    combat: broadcast::Sender<Event>,
    cooldown: broadcast::Sender<Event>,
    fault: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Capacity applies per topic.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Channels {
                activation: broadcast::channel(capacity).0,
                combat: broadcast::channel(capacity).0,
                cooldown: broadcast::channel(capacity).0,
                fault: broadcast::channel(capacity).0,
            }),
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Activation => &self.channels.activation,
            Topic::Combat => &self.channels.combat,
            Topic::Cooldown => &self.channels.cooldown,
            Topic::Fault => &self.channels.fault,
        }
    }

    /// Publish an event to its corresponding topic.
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.sender(topic).send(event).is_err() {
            // No subscribers on this topic; normal, not an error.
            tracing::trace!(?topic, "no subscribers for topic");
        }
    }

    /// Subscribe to a single topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.sender(topic).subscribe()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self { channels: Arc::clone(&self.channels) }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
