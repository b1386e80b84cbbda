//! Topic-based event bus implementation.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::types::{CallbackEvent, LifecycleEvent, SessionEvent};

/// Topics for event routing
#[derive(
    Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Topic {
    /// Ability uses and toggle transitions
    Lifecycle,
    /// Actor removal and store maintenance
    Session,
    /// Isolated callback failures
    Callback,
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Lifecycle(LifecycleEvent),
    Session(SessionEvent),
    Callback(CallbackEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Lifecycle(_) => Topic::Lifecycle,
            Event::Session(_) => Topic::Session,
            Event::Callback(_) => Topic::Callback,
        }
    }
}

struct Channels {
    lifecycle: broadcast::Sender<Event>,
    session: broadcast::Sender<Event>,
    callback: broadcast::Sender<Event>,
}

impl Channels {
    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Lifecycle => &self.lifecycle,
            Topic::Session => &self.session,
            Topic::Callback => &self.callback,
        }
    }
}

/// Topic-based event bus
///
/// Allows consumers to subscribe to specific topics and only receive
/// events they care about. Every topic channel exists from construction on,
/// so publishing and subscribing never lock.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<Channels>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            channels: Arc::new(Channels {
                lifecycle: broadcast::channel(capacity).0,
                session: broadcast::channel(capacity).0,
                callback: broadcast::channel(capacity).0,
            }),
        }
    }

    /// Publish an event to its corresponding topic
    ///
    /// Best-effort: an event with no subscribers is dropped.
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.channels.sender(topic).send(event).is_err() {
            tracing::trace!(target: "runtime::events", %topic, "no subscribers for topic");
        }
    }

    /// Subscribe to a specific topic
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.channels.sender(topic).subscribe()
    }

    /// Subscribe to multiple topics
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
