//! Topic-based event bus for runtime events.
//!
//! Events are published to specific topics, and consumers subscribe only to
//! the topics they need. [`EventBridge`] turns engine lifecycle notifications
//! into events.

mod bridge;
mod bus;
mod types;

pub use bridge::EventBridge;
pub use bus::{Event, EventBus, Topic};
pub use types::{CallbackEvent, LifecycleEvent, SessionEvent};
