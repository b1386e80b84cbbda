//! Runtime hosting for the ability state engine.
//!
//! This crate wires the synchronous `ability-core` components to a concrete
//! tick-driven clock, a tokio simulation worker and a topic-based event bus.
//! Hosts embed [`Runtime`] and talk to the engine through [`EngineHandle`].
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`api`] exposes the types downstream clients interact with
//! - [`events`] provides topic-based event bus for flexible event routing
//! - [`scheduler`] is the [`Clock`](ability_core::Clock) the engine runs on
//! - `workers` keeps background tasks internal to the crate
pub mod api;
pub mod events;
pub mod runtime;
pub mod scheduler;

mod engine;
mod workers;

pub use api::{EngineHandle, Result, RuntimeError};
pub use engine::UseOutcome;
pub use events::{
    CallbackEvent, Event, EventBridge, EventBus, LifecycleEvent, SessionEvent, Topic,
};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
pub use scheduler::TickScheduler;
pub use workers::{EngineMetrics, MetricsSnapshot};
