//! Player-scoped ability state engine.
//!
//! `ability-core` owns the bookkeeping that gates and drives abilities for
//! session-scoped actors: per-actor cooldowns, toggleable abilities with a
//! recurring per-tick effect, and the teardown that runs when an actor leaves.
//! Nothing here blocks or spawns; every operation is an in-memory lookup or
//! mutation, and recurring work is handed to a host-supplied [`Clock`].
//!
//! Modules are organized by responsibility:
//! - [`types`] holds the identifiers and the tick newtype
//! - [`ability`] and [`catalog`] describe what an ability can do
//! - [`clock`] is the scheduling contract consumed by the engine
//! - [`cooldown`] and [`toggle`] are the two shared mutable stores
//! - [`coordinator`] drives toggle transitions and callbacks
//! - [`reaper`] tears an actor's state down on removal
//! - [`listener`] is the notification seam hosts use for logging and events
pub mod ability;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod cooldown;
pub mod error;
pub mod listener;
pub mod reaper;
pub mod toggle;
pub mod types;

mod callback;

#[cfg(test)]
pub(crate) mod testing;

pub use ability::{
    Ability, AbilityContext, AbilityKind, CallbackError, CallbackStage, Capabilities,
    DeactivationReason, RegisteredAbility,
};
pub use catalog::AbilityCatalog;
pub use clock::{Clock, OnceTask, RepeatingTask, ScheduleError, TaskHandle, TaskId};
pub use config::EngineConfig;
pub use cooldown::{CooldownStats, CooldownStore};
pub use coordinator::AbilityLifecycleCoordinator;
pub use error::{EngineError, ErrorSeverity, Fault};
pub use listener::{LifecycleListener, NoopListener};
pub use reaper::{ActorSessionReaper, ReapSummary};
pub use toggle::{RecurringTask, ToggleSnapshot, ToggleStateStore};
pub use types::{AbilityKey, ActorId, Tick};
