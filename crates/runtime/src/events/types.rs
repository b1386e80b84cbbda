//! Event types for different topics.

use serde::{Deserialize, Serialize};

use ability_core::{AbilityKey, ActorId, CallbackStage, DeactivationReason, ReapSummary, Tick};

/// Toggle transitions and ability uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// An instant or projectile ability was used.
    Used {
        actor: ActorId,
        ability: AbilityKey,
        tick: Tick,
        cooldown_ticks: u64,
    },

    /// A toggle became ACTIVE.
    Activated {
        actor: ActorId,
        ability: AbilityKey,
        tick: Tick,
    },

    /// A toggle returned to INACTIVE.
    Deactivated {
        actor: ActorId,
        ability: AbilityKey,
        reason: DeactivationReason,
        tick: Tick,
    },
}

/// Actor session bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// All ability state of a removed actor was torn down.
    ActorReaped { actor: ActorId, summary: ReapSummary },

    /// Periodic sweep of expired cooldown entries.
    CooldownsPurged { removed: usize, tick: Tick },
}

/// An ability callback failed and was isolated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackEvent {
    pub actor: ActorId,
    pub ability: AbilityKey,
    pub stage: CallbackStage,
    pub error: String,
    pub panicked: bool,
}
