//! Actor teardown on removal.
//!
//! When an actor leaves the session the host calls
//! [`ActorSessionReaper::on_actor_removed`] exactly once, from the simulation
//! thread. Toggles are deactivated first (their `on_deactivate` still sees the
//! actor's cooldowns), then every cooldown entry and the override flag are
//! dropped. A second call finds nothing and does nothing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ability::DeactivationReason;
use crate::coordinator::AbilityLifecycleCoordinator;
use crate::cooldown::CooldownStore;
use crate::listener::LifecycleListener;
use crate::types::ActorId;

/// What a single reap tore down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReapSummary {
    pub deactivated: usize,
    pub cooldowns_cleared: usize,
}

impl ReapSummary {
    pub const fn is_empty(&self) -> bool {
        self.deactivated == 0 && self.cooldowns_cleared == 0
    }
}

pub struct ActorSessionReaper {
    coordinator: Arc<AbilityLifecycleCoordinator>,
    cooldowns: Arc<CooldownStore>,
    listener: Arc<dyn LifecycleListener>,
}

impl ActorSessionReaper {
    pub fn new(
        coordinator: Arc<AbilityLifecycleCoordinator>,
        cooldowns: Arc<CooldownStore>,
        listener: Arc<dyn LifecycleListener>,
    ) -> Self {
        Self {
            coordinator,
            cooldowns,
            listener,
        }
    }

    /// Tears down all ability state owned by `actor`. Idempotent.
    pub fn on_actor_removed(&self, actor: ActorId) -> ReapSummary {
        let deactivated = self
            .coordinator
            .deactivate_all_spells(actor, DeactivationReason::ActorRemoved);
        let cooldowns_cleared = self.cooldowns.clear_all(actor);
        let summary = ReapSummary {
            deactivated,
            cooldowns_cleared,
        };

        if summary.is_empty() {
            debug!(target: "ability::reaper", actor = %actor, "nothing to reap");
            return summary;
        }

        info!(
            target: "ability::reaper",
            actor = %actor,
            deactivated,
            cooldowns_cleared,
            "reaped actor state"
        );
        self.listener.actor_reaped(actor, &summary);
        summary
    }
}
