//! Engine assembly and the ability-use pipeline.
//!
//! [`Engine`] owns one instance of every core component, wired together by
//! constructor injection. It is shared between the simulation worker, which
//! performs every mutation that may run an ability callback, and
//! [`EngineHandle`](crate::EngineHandle), which reads the concurrent stores
//! directly from whatever thread it lives on.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ability_core::{
    AbilityCatalog, AbilityKey, AbilityLifecycleCoordinator, ActorId, ActorSessionReaper, Clock,
    CooldownStore, DeactivationReason, EngineConfig, ReapSummary, RegisteredAbility, Tick,
    ToggleStateStore,
};

use crate::api::{Result, RuntimeError};
use crate::events::{Event, EventBridge, EventBus, LifecycleEvent, SessionEvent};
use crate::scheduler::TickScheduler;
use crate::workers::EngineMetrics;

/// Result of an ability-use request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UseOutcome {
    /// An instant or projectile ability fired.
    Used,
    /// A toggleable ability changed state; `active` is the new state.
    Toggled { active: bool },
    /// The ability is cooling down for this actor.
    OnCooldown { remaining: u64 },
    /// The guard refused or a callback failed; nothing changed.
    Rejected,
}

pub(crate) struct Engine {
    catalog: Arc<AbilityCatalog>,
    scheduler: Arc<TickScheduler>,
    cooldowns: Arc<CooldownStore>,
    coordinator: Arc<AbilityLifecycleCoordinator>,
    reaper: ActorSessionReaper,
    metrics: Arc<EngineMetrics>,
    bus: EventBus,
}

impl Engine {
    pub(crate) fn new(config: &EngineConfig, catalog: AbilityCatalog, bus: EventBus) -> Self {
        let scheduler = Arc::new(TickScheduler::new());
        let metrics = Arc::new(EngineMetrics::new(config.max_timing_samples));
        let listener = Arc::new(EventBridge::new(bus.clone(), Arc::clone(&metrics)));
        let cooldowns = Arc::new(CooldownStore::new());
        let coordinator = Arc::new(AbilityLifecycleCoordinator::new(
            scheduler.clone(),
            Arc::new(ToggleStateStore::new()),
            listener.clone(),
        ));
        let reaper =
            ActorSessionReaper::new(Arc::clone(&coordinator), Arc::clone(&cooldowns), listener);

        let engine = Self {
            catalog: Arc::new(catalog),
            scheduler,
            cooldowns,
            coordinator,
            reaper,
            metrics,
            bus,
        };
        engine.schedule_purge(config.cooldown_purge_interval);
        engine
    }

    // ------------------------------------------------------------------
    // Worker-side mutations
    // ------------------------------------------------------------------

    /// Cooldown gate, then toggle or fire, then cooldown.
    pub(crate) fn use_ability(
        &self,
        actor: ActorId,
        key: &str,
        cooldown_ticks: u64,
    ) -> Result<UseOutcome> {
        let started = Instant::now();
        let ability = self.lookup(key)?;
        let key = ability.key();
        let now = self.scheduler.now();

        if self.cooldowns.is_on_cooldown(actor, key, now) {
            let remaining = self.cooldowns.remaining_ticks(actor, key, now);
            self.metrics.record_cooldown_rejection();
            debug!(
                target: "runtime::worker",
                actor = %actor,
                ability = %key,
                remaining,
                "ability on cooldown"
            );
            return Ok(UseOutcome::OnCooldown { remaining });
        }

        let outcome = if ability.is_toggleable() {
            match self.coordinator.toggle(actor, &ability) {
                Ok(true) => UseOutcome::Toggled {
                    active: self.coordinator.is_spell_active(actor, &ability),
                },
                Ok(false) => UseOutcome::Rejected,
                Err(err) => {
                    self.metrics.record_failed_use();
                    return Err(err.into());
                }
            }
        } else if self.coordinator.fire(actor, &ability) {
            self.bus.publish(Event::Lifecycle(LifecycleEvent::Used {
                actor,
                ability: key.clone(),
                tick: now,
                cooldown_ticks,
            }));
            UseOutcome::Used
        } else {
            UseOutcome::Rejected
        };

        if outcome == UseOutcome::Rejected {
            self.metrics.record_failed_use();
            return Ok(outcome);
        }
        if cooldown_ticks > 0 {
            self.cooldowns.set(actor, key.clone(), now + cooldown_ticks);
        }
        self.metrics.record_use(started.elapsed());
        Ok(outcome)
    }

    pub(crate) fn deactivate(&self, actor: ActorId, key: &str) -> Result<bool> {
        let ability = self.lookup(key)?;
        Ok(self.coordinator.deactivate(actor, &ability))
    }

    pub(crate) fn actor_removed(&self, actor: ActorId) -> ReapSummary {
        self.reaper.on_actor_removed(actor)
    }

    /// Processes one tick. Returns the new tick.
    pub(crate) fn tick(&self) -> Tick {
        let started = Instant::now();
        let ran = self.scheduler.advance();
        self.metrics.record_tick(started.elapsed(), ran);
        self.scheduler.now()
    }

    /// Deactivates every toggle and stops the scheduler.
    pub(crate) fn shutdown(&self) -> usize {
        let deactivated = self
            .coordinator
            .deactivate_everything(DeactivationReason::Shutdown);
        self.scheduler.shutdown();
        deactivated
    }

    // ------------------------------------------------------------------
    // Shared read access
    // ------------------------------------------------------------------

    pub(crate) fn now(&self) -> Tick {
        self.scheduler.now()
    }

    pub(crate) fn catalog(&self) -> &AbilityCatalog {
        &self.catalog
    }

    pub(crate) fn cooldowns(&self) -> &CooldownStore {
        &self.cooldowns
    }

    pub(crate) fn coordinator(&self) -> &AbilityLifecycleCoordinator {
        &self.coordinator
    }

    pub(crate) fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn lookup(&self, key: &str) -> Result<Arc<RegisteredAbility>> {
        let key = AbilityKey::new(key)?;
        self.catalog
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownAbility(key.to_string()))
    }

    fn schedule_purge(&self, interval: u64) {
        if interval == 0 {
            debug!(target: "runtime::worker", "cooldown purge disabled");
            return;
        }
        let cooldowns = Arc::clone(&self.cooldowns);
        let metrics = Arc::clone(&self.metrics);
        let bus = self.bus.clone();
        let scheduled = self.scheduler.schedule_repeating(
            interval,
            Box::new(move |tick: Tick| {
                let removed = cooldowns.purge_expired(tick);
                if removed > 0 {
                    metrics.record_purge(removed);
                    bus.publish(Event::Session(SessionEvent::CooldownsPurged { removed, tick }));
                }
            }),
        );
        if let Err(error) = scheduled {
            warn!(
                target: "runtime::worker",
                error = %error,
                "failed to schedule cooldown purge"
            );
        }
    }
}
