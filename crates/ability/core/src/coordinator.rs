//! Toggle lifecycle orchestration.
//!
//! [`AbilityLifecycleCoordinator`] decides whether a toggle transition is
//! legal, runs the ability's callbacks in the required order and keeps the
//! [`ToggleStateStore`] and the [`Clock`] in agreement.
//!
//! # Activation
//!
//! 1. Reject non-toggleable abilities and failing guards (`Ok(false)`)
//! 2. Reserve the pair; a pair that is not INACTIVE cannot be reserved, which
//!    is what rules out a second recurring task
//! 3. Run `on_activate`, synchronously, before anything is scheduled
//! 4. Schedule the recurring `on_tick` task
//! 5. Commit the task into the store
//!
//! A failing `on_activate` releases the reservation. A scheduling failure
//! releases it too and runs `on_deactivate` with
//! [`DeactivationReason::Rollback`] to undo step 3. If the actor was reaped
//! while steps 3-4 ran, the commit is refused and the fresh task is cancelled.
//!
//! # Deactivation
//!
//! The task is cancelled first, then `on_deactivate` runs, then the pair
//! returns to INACTIVE. The pair reaches INACTIVE even when the callback
//! fails, and batch deactivation never stops on one ability's failure.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::ability::{
    AbilityContext, CallbackError, CallbackStage, Capabilities, DeactivationReason,
    RegisteredAbility,
};
use crate::callback::isolate;
use crate::clock::{Clock, RepeatingTask};
use crate::error::EngineError;
use crate::listener::LifecycleListener;
use crate::toggle::{RecurringTask, ToggleStateStore};
use crate::types::{AbilityKey, ActorId, Tick};

pub struct AbilityLifecycleCoordinator {
    clock: Arc<dyn Clock>,
    toggles: Arc<ToggleStateStore>,
    listener: Arc<dyn LifecycleListener>,
}

impl AbilityLifecycleCoordinator {
    pub fn new(
        clock: Arc<dyn Clock>,
        toggles: Arc<ToggleStateStore>,
        listener: Arc<dyn LifecycleListener>,
    ) -> Self {
        Self {
            clock,
            toggles,
            listener,
        }
    }

    pub fn toggles(&self) -> &Arc<ToggleStateStore> {
        &self.toggles
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// INACTIVE -> ACTIVE.
    ///
    /// Returns `Ok(false)` without any state change when the ability is not
    /// toggleable, the guard refuses, the pair is not INACTIVE, or
    /// `on_activate` fails.
    ///
    /// # Errors
    ///
    /// [`EngineError::Schedule`] when the clock refuses the recurring task.
    /// The activation has been rolled back by the time this is returned.
    pub fn activate(
        &self,
        actor: ActorId,
        ability: &Arc<RegisteredAbility>,
    ) -> Result<bool, EngineError> {
        if !ability.is_toggleable() {
            return Ok(false);
        }
        let key = ability.key();
        let ctx = AbilityContext::new(actor, self.clock.now());

        if !self.guard_allows(ability, &ctx) {
            debug!(
                target: "ability::toggle",
                actor = %actor,
                ability = %key,
                "activation refused by guard"
            );
            return Ok(false);
        }

        let Some(reservation) = self.toggles.reserve(actor, key) else {
            debug!(
                target: "ability::toggle",
                actor = %actor,
                ability = %key,
                "activation rejected, toggle not inactive"
            );
            return Ok(false);
        };

        if ability.has(Capabilities::ACTIVATABLE)
            && let Err(error) = isolate(|| ability.ability().on_activate(&ctx))
        {
            self.report(actor, key, CallbackStage::Activate, &error);
            self.toggles.release(actor, key, reservation);
            return Ok(false);
        }

        let fired = Arc::new(AtomicU64::new(0));
        let handle = match self.clock.schedule_repeating(
            ability.tick_period(),
            self.tick_task(actor, ability, Arc::clone(&fired)),
        ) {
            Ok(handle) => handle,
            Err(source) => {
                warn!(
                    target: "ability::toggle",
                    actor = %actor,
                    ability = %key,
                    error = %source,
                    "failed to schedule toggle task, rolling back"
                );
                self.toggles.release(actor, key, reservation);
                self.run_deactivate(ability, &ctx, DeactivationReason::Rollback);
                return Err(EngineError::Schedule {
                    ability: key.clone(),
                    source,
                });
            }
        };

        let task = RecurringTask::new(Arc::clone(ability), handle, ctx.tick, fired);
        if let Err(orphan) = self.toggles.commit(actor, key, reservation, task) {
            debug!(
                target: "ability::toggle",
                actor = %actor,
                ability = %key,
                "actor removed during activation, unwinding"
            );
            self.clock.cancel(orphan.handle());
            self.run_deactivate(ability, &ctx, DeactivationReason::ActorRemoved);
            return Ok(false);
        }

        debug!(
            target: "ability::toggle",
            actor = %actor,
            ability = %key,
            period = ability.tick_period(),
            "toggle activated"
        );
        self.listener.activated(actor, key, ctx.tick);
        Ok(true)
    }

    /// ACTIVE -> INACTIVE at the actor's request.
    ///
    /// Returns `false` when the ability is not toggleable or not ACTIVE.
    pub fn deactivate(&self, actor: ActorId, ability: &RegisteredAbility) -> bool {
        if !ability.is_toggleable() {
            return false;
        }
        self.deactivate_key(actor, ability.key(), DeactivationReason::Requested)
    }

    /// ACTIVE -> INACTIVE by key.
    pub fn deactivate_key(
        &self,
        actor: ActorId,
        key: &AbilityKey,
        reason: DeactivationReason,
    ) -> bool {
        match self.toggles.begin_deactivate(actor, key) {
            Some(task) => {
                self.finish(actor, task, reason);
                true
            }
            None => false,
        }
    }

    /// Deactivates if ACTIVE, activates otherwise.
    pub fn toggle(
        &self,
        actor: ActorId,
        ability: &Arc<RegisteredAbility>,
    ) -> Result<bool, EngineError> {
        if !ability.is_toggleable() {
            return Ok(false);
        }
        if self.toggles.is_active(actor, ability.key()) {
            return Ok(self.deactivate(actor, ability));
        }
        self.activate(actor, ability)
    }

    /// One-shot use of an instant or projectile ability: guard, then
    /// `on_activate`. No state is stored.
    ///
    /// Returns `false` for toggleable abilities, a refusing guard or a failed
    /// callback.
    pub fn fire(&self, actor: ActorId, ability: &RegisteredAbility) -> bool {
        if ability.is_toggleable() {
            return false;
        }
        let ctx = AbilityContext::new(actor, self.clock.now());
        if !self.guard_allows(ability, &ctx) {
            return false;
        }
        if ability.has(Capabilities::ACTIVATABLE)
            && let Err(error) = isolate(|| ability.ability().on_activate(&ctx))
        {
            self.report(actor, ability.key(), CallbackStage::Activate, &error);
            return false;
        }
        true
    }

    /// Deactivates every ACTIVE toggle of `actor`.
    ///
    /// Returns how many toggles were deactivated.
    pub fn deactivate_all_spells(&self, actor: ActorId, reason: DeactivationReason) -> usize {
        let drained = self.toggles.drain_actor(actor);
        let count = drained.len();
        for task in drained {
            self.finish(actor, task, reason);
        }
        count
    }

    /// Deactivates every ACTIVE toggle of every actor.
    pub fn deactivate_everything(&self, reason: DeactivationReason) -> usize {
        let drained = self.toggles.drain_all();
        let count = drained.len();
        for (actor, task) in drained {
            self.finish(actor, task, reason);
        }
        if count > 0 {
            debug!(
                target: "ability::toggle",
                count,
                reason = %reason,
                "deactivated all toggles"
            );
        }
        count
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn is_spell_active(&self, actor: ActorId, ability: &RegisteredAbility) -> bool {
        ability.is_toggleable() && self.toggles.is_active(actor, ability.key())
    }

    pub fn active_spells(&self, actor: ActorId) -> BTreeSet<AbilityKey> {
        self.toggles.active_keys(actor)
    }

    pub fn active_spell_count(&self, actor: ActorId) -> usize {
        self.toggles.active_count(actor)
    }

    /// How often the active toggle has fired, or `None` when not ACTIVE.
    pub fn ticks_fired(&self, actor: ActorId, key: &AbilityKey) -> Option<u64> {
        self.toggles.snapshot(actor, key).map(|snapshot| snapshot.fired)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn guard_allows(&self, ability: &RegisteredAbility, ctx: &AbilityContext) -> bool {
        if !ability.has(Capabilities::GUARDABLE) {
            return true;
        }
        match isolate(|| ability.ability().can_toggle(ctx)) {
            Ok(allowed) => allowed,
            Err(error) => {
                self.report(ctx.actor, ability.key(), CallbackStage::Guard, &error);
                false
            }
        }
    }

    fn tick_task(
        &self,
        actor: ActorId,
        ability: &Arc<RegisteredAbility>,
        fired: Arc<AtomicU64>,
    ) -> RepeatingTask {
        let ability = Arc::clone(ability);
        let listener = Arc::clone(&self.listener);
        Box::new(move |tick: Tick| {
            fired.fetch_add(1, Ordering::AcqRel);
            if !ability.has(Capabilities::TICKABLE) {
                return;
            }
            let ctx = AbilityContext::new(actor, tick);
            if let Err(error) = isolate(|| ability.ability().on_tick(&ctx)) {
                warn!(
                    target: "ability::toggle",
                    actor = %actor,
                    ability = %ability.key(),
                    stage = %CallbackStage::Tick,
                    error = %error,
                    "ability callback failed"
                );
                listener.callback_failed(actor, ability.key(), CallbackStage::Tick, &error);
            }
        })
    }

    fn finish(&self, actor: ActorId, task: RecurringTask, reason: DeactivationReason) {
        let ability = Arc::clone(task.ability());
        let key = ability.key();
        let ctx = AbilityContext::new(actor, self.clock.now());

        self.clock.cancel(task.handle());
        self.run_deactivate(&ability, &ctx, reason);
        self.toggles.finish_deactivate(actor, key);

        debug!(
            target: "ability::toggle",
            actor = %actor,
            ability = %key,
            reason = %reason,
            fired = task.fired(),
            "toggle deactivated"
        );
        self.listener.deactivated(actor, key, reason, ctx.tick);
    }

    fn run_deactivate(
        &self,
        ability: &RegisteredAbility,
        ctx: &AbilityContext,
        reason: DeactivationReason,
    ) {
        if !ability.has(Capabilities::DEACTIVATABLE) {
            return;
        }
        if let Err(error) = isolate(|| ability.ability().on_deactivate(ctx, reason)) {
            self.report(ctx.actor, ability.key(), CallbackStage::Deactivate, &error);
        }
    }

    fn report(
        &self,
        actor: ActorId,
        key: &AbilityKey,
        stage: CallbackStage,
        error: &CallbackError,
    ) {
        warn!(
            target: "ability::toggle",
            actor = %actor,
            ability = %key,
            stage = %stage,
            error = %error,
            "ability callback failed"
        );
        self.listener.callback_failed(actor, key, stage, error);
    }
}
