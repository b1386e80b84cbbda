//! Cloneable façade for issuing commands to the engine.
//!
//! [`EngineHandle`] hides channel plumbing. Anything that may run an ability
//! callback is sent to the simulation worker and awaited; cooldown and toggle
//! queries read the concurrent stores directly and never wait on the worker.
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use ability_core::{AbilityKey, ActorId, CooldownStats, ReapSummary, Tick};

use super::errors::{Result, RuntimeError};
use crate::engine::{Engine, UseOutcome};
use crate::events::{Event, EventBus, Topic};
use crate::workers::{Command, MetricsSnapshot};

/// Client-facing handle to interact with the engine
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<Command>,
    engine: Arc<Engine>,
}

impl EngineHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, engine: Arc<Engine>) -> Self {
        Self { command_tx, engine }
    }

    // ------------------------------------------------------------------
    // Commands (run on the simulation worker)
    // ------------------------------------------------------------------

    /// Attempt to use an ability.
    ///
    /// A successful use starts a cooldown of `cooldown_ticks` (none when zero).
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::Engine`] with an invalid-argument error for a blank key
    /// - [`RuntimeError::UnknownAbility`] when the key is not in the catalog
    /// - [`RuntimeError::Engine`] with a schedule error if activation had to be
    ///   rolled back
    pub async fn use_ability(
        &self,
        actor: ActorId,
        ability: &str,
        cooldown_ticks: u64,
    ) -> Result<UseOutcome> {
        self.request(|reply| Command::UseAbility {
            actor,
            ability: ability.to_string(),
            cooldown_ticks,
            reply,
        })
        .await?
    }

    /// Deactivate a toggle. Returns `false` if it was not ACTIVE.
    pub async fn deactivate(&self, actor: ActorId, ability: &str) -> Result<bool> {
        self.request(|reply| Command::Deactivate {
            actor,
            ability: ability.to_string(),
            reply,
        })
        .await?
    }

    /// Tear down all ability state of a disconnected or despawned actor.
    pub async fn actor_removed(&self, actor: ActorId) -> Result<ReapSummary> {
        self.request(|reply| Command::ActorRemoved { actor, reply })
            .await
    }

    /// Advance the clock by `ticks`. Returns the tick reached.
    pub async fn step(&self, ticks: u64) -> Result<Tick> {
        self.request(|reply| Command::Step { ticks, reply }).await
    }

    pub(crate) async fn shutdown(&self) -> Result<usize> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    // ------------------------------------------------------------------
    // Queries (lock-free reads, callable from any thread)
    // ------------------------------------------------------------------

    /// Current authoritative tick.
    pub fn now(&self) -> Tick {
        self.engine.now()
    }

    pub fn is_on_cooldown(&self, actor: ActorId, ability: &str) -> Result<bool> {
        let key = AbilityKey::new(ability)?;
        Ok(self
            .engine
            .cooldowns()
            .is_on_cooldown(actor, &key, self.now()))
    }

    pub fn remaining_ticks(&self, actor: ActorId, ability: &str) -> Result<u64> {
        let key = AbilityKey::new(ability)?;
        Ok(self
            .engine
            .cooldowns()
            .remaining_ticks(actor, &key, self.now()))
    }

    pub fn clear_cooldown(&self, actor: ActorId, ability: &str) -> Result<()> {
        let key = AbilityKey::new(ability)?;
        self.engine.cooldowns().clear(actor, &key);
        Ok(())
    }

    pub fn set_cooldown_disabled(&self, actor: ActorId, disabled: bool) {
        self.engine.cooldowns().set_cooldown_disabled(actor, disabled);
    }

    pub fn is_cooldown_disabled(&self, actor: ActorId) -> bool {
        self.engine.cooldowns().is_cooldown_disabled(actor)
    }

    pub fn cooldown_stats(&self) -> CooldownStats {
        self.engine.cooldowns().stats()
    }

    pub fn is_spell_active(&self, actor: ActorId, ability: &str) -> Result<bool> {
        let key = AbilityKey::new(ability)?;
        Ok(self.engine.coordinator().toggles().is_active(actor, &key))
    }

    pub fn active_spells(&self, actor: ActorId) -> BTreeSet<AbilityKey> {
        self.engine.coordinator().active_spells(actor)
    }

    pub fn active_spell_count(&self, actor: ActorId) -> usize {
        self.engine.coordinator().active_spell_count(actor)
    }

    /// How often an ACTIVE toggle has fired, or `None` when it is not ACTIVE.
    pub fn ticks_fired(&self, actor: ActorId, ability: &str) -> Result<Option<u64>> {
        let key = AbilityKey::new(ability)?;
        Ok(self.engine.coordinator().ticks_fired(actor, &key))
    }

    /// Actors with at least one ACTIVE toggle.
    pub fn active_actor_count(&self) -> usize {
        self.engine.coordinator().toggles().active_actor_count()
    }

    /// ACTIVE toggles across all actors.
    pub fn total_active(&self) -> usize {
        self.engine.coordinator().toggles().total_active()
    }

    /// Registered ability keys, sorted.
    pub fn abilities(&self) -> Vec<AbilityKey> {
        let mut keys: Vec<_> = self.engine.catalog().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.engine.metrics().snapshot()
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Lifecycle` - Ability uses and toggle transitions
    /// - `Topic::Session` - Actor reaping and cooldown purges
    /// - `Topic::Callback` - Isolated callback failures
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.engine.bus().subscribe(topic)
    }

    /// Subscribe to multiple topics at once
    pub fn subscribe_multiple(&self, topics: &[Topic]) -> HashMap<Topic, broadcast::Receiver<Event>> {
        self.engine.bus().subscribe_multiple(topics)
    }

    /// Get a reference to the event bus for advanced usage
    pub fn event_bus(&self) -> &EventBus {
        self.engine.bus()
    }
}
