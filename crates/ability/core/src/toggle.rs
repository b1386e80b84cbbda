//! Toggle state per (actor, ability).
//!
//! Each pair is in one of three slots, or absent (INACTIVE):
//!
//! ```text
//!   absent ──reserve──▶ Activating ──commit──▶ Active ──begin_deactivate──▶ Deactivating
//!     ▲                    │                                                     │
//!     └──────release───────┘                                                     │
//!     └─────────────────────────────finish_deactivate────────────────────────────┘
//! ```
//!
//! Only `Active` counts as ACTIVE for queries, and only `Active` holds a
//! [`RecurringTask`], which keeps "task handle present iff active" structural.
//! The intermediate slots exist so callbacks can run without holding a map
//! lock while still excluding a second transition on the same pair: a pair
//! that is not absent cannot be reserved again.
//!
//! The store performs no callbacks and no scheduling; the
//! [`AbilityLifecycleCoordinator`](crate::AbilityLifecycleCoordinator) drives it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::ability::RegisteredAbility;
use crate::clock::TaskHandle;
use crate::types::{AbilityKey, ActorId, Tick};

/// The recurring on-tick task backing an ACTIVE toggle.
///
/// Owns the cancellation handle; the clock only runs the closure.
#[derive(Debug)]
pub struct RecurringTask {
    ability: Arc<RegisteredAbility>,
    handle: TaskHandle,
    period: u64,
    started_at: Tick,
    fired: Arc<AtomicU64>,
}

impl RecurringTask {
    pub fn new(
        ability: Arc<RegisteredAbility>,
        handle: TaskHandle,
        started_at: Tick,
        fired: Arc<AtomicU64>,
    ) -> Self {
        let period = ability.tick_period();
        Self {
            ability,
            handle,
            period,
            started_at,
            fired,
        }
    }

    pub fn ability(&self) -> &Arc<RegisteredAbility> {
        &self.ability
    }

    pub fn handle(&self) -> &TaskHandle {
        &self.handle
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn started_at(&self) -> Tick {
        self.started_at
    }

    /// Number of times the task has fired so far.
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Acquire)
    }
}

/// Read-only view of an ACTIVE toggle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleSnapshot {
    pub actor: ActorId,
    pub ability: AbilityKey,
    pub period: u64,
    pub started_at: Tick,
    pub fired: u64,
}

/// Ticket proving the caller owns an in-flight activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reservation(u64);

#[derive(Debug)]
enum Slot {
    Activating(Reservation),
    Active(RecurringTask),
    Deactivating,
}

#[derive(Debug, Default)]
pub struct ToggleStateStore {
    actors: DashMap<ActorId, HashMap<AbilityKey, Slot>>,
    next_reservation: AtomicU64,
}

impl ToggleStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Claims an absent pair for activation.
    ///
    /// Returns `None` if the pair is activating, active or deactivating.
    pub fn reserve(&self, actor: ActorId, key: &AbilityKey) -> Option<Reservation> {
        let mut slots = self.actors.entry(actor).or_default();
        if slots.contains_key(key) {
            return None;
        }
        let reservation = Reservation(self.next_reservation.fetch_add(1, Ordering::Relaxed));
        slots.insert(key.clone(), Slot::Activating(reservation));
        Some(reservation)
    }

    /// Publishes the task for a reserved pair, making it ACTIVE.
    ///
    /// If the reservation was revoked in the meantime (the actor was torn
    /// down) the task is handed back so the caller can unwind it.
    pub fn commit(
        &self,
        actor: ActorId,
        key: &AbilityKey,
        reservation: Reservation,
        task: RecurringTask,
    ) -> Result<(), RecurringTask> {
        let Some(mut slots) = self.actors.get_mut(&actor) else {
            return Err(task);
        };
        let Some(slot) = slots.get_mut(key) else {
            return Err(task);
        };
        if !matches!(*slot, Slot::Activating(r) if r == reservation) {
            return Err(task);
        }
        *slot = Slot::Active(task);
        Ok(())
    }

    /// Abandons a reservation. No-op if it was already revoked.
    pub fn release(&self, actor: ActorId, key: &AbilityKey, reservation: Reservation) {
        self.remove_where(actor, key, |slot| {
            matches!(slot, Slot::Activating(r) if *r == reservation)
        });
    }

    /// Moves an ACTIVE pair to deactivating and hands out its task.
    pub fn begin_deactivate(&self, actor: ActorId, key: &AbilityKey) -> Option<RecurringTask> {
        let mut slots = self.actors.get_mut(&actor)?;
        let slot = slots.get_mut(key)?;
        if !matches!(slot, Slot::Active(_)) {
            return None;
        }
        match std::mem::replace(slot, Slot::Deactivating) {
            Slot::Active(task) => Some(task),
            _ => None,
        }
    }

    /// Returns a deactivating pair to INACTIVE.
    pub fn finish_deactivate(&self, actor: ActorId, key: &AbilityKey) {
        self.remove_where(actor, key, |slot| matches!(slot, Slot::Deactivating));
    }

    /// Takes every ACTIVE task of `actor` and revokes in-flight activations.
    ///
    /// Done under a single lock on the actor's map, so no new activation for
    /// this actor can interleave with the drain.
    pub fn drain_actor(&self, actor: ActorId) -> Vec<RecurringTask> {
        let Some(mut slots) = self.actors.get_mut(&actor) else {
            return Vec::new();
        };
        let drained = Self::drain_slots(&mut slots);
        let emptied = slots.is_empty();
        drop(slots);

        if emptied {
            self.actors.remove_if(&actor, |_, slots| slots.is_empty());
        }
        drained
    }

    /// Drains every actor. Used on engine shutdown.
    pub fn drain_all(&self) -> Vec<(ActorId, RecurringTask)> {
        let mut drained = Vec::new();
        for mut entry in self.actors.iter_mut() {
            let actor = *entry.key();
            drained.extend(
                Self::drain_slots(entry.value_mut())
                    .into_iter()
                    .map(|task| (actor, task)),
            );
        }
        self.actors.retain(|_, slots| !slots.is_empty());
        drained
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn is_active(&self, actor: ActorId, key: &AbilityKey) -> bool {
        self.actors
            .get(&actor)
            .is_some_and(|slots| matches!(slots.get(key), Some(Slot::Active(_))))
    }

    /// Keys of the actor's ACTIVE toggles, read under one lock.
    pub fn active_keys(&self, actor: ActorId) -> BTreeSet<AbilityKey> {
        self.actors
            .get(&actor)
            .map(|slots| {
                slots
                    .iter()
                    .filter(|(_, slot)| matches!(slot, Slot::Active(_)))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn active_count(&self, actor: ActorId) -> usize {
        self.actors.get(&actor).map_or(0, |slots| {
            slots
                .values()
                .filter(|slot| matches!(slot, Slot::Active(_)))
                .count()
        })
    }

    pub fn snapshot(&self, actor: ActorId, key: &AbilityKey) -> Option<ToggleSnapshot> {
        let slots = self.actors.get(&actor)?;
        match slots.get(key)? {
            Slot::Active(task) => Some(ToggleSnapshot {
                actor,
                ability: key.clone(),
                period: task.period(),
                started_at: task.started_at(),
                fired: task.fired(),
            }),
            _ => None,
        }
    }

    /// Number of actors with at least one ACTIVE toggle.
    pub fn active_actor_count(&self) -> usize {
        self.actors
            .iter()
            .filter(|slots| slots.values().any(|slot| matches!(slot, Slot::Active(_))))
            .count()
    }

    /// ACTIVE toggles across all actors.
    pub fn total_active(&self) -> usize {
        self.actors
            .iter()
            .map(|slots| {
                slots
                    .values()
                    .filter(|slot| matches!(slot, Slot::Active(_)))
                    .count()
            })
            .sum()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn drain_slots(slots: &mut HashMap<AbilityKey, Slot>) -> Vec<RecurringTask> {
        let mut drained = Vec::new();
        slots.retain(|_, slot| {
            // Revoked: the activating caller sees its commit fail and unwinds.
            if matches!(*slot, Slot::Activating(_)) {
                return false;
            }
            if matches!(*slot, Slot::Active(_))
                && let Slot::Active(task) = std::mem::replace(slot, Slot::Deactivating)
            {
                drained.push(task);
            }
            true
        });
        drained
    }

    fn remove_where(&self, actor: ActorId, key: &AbilityKey, predicate: impl Fn(&Slot) -> bool) {
        let emptied = match self.actors.get_mut(&actor) {
            Some(mut slots) => {
                if slots.get(key).is_some_and(&predicate) {
                    slots.remove(key);
                }
                slots.is_empty()
            }
            None => false,
        };
        if emptied {
            self.actors.remove_if(&actor, |_, slots| slots.is_empty());
        }
    }
}
