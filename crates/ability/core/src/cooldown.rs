//! Per-actor cooldown tracking.
//!
//! Entries are `(actor, ability) -> expiry tick`. An entry is live while
//! `expiry > now` and inert afterwards; inert entries are dropped lazily on
//! lookup and in bulk by [`CooldownStore::purge_expired`].
//!
//! # Concurrency
//!
//! Entries are sharded by actor in a [`DashMap`], so lookups for different
//! actors never contend and an actor's whole map is removed in one step by
//! [`CooldownStore::clear_all`]. Readers see either the full map or nothing.
//!
//! # Override
//!
//! An actor with cooldowns disabled is never on cooldown and always has zero
//! ticks remaining. The flag is checked before any entry lookup and leaves the
//! entries untouched, so re-enabling restores whatever is still live.

use std::collections::HashMap;

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::types::{AbilityKey, ActorId, Tick};

/// Point-in-time size of the cooldown store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownStats {
    /// Actors with at least one stored entry.
    pub actors: usize,
    /// Stored entries, live or not yet purged.
    pub entries: usize,
    /// Actors with the override flag set.
    pub disabled: usize,
}

#[derive(Debug, Default)]
pub struct CooldownStore {
    entries: DashMap<ActorId, HashMap<AbilityKey, Tick>>,
    disabled: DashSet<ActorId>,
}

impl CooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true iff cooldowns are enforced for `actor` and a live entry exists.
    pub fn is_on_cooldown(&self, actor: ActorId, key: &AbilityKey, now: Tick) -> bool {
        if self.is_cooldown_disabled(actor) {
            return false;
        }
        self.live_expiry(actor, key, now).is_some()
    }

    /// Ticks left before `key` is usable again, or zero.
    pub fn remaining_ticks(&self, actor: ActorId, key: &AbilityKey, now: Tick) -> u64 {
        if self.is_cooldown_disabled(actor) {
            return 0;
        }
        self.live_expiry(actor, key, now)
            .map_or(0, |expiry| now.ticks_until(expiry))
    }

    /// Inserts or overwrites the entry.
    ///
    /// The expiry is not checked against the current tick; an expiry in the
    /// past simply produces an inert entry.
    pub fn set(&self, actor: ActorId, key: AbilityKey, expiry: Tick) {
        trace!(
            target: "ability::cooldown",
            actor = %actor,
            ability = %key,
            expiry = expiry.get(),
            "cooldown set"
        );
        self.entries.entry(actor).or_default().insert(key, expiry);
    }

    /// Removes a single entry. No-op when absent.
    pub fn clear(&self, actor: ActorId, key: &AbilityKey) {
        let emptied = match self.entries.get_mut(&actor) {
            Some(mut map) => {
                map.remove(key);
                map.is_empty()
            }
            None => false,
        };
        if emptied {
            self.entries.remove_if(&actor, |_, map| map.is_empty());
        }
    }

    /// Removes every entry for `actor` and drops its override flag.
    ///
    /// Idempotent. Returns the number of entries removed.
    pub fn clear_all(&self, actor: ActorId) -> usize {
        let removed = self
            .entries
            .remove(&actor)
            .map_or(0, |(_, map)| map.len());
        let had_override = self.disabled.remove(&actor).is_some();

        if removed > 0 || had_override {
            debug!(
                target: "ability::cooldown",
                actor = %actor,
                removed,
                had_override,
                "cleared actor cooldowns"
            );
        }
        removed
    }

    pub fn set_cooldown_disabled(&self, actor: ActorId, disabled: bool) {
        if disabled {
            self.disabled.insert(actor);
        } else {
            self.disabled.remove(&actor);
        }
    }

    pub fn is_cooldown_disabled(&self, actor: ActorId) -> bool {
        self.disabled.contains(&actor)
    }

    /// Physically removes every inert entry and empty actor map.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self, now: Tick) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, map| {
            let before = map.len();
            map.retain(|_, expiry| *expiry > now);
            removed += before - map.len();
            !map.is_empty()
        });

        if removed > 0 {
            debug!(
                target: "ability::cooldown",
                removed,
                tick = now.get(),
                "purged expired cooldowns"
            );
        }
        removed
    }

    pub fn stats(&self) -> CooldownStats {
        let mut stats = CooldownStats {
            disabled: self.disabled.len(),
            ..CooldownStats::default()
        };
        for map in self.entries.iter() {
            stats.actors += 1;
            stats.entries += map.len();
        }
        stats
    }

    /// Expiry of a live entry; evicts the entry if it has lapsed.
    fn live_expiry(&self, actor: ActorId, key: &AbilityKey, now: Tick) -> Option<Tick> {
        let expiry = self
            .entries
            .get(&actor)
            .and_then(|map| map.get(key).copied())?;
        if expiry > now {
            return Some(expiry);
        }
        self.evict_if_expired(actor, key, now);
        None
    }

    fn evict_if_expired(&self, actor: ActorId, key: &AbilityKey, now: Tick) {
        let emptied = match self.entries.get_mut(&actor) {
            Some(mut map) => {
                // Re-check under the write guard: a concurrent `set` may have
                // renewed the entry since it was read.
                if map.get(key).is_some_and(|expiry| *expiry <= now) {
                    map.remove(key);
                }
                map.is_empty()
            }
            None => false,
        };
        if emptied {
            self.entries.remove_if(&actor, |_, map| map.is_empty());
        }
    }
}
