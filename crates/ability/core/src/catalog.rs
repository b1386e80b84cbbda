//! Registry of known abilities.
//!
//! The catalog is assembled by the host before the engine starts and is read
//! only afterwards. Registration is where an ability's kind and capability set
//! are resolved, so lookups hand out an `Arc<RegisteredAbility>` that can be
//! cloned into scheduled tasks without touching the catalog again.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::ability::{Ability, AbilityKind, RegisteredAbility};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::types::AbilityKey;

#[derive(Debug)]
pub struct AbilityCatalog {
    abilities: HashMap<AbilityKey, Arc<RegisteredAbility>>,
    default_tick_period: u64,
}

impl AbilityCatalog {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            abilities: HashMap::new(),
            default_tick_period: config.default_tick_period,
        }
    }

    /// Register an ability.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidArgument`] for a blank key or zero tick period
    /// - [`EngineError::DuplicateAbility`] if the key is already taken
    pub fn register(
        &mut self,
        ability: impl Ability + 'static,
    ) -> Result<Arc<RegisteredAbility>, EngineError> {
        self.register_arc(Arc::new(ability))
    }

    /// Register an ability that is already shared.
    pub fn register_arc(
        &mut self,
        ability: Arc<dyn Ability>,
    ) -> Result<Arc<RegisteredAbility>, EngineError> {
        let registered = Arc::new(RegisteredAbility::new(ability, self.default_tick_period)?);
        let key = registered.key().clone();
        if self.abilities.contains_key(&key) {
            return Err(EngineError::DuplicateAbility(key));
        }

        debug!(
            target: "ability::catalog",
            ability = %key,
            kind = %registered.kind(),
            tick_period = registered.tick_period(),
            "registered ability"
        );
        self.abilities.insert(key, Arc::clone(&registered));
        Ok(registered)
    }

    pub fn get(&self, key: &str) -> Option<&Arc<RegisteredAbility>> {
        self.abilities.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.abilities.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &AbilityKey> + '_ {
        self.abilities.keys()
    }

    /// All registered abilities of the given kind.
    pub fn of_kind(&self, kind: AbilityKind) -> impl Iterator<Item = &Arc<RegisteredAbility>> + '_ {
        self.abilities.values().filter(move |a| a.kind() == kind)
    }
}

impl Default for AbilityCatalog {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
