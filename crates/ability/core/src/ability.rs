//! Ability capability model.
//!
//! Concrete abilities implement [`Ability`]. What an ability can do is
//! resolved exactly once, when it is wrapped in a [`RegisteredAbility`]; the
//! hot path only ever inspects the cached [`AbilityKind`] and
//! [`Capabilities`], never the trait object itself.
//!
//! # Callbacks
//!
//! | Capability      | Callback                        |
//! |-----------------|---------------------------------|
//! | `ACTIVATABLE`   | [`Ability::on_activate`]        |
//! | `TICKABLE`      | [`Ability::on_tick`]            |
//! | `DEACTIVATABLE` | [`Ability::on_deactivate`]      |
//! | `GUARDABLE`     | [`Ability::can_toggle`]         |
//!
//! A callback whose capability bit is absent is never invoked.

use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{AbilityKey, ActorId, Tick};

/// How an ability behaves once used.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum AbilityKind {
    /// Fires once per use.
    Instant,
    /// Persistent ACTIVE/INACTIVE state with a recurring per-tick effect.
    Toggleable,
    /// Fires once and hands off to a projectile simulation owned elsewhere.
    Projectile,
}

bitflags! {
    /// Callback set an ability participates in.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        const ACTIVATABLE = 1 << 0;
        const TICKABLE = 1 << 1;
        const DEACTIVATABLE = 1 << 2;
        const GUARDABLE = 1 << 3;
    }
}

impl Capabilities {
    /// Full callback set of a toggleable ability.
    pub const TOGGLE: Self = Self::ACTIVATABLE
        .union(Self::TICKABLE)
        .union(Self::DEACTIVATABLE)
        .union(Self::GUARDABLE);
}

/// Lifecycle stage a callback belongs to. Used when reporting failures.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CallbackStage {
    Guard,
    Activate,
    Tick,
    Deactivate,
}

/// Why a toggle left the ACTIVE state.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeactivationReason {
    /// The actor asked for it (toggle or explicit deactivate).
    Requested,
    /// The actor disconnected or despawned.
    ActorRemoved,
    /// The host is shutting the engine down.
    Shutdown,
    /// Activation could not be completed and was undone.
    Rollback,
}

/// Snapshot handed to every callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityContext {
    pub actor: ActorId,
    pub tick: Tick,
}

impl AbilityContext {
    pub const fn new(actor: ActorId, tick: Tick) -> Self {
        Self { actor, tick }
    }
}

/// Failure raised by an ability callback.
///
/// Panics inside callbacks are caught and converted to [`CallbackError::Panicked`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CallbackError {
    #[error("{0}")]
    Failed(String),

    #[error("callback panicked: {0}")]
    Panicked(String),
}

impl CallbackError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

/// Content-side ability implementation.
///
/// Only [`key`](Ability::key) and [`kind`](Ability::kind) are required; every
/// callback defaults to a no-op that succeeds.
pub trait Ability: Send + Sync {
    /// Catalog key. Must be non-blank.
    fn key(&self) -> &str;

    fn kind(&self) -> AbilityKind;

    /// Callback set this ability takes part in.
    ///
    /// Defaults to the full toggle set for toggleable abilities and
    /// `on_activate` alone for one-shot kinds.
    fn capabilities(&self) -> Capabilities {
        match self.kind() {
            AbilityKind::Toggleable => Capabilities::TOGGLE,
            AbilityKind::Instant | AbilityKind::Projectile => Capabilities::ACTIVATABLE,
        }
    }

    /// Ticks between `on_tick` invocations while active. `None` uses the
    /// catalog default.
    fn tick_period(&self) -> Option<u64> {
        None
    }

    /// Guard consulted before an INACTIVE -> ACTIVE transition.
    fn can_toggle(&self, _ctx: &AbilityContext) -> Result<bool, CallbackError> {
        Ok(true)
    }

    fn on_activate(&self, _ctx: &AbilityContext) -> Result<(), CallbackError> {
        Ok(())
    }

    fn on_tick(&self, _ctx: &AbilityContext) -> Result<(), CallbackError> {
        Ok(())
    }

    fn on_deactivate(
        &self,
        _ctx: &AbilityContext,
        _reason: DeactivationReason,
    ) -> Result<(), CallbackError> {
        Ok(())
    }
}

/// An ability whose kind, capabilities and cadence were resolved at registration.
pub struct RegisteredAbility {
    key: AbilityKey,
    kind: AbilityKind,
    capabilities: Capabilities,
    tick_period: u64,
    ability: Arc<dyn Ability>,
}

impl RegisteredAbility {
    /// Resolves the ability's metadata once.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] for a blank key or a zero tick
    /// period.
    pub fn new(ability: Arc<dyn Ability>, default_tick_period: u64) -> Result<Self, EngineError> {
        let key = AbilityKey::new(ability.key())?;
        let kind = ability.kind();
        let capabilities = ability.capabilities();
        let tick_period = ability.tick_period().unwrap_or(default_tick_period);
        if tick_period == 0 {
            return Err(EngineError::invalid(
                "tick_period",
                "must be at least one tick",
            ));
        }

        Ok(Self {
            key,
            kind,
            capabilities,
            tick_period,
            ability,
        })
    }

    pub fn key(&self) -> &AbilityKey {
        &self.key
    }

    pub fn kind(&self) -> AbilityKind {
        self.kind
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn tick_period(&self) -> u64 {
        self.tick_period
    }

    pub fn is_toggleable(&self) -> bool {
        self.kind == AbilityKind::Toggleable
    }

    pub fn has(&self, capability: Capabilities) -> bool {
        self.capabilities.contains(capability)
    }

    /// The underlying implementation.
    pub fn ability(&self) -> &dyn Ability {
        self.ability.as_ref()
    }
}

impl std::fmt::Debug for RegisteredAbility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredAbility")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .field("tick_period", &self.tick_period)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dash;

    impl Ability for Dash {
        fn key(&self) -> &str {
            "dash"
        }

        fn kind(&self) -> AbilityKind {
            AbilityKind::Instant
        }
    }

    struct Cloak {
        period: Option<u64>,
    }

    impl Ability for Cloak {
        fn key(&self) -> &str {
            "cloak"
        }

        fn kind(&self) -> AbilityKind {
            AbilityKind::Toggleable
        }

        fn tick_period(&self) -> Option<u64> {
            self.period
        }
    }

    #[test]
    fn capabilities_follow_kind_by_default() {
        let dash = RegisteredAbility::new(Arc::new(Dash), 20).unwrap();
        assert!(!dash.is_toggleable());
        assert_eq!(dash.capabilities(), Capabilities::ACTIVATABLE);

        let cloak = RegisteredAbility::new(Arc::new(Cloak { period: None }), 20).unwrap();
        assert!(cloak.is_toggleable());
        assert!(cloak.has(Capabilities::TICKABLE | Capabilities::GUARDABLE));
    }

    #[test]
    fn tick_period_falls_back_to_default() {
        let cloak = RegisteredAbility::new(Arc::new(Cloak { period: None }), 20).unwrap();
        assert_eq!(cloak.tick_period(), 20);

        let cloak = RegisteredAbility::new(Arc::new(Cloak { period: Some(5) }), 20).unwrap();
        assert_eq!(cloak.tick_period(), 5);
    }

    #[test]
    fn zero_tick_period_is_rejected() {
        let err = RegisteredAbility::new(Arc::new(Cloak { period: Some(0) }), 20).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn kinds_render_in_kebab_case() {
        assert_eq!(AbilityKind::Toggleable.to_string(), "toggleable");
        assert_eq!(DeactivationReason::ActorRemoved.as_ref(), "actor_removed");
        assert_eq!(CallbackStage::Deactivate.to_string(), "deactivate");
    }
}
