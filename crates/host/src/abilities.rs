//! Sample content used by the scripted session.
use std::sync::atomic::{AtomicU32, Ordering};

use ability_core::{
    Ability, AbilityCatalog, AbilityContext, AbilityKind, CallbackError, DeactivationReason,
    EngineError,
};
use tracing::info;

/// Short blink forward.
pub struct Dash;

impl Ability for Dash {
    fn key(&self) -> &str {
        "dash"
    }

    fn kind(&self) -> AbilityKind {
        AbilityKind::Instant
    }

    fn on_activate(&self, ctx: &AbilityContext) -> Result<(), CallbackError> {
        info!(target: "host::abilities", actor = %ctx.actor, tick = %ctx.tick, "dash");
        Ok(())
    }
}

/// Invisibility that pulses every five ticks while held.
pub struct Cloak;

impl Ability for Cloak {
    fn key(&self) -> &str {
        "cloak"
    }

    fn kind(&self) -> AbilityKind {
        AbilityKind::Toggleable
    }

    fn tick_period(&self) -> Option<u64> {
        Some(5)
    }

    fn on_activate(&self, ctx: &AbilityContext) -> Result<(), CallbackError> {
        info!(target: "host::abilities", actor = %ctx.actor, "cloak raised");
        Ok(())
    }

    fn on_tick(&self, ctx: &AbilityContext) -> Result<(), CallbackError> {
        tracing::debug!(target: "host::abilities", actor = %ctx.actor, tick = %ctx.tick, "cloak pulse");
        Ok(())
    }

    fn on_deactivate(
        &self,
        ctx: &AbilityContext,
        reason: DeactivationReason,
    ) -> Result<(), CallbackError> {
        info!(target: "host::abilities", actor = %ctx.actor, %reason, "cloak dropped");
        Ok(())
    }
}

/// Healing aura limited to a fixed number of concurrent casters.
///
/// Uses the catalog's default cadence.
pub struct RegenAura {
    casters: AtomicU32,
    limit: u32,
}

impl RegenAura {
    pub fn new(limit: u32) -> Self {
        Self {
            casters: AtomicU32::new(0),
            limit,
        }
    }
}

impl Ability for RegenAura {
    fn key(&self) -> &str {
        "regen-aura"
    }

    fn kind(&self) -> AbilityKind {
        AbilityKind::Toggleable
    }

    fn can_toggle(&self, _ctx: &AbilityContext) -> Result<bool, CallbackError> {
        Ok(self.casters.load(Ordering::Acquire) < self.limit)
    }

    fn on_activate(&self, _ctx: &AbilityContext) -> Result<(), CallbackError> {
        self.casters.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn on_tick(&self, ctx: &AbilityContext) -> Result<(), CallbackError> {
        tracing::debug!(target: "host::abilities", actor = %ctx.actor, "regen");
        Ok(())
    }

    fn on_deactivate(
        &self,
        _ctx: &AbilityContext,
        _reason: DeactivationReason,
    ) -> Result<(), CallbackError> {
        self.casters.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }
}

/// Catalog with every sample ability registered.
pub fn sample_catalog(catalog: &mut AbilityCatalog) -> Result<(), EngineError> {
    catalog.register(Dash)?;
    catalog.register(Cloak)?;
    catalog.register(RegenAura::new(1))?;
    Ok(())
}
