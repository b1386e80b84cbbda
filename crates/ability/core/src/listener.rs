//! Notification seam between the engine and its host.
//!
//! The coordinator and reaper report what happened through a
//! [`LifecycleListener`]; the host decides whether that becomes a log line,
//! an event on a bus, a metric, or nothing. Listener methods are called with
//! no engine lock held and must not block.

use crate::ability::{CallbackError, CallbackStage, DeactivationReason};
use crate::reaper::ReapSummary;
use crate::types::{AbilityKey, ActorId, Tick};

pub trait LifecycleListener: Send + Sync {
    /// A toggle became ACTIVE.
    fn activated(&self, _actor: ActorId, _ability: &AbilityKey, _tick: Tick) {}

    /// A toggle returned to INACTIVE.
    fn deactivated(
        &self,
        _actor: ActorId,
        _ability: &AbilityKey,
        _reason: DeactivationReason,
        _tick: Tick,
    ) {
    }

    /// An ability callback failed or panicked. The engine has already
    /// recovered; this is purely informational.
    fn callback_failed(
        &self,
        _actor: ActorId,
        _ability: &AbilityKey,
        _stage: CallbackStage,
        _error: &CallbackError,
    ) {
    }

    /// All state for a removed actor was torn down.
    fn actor_reaped(&self, _actor: ActorId, _summary: &ReapSummary) {}
}

/// Listener that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl LifecycleListener for NoopListener {}
