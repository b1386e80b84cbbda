//! Bridges engine lifecycle notifications onto the event bus and metrics.

use std::sync::Arc;

use ability_core::{
    AbilityKey, ActorId, CallbackError, CallbackStage, DeactivationReason, LifecycleListener,
    ReapSummary, Tick,
};

use super::bus::{Event, EventBus};
use super::types::{CallbackEvent, LifecycleEvent, SessionEvent};
use crate::workers::EngineMetrics;

/// [`LifecycleListener`] installed by the runtime.
pub struct EventBridge {
    bus: EventBus,
    metrics: Arc<EngineMetrics>,
}

impl EventBridge {
    pub fn new(bus: EventBus, metrics: Arc<EngineMetrics>) -> Self {
        Self { bus, metrics }
    }
}

impl LifecycleListener for EventBridge {
    fn activated(&self, actor: ActorId, ability: &AbilityKey, tick: Tick) {
        self.metrics.record_activation();
        self.bus.publish(Event::Lifecycle(LifecycleEvent::Activated {
            actor,
            ability: ability.clone(),
            tick,
        }));
    }

    fn deactivated(
        &self,
        actor: ActorId,
        ability: &AbilityKey,
        reason: DeactivationReason,
        tick: Tick,
    ) {
        self.metrics.record_deactivation();
        self.bus
            .publish(Event::Lifecycle(LifecycleEvent::Deactivated {
                actor,
                ability: ability.clone(),
                reason,
                tick,
            }));
    }

    fn callback_failed(
        &self,
        actor: ActorId,
        ability: &AbilityKey,
        stage: CallbackStage,
        error: &CallbackError,
    ) {
        self.metrics.record_callback_failure();
        self.bus.publish(Event::Callback(CallbackEvent {
            actor,
            ability: ability.clone(),
            stage,
            error: error.to_string(),
            panicked: error.is_panic(),
        }));
    }

    fn actor_reaped(&self, actor: ActorId, summary: &ReapSummary) {
        self.metrics.record_reap();
        self.bus.publish(Event::Session(SessionEvent::ActorReaped {
            actor,
            summary: *summary,
        }));
    }
}
