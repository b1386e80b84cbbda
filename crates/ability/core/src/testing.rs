//! Test doubles shared by the unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::ability::{
    Ability, AbilityContext, AbilityKind, CallbackError, CallbackStage, DeactivationReason,
};
use crate::clock::{Clock, OnceTask, RepeatingTask, ScheduleError, TaskHandle, TaskId};
use crate::listener::LifecycleListener;
use crate::reaper::ReapSummary;
use crate::types::{AbilityKey, ActorId, Tick};

// ----------------------------------------------------------------------
// Clocks
// ----------------------------------------------------------------------

enum Job {
    Once(OnceTask),
    Repeating { period: u64, task: RepeatingTask },
}

struct Scheduled {
    handle: TaskHandle,
    job: Job,
}

#[derive(Default)]
struct ManualState {
    now: u64,
    next_id: u64,
    queue: BTreeMap<(u64, u64), Scheduled>,
}

/// Deterministic clock advanced by hand. Tasks run outside the lock.
#[derive(Default)]
pub(crate) struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn advance(&self, ticks: u64) {
        let target = self.state.lock().unwrap().now + ticks;
        loop {
            let (due, id, scheduled) = {
                let mut state = self.state.lock().unwrap();
                let first = state.queue.keys().next().copied();
                let Some((due, id)) = first else {
                    state.now = target;
                    return;
                };
                if due > target {
                    state.now = target;
                    return;
                }
                let scheduled = state.queue.remove(&(due, id)).unwrap();
                state.now = due;
                (due, id, scheduled)
            };

            if scheduled.handle.is_cancelled() {
                continue;
            }
            match scheduled.job {
                Job::Once(task) => task(Tick(due)),
                Job::Repeating { period, mut task } => {
                    task(Tick(due));
                    if !scheduled.handle.is_cancelled() {
                        self.state.lock().unwrap().queue.insert(
                            (due + period, id),
                            Scheduled {
                                handle: scheduled.handle,
                                job: Job::Repeating { period, task },
                            },
                        );
                    }
                }
            }
        }
    }

    /// Tasks that will still fire.
    pub(crate) fn pending(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .queue
            .values()
            .filter(|s| !s.handle.is_cancelled())
            .count()
    }

    fn push(&self, delay: u64, job: Job) -> TaskHandle {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        let handle = TaskHandle::new(TaskId(id));
        let due = state.now + delay.max(1);
        state.queue.insert(
            (due, id),
            Scheduled {
                handle: handle.clone(),
                job,
            },
        );
        handle
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        Tick(self.state.lock().unwrap().now)
    }

    fn schedule_once(&self, delay: u64, task: OnceTask) -> Result<TaskHandle, ScheduleError> {
        Ok(self.push(delay, Job::Once(task)))
    }

    fn schedule_repeating(
        &self,
        period: u64,
        task: RepeatingTask,
    ) -> Result<TaskHandle, ScheduleError> {
        if period == 0 {
            return Err(ScheduleError::ZeroPeriod);
        }
        Ok(self.push(period, Job::Repeating { period, task }))
    }

    fn cancel(&self, handle: &TaskHandle) {
        handle.mark_cancelled();
        self.state
            .lock()
            .unwrap()
            .queue
            .retain(|_, s| s.handle.id() != handle.id());
    }
}

/// Clock that refuses all work.
pub(crate) struct FailingClock;

impl Clock for FailingClock {
    fn now(&self) -> Tick {
        Tick::ZERO
    }

    fn schedule_once(&self, _delay: u64, _task: OnceTask) -> Result<TaskHandle, ScheduleError> {
        Err(ScheduleError::ShutDown)
    }

    fn schedule_repeating(
        &self,
        _period: u64,
        _task: RepeatingTask,
    ) -> Result<TaskHandle, ScheduleError> {
        Err(ScheduleError::ShutDown)
    }

    fn cancel(&self, handle: &TaskHandle) {
        handle.mark_cancelled();
    }
}

// ----------------------------------------------------------------------
// Abilities
// ----------------------------------------------------------------------

/// Ability that records every callback and can be told to fail.
pub(crate) struct RecordingAbility {
    key: String,
    kind: AbilityKind,
    period: Option<u64>,
    guard: AtomicBool,
    fail_stage: Mutex<String>,
    panic_stage: Mutex<String>,
    activations: AtomicU64,
    ticks: AtomicU64,
    deactivations: AtomicU64,
    reasons: Mutex<Vec<DeactivationReason>>,
    journal: Mutex<Vec<&'static str>>,
}

impl RecordingAbility {
    fn build(key: &str, kind: AbilityKind, period: Option<u64>) -> Arc<Self> {
        Arc::new(Self {
            key: key.to_string(),
            kind,
            period,
            guard: AtomicBool::new(true),
            fail_stage: Mutex::new(String::new()),
            panic_stage: Mutex::new(String::new()),
            activations: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            deactivations: AtomicU64::new(0),
            reasons: Mutex::new(Vec::new()),
            journal: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn toggle(key: &str, period: u64) -> Arc<Self> {
        Self::build(key, AbilityKind::Toggleable, Some(period))
    }

    pub(crate) fn instant(key: &str) -> Arc<Self> {
        Self::build(key, AbilityKind::Instant, None)
    }

    pub(crate) fn set_guard(&self, allowed: bool) {
        self.guard.store(allowed, Ordering::SeqCst);
    }

    /// Make the named stage return an error. Empty string clears it.
    pub(crate) fn fail_in(&self, stage: &str) {
        *self.fail_stage.lock().unwrap() = stage.to_string();
    }

    /// Make the named stage panic. Empty string clears it.
    pub(crate) fn panic_in(&self, stage: &str) {
        *self.panic_stage.lock().unwrap() = stage.to_string();
    }

    pub(crate) fn activations(&self) -> u64 {
        self.activations.load(Ordering::SeqCst)
    }

    pub(crate) fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub(crate) fn deactivations(&self) -> u64 {
        self.deactivations.load(Ordering::SeqCst)
    }

    pub(crate) fn deactivation_reasons(&self) -> Vec<DeactivationReason> {
        self.reasons.lock().unwrap().clone()
    }

    pub(crate) fn journal(&self) -> Vec<&'static str> {
        self.journal.lock().unwrap().clone()
    }

    fn enter(&self, stage: &'static str) -> Result<(), CallbackError> {
        self.journal.lock().unwrap().push(stage);
        if *self.panic_stage.lock().unwrap() == stage {
            panic!("{stage} exploded");
        }
        if *self.fail_stage.lock().unwrap() == stage {
            return Err(CallbackError::msg(format!("{stage} failed")));
        }
        Ok(())
    }
}

impl Ability for RecordingAbility {
    fn key(&self) -> &str {
        &self.key
    }

    fn kind(&self) -> AbilityKind {
        self.kind
    }

    fn tick_period(&self) -> Option<u64> {
        self.period
    }

    fn can_toggle(&self, _ctx: &AbilityContext) -> Result<bool, CallbackError> {
        self.enter("guard")?;
        Ok(self.guard.load(Ordering::SeqCst))
    }

    fn on_activate(&self, _ctx: &AbilityContext) -> Result<(), CallbackError> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        self.enter("activate")
    }

    fn on_tick(&self, _ctx: &AbilityContext) -> Result<(), CallbackError> {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        self.enter("tick")
    }

    fn on_deactivate(
        &self,
        _ctx: &AbilityContext,
        reason: DeactivationReason,
    ) -> Result<(), CallbackError> {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
        self.reasons.lock().unwrap().push(reason);
        self.enter("deactivate")
    }
}

// ----------------------------------------------------------------------
// Listener
// ----------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct RecordingListener {
    activated: Mutex<Vec<(ActorId, AbilityKey)>>,
    deactivated: Mutex<Vec<(ActorId, AbilityKey, DeactivationReason)>>,
    failures: Mutex<Vec<CallbackStage>>,
    reaped: Mutex<Vec<(ActorId, ReapSummary)>>,
}

impl RecordingListener {
    pub(crate) fn activated_log(&self) -> Vec<(ActorId, AbilityKey)> {
        self.activated.lock().unwrap().clone()
    }

    pub(crate) fn deactivated_log(&self) -> Vec<(ActorId, AbilityKey, DeactivationReason)> {
        self.deactivated.lock().unwrap().clone()
    }

    pub(crate) fn failures(&self) -> Vec<CallbackStage> {
        self.failures.lock().unwrap().clone()
    }

    pub(crate) fn reaped_log(&self) -> Vec<(ActorId, ReapSummary)> {
        self.reaped.lock().unwrap().clone()
    }
}

impl LifecycleListener for RecordingListener {
    fn activated(&self, actor: ActorId, ability: &AbilityKey, _tick: Tick) {
        self.activated.lock().unwrap().push((actor, ability.clone()));
    }

    fn deactivated(
        &self,
        actor: ActorId,
        ability: &AbilityKey,
        reason: DeactivationReason,
        _tick: Tick,
    ) {
        self.deactivated
            .lock()
            .unwrap()
            .push((actor, ability.clone(), reason));
    }

    fn callback_failed(
        &self,
        _actor: ActorId,
        _ability: &AbilityKey,
        stage: CallbackStage,
        _error: &CallbackError,
    ) {
        self.failures.lock().unwrap().push(stage);
    }

    fn actor_reaped(&self, actor: ActorId, summary: &ReapSummary) {
        self.reaped.lock().unwrap().push((actor, *summary));
    }
}
