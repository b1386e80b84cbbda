//! Tick-driven [`Clock`] implementation.
//!
//! [`TickScheduler`] keeps a queue of due tasks ordered by `(due tick, task
//! id)`. Network threads may schedule and cancel at any time; only the thread
//! calling [`TickScheduler::advance`] runs tasks, one after another, with the
//! queue lock released so a task can schedule or cancel further work.
//!
//! Cancellation only flips the handle's flag. Cancelled entries are dropped
//! when they reach the front of the queue, so `cancel` never waits on the
//! queue lock held by a running tick.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ability_core::{Clock, OnceTask, RepeatingTask, ScheduleError, TaskHandle, TaskId, Tick};
use tracing::{debug, trace};

enum Job {
    Once(OnceTask),
    Repeating { period: u64, task: RepeatingTask },
}

struct Entry {
    handle: TaskHandle,
    job: Job,
}

#[derive(Default)]
struct Queue {
    next_id: u64,
    entries: BTreeMap<(u64, u64), Entry>,
}

#[derive(Default)]
pub struct TickScheduler {
    now: AtomicU64,
    shut_down: AtomicBool,
    queue: Mutex<Queue>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts counting from `tick` instead of zero.
    pub fn starting_at(tick: Tick) -> Self {
        Self {
            now: AtomicU64::new(tick.get()),
            ..Self::default()
        }
    }

    /// Moves the clock forward one tick and runs everything due.
    ///
    /// Returns the number of task invocations.
    pub fn advance(&self) -> usize {
        let tick = self.now.fetch_add(1, Ordering::AcqRel) + 1;
        let mut ran = 0;

        while let Some((id, entry)) = self.pop_due(tick) {
            if entry.handle.is_cancelled() {
                continue;
            }
            ran += 1;
            match entry.job {
                Job::Once(task) => task(Tick(tick)),
                Job::Repeating { period, mut task } => {
                    task(Tick(tick));
                    if !entry.handle.is_cancelled() && !self.is_shut_down() {
                        self.lock().entries.insert(
                            (tick + period, id),
                            Entry {
                                handle: entry.handle,
                                job: Job::Repeating { period, task },
                            },
                        );
                    }
                }
            }
        }

        if ran > 0 {
            trace!(target: "runtime::scheduler", tick, ran, "tick processed");
        }
        ran
    }

    /// Advances `ticks` times. Returns the total number of invocations.
    pub fn advance_by(&self, ticks: u64) -> usize {
        (0..ticks).map(|_| self.advance()).sum()
    }

    /// Tasks that are queued and not cancelled.
    pub fn pending(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|entry| !entry.handle.is_cancelled())
            .count()
    }

    /// Refuses further scheduling and cancels everything queued.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let drained = std::mem::take(&mut self.lock().entries);
        for entry in drained.values() {
            entry.handle.mark_cancelled();
        }
        debug!(
            target: "runtime::scheduler",
            cancelled = drained.len(),
            "scheduler shut down"
        );
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn pop_due(&self, tick: u64) -> Option<(u64, Entry)> {
        let mut queue = self.lock();
        let (due, id) = queue.entries.keys().next().copied()?;
        if due > tick {
            return None;
        }
        queue.entries.remove(&(due, id)).map(|entry| (id, entry))
    }

    fn push(&self, delay: u64, job: Job) -> Result<TaskHandle, ScheduleError> {
        if self.is_shut_down() {
            return Err(ScheduleError::ShutDown);
        }
        let mut queue = self.lock();
        let id = queue.next_id;
        queue.next_id += 1;

        let handle = TaskHandle::new(TaskId(id));
        // Never due at the current tick: a tick in progress may already have
        // drained it, and `now` can move under a concurrent `advance`.
        let due = self.now.load(Ordering::Acquire) + delay.max(1);
        queue.entries.insert(
            (due, id),
            Entry {
                handle: handle.clone(),
                job,
            },
        );
        Ok(handle)
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for TickScheduler {
    fn now(&self) -> Tick {
        Tick(self.now.load(Ordering::Acquire))
    }

    fn schedule_once(&self, delay: u64, task: OnceTask) -> Result<TaskHandle, ScheduleError> {
        self.push(delay, Job::Once(task))
    }

    fn schedule_repeating(
        &self,
        period: u64,
        task: RepeatingTask,
    ) -> Result<TaskHandle, ScheduleError> {
        if period == 0 {
            return Err(ScheduleError::ZeroPeriod);
        }
        self.push(period, Job::Repeating { period, task })
    }

    fn cancel(&self, handle: &TaskHandle) {
        if handle.mark_cancelled() {
            trace!(target: "runtime::scheduler", task = %handle.id(), "task cancelled");
        }
    }
}

impl std::fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickScheduler")
            .field("now", &self.now.load(Ordering::Relaxed))
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
