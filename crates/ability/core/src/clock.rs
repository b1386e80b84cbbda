//! Scheduling contract consumed by the engine.
//!
//! A [`Clock`] supplies the authoritative tick and runs deferred work on the
//! simulation thread. The engine only ever stores the returned
//! [`TaskHandle`]; cancellation is a flag flip on that handle, so it is
//! idempotent, non-blocking and takes effect before `cancel` returns. A task
//! that is mid-invocation finishes that invocation but never fires again.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ErrorSeverity, Fault};
use crate::types::Tick;

/// Work scheduled to run once.
pub type OnceTask = Box<dyn FnOnce(Tick) + Send + 'static>;

/// Work scheduled to run every period. Receives the tick it fires on.
pub type RepeatingTask = Box<dyn FnMut(Tick) + Send + 'static>;

/// Identifier assigned by the clock to a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Cancellation handle for a scheduled task.
///
/// Clones share the cancellation flag, so the clock and the owner of the
/// handle observe the same state.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    id: TaskId,
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Marks the task cancelled. Returns `true` only for the call that flipped it.
    pub fn mark_cancelled(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TaskHandle {}

/// Reasons a clock refuses to schedule work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("repeating period must be at least one tick")]
    ZeroPeriod,

    #[error("clock has been shut down")]
    ShutDown,
}

impl Fault for ScheduleError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ZeroPeriod => ErrorSeverity::Validation,
            Self::ShutDown => ErrorSeverity::Fatal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::ZeroPeriod => "zero_period",
            Self::ShutDown => "clock_shut_down",
        }
    }
}

/// Tick source and deferred-work scheduler.
///
/// All scheduled tasks run sequentially on the thread that drives the clock.
pub trait Clock: Send + Sync {
    /// Current tick.
    fn now(&self) -> Tick;

    /// Run `task` once, `delay` ticks from now. A delay of zero means the
    /// next tick; nothing is ever due at the tick already in progress.
    fn schedule_once(&self, delay: u64, task: OnceTask) -> Result<TaskHandle, ScheduleError>;

    /// Run `task` every `period` ticks, first firing `period` ticks from now.
    fn schedule_repeating(
        &self,
        period: u64,
        task: RepeatingTask,
    ) -> Result<TaskHandle, ScheduleError>;

    /// Stop a task from firing again. Cancelling twice, or cancelling a task
    /// that already ran to completion, is a no-op.
    fn cancel(&self, handle: &TaskHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_flips_once() {
        let handle = TaskHandle::new(TaskId(7));
        let shared = handle.clone();

        assert!(!shared.is_cancelled());
        assert!(handle.mark_cancelled());
        assert!(!shared.mark_cancelled());
        assert!(shared.is_cancelled());
        assert_eq!(handle, shared);
        assert_eq!(handle.id().to_string(), "task#7");
    }
}
