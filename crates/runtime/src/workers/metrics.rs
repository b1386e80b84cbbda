//! Engine metrics and statistics.
//!
//! Counters are lock-free atomics. Timing samples live in two bounded ring
//! buffers (ability uses and tick processing) from which the P95 is computed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ability_core::EngineConfig;

/// Engine metrics shared by the worker, the lifecycle bridge and handles.
#[derive(Debug)]
pub struct EngineMetrics {
    /// Successful ability uses (instant fires and toggle flips)
    uses: AtomicU64,

    /// Uses that were refused or whose callback failed
    failed_uses: AtomicU64,

    /// Uses rejected because the ability was cooling down
    cooldown_rejections: AtomicU64,

    activations: AtomicU64,
    deactivations: AtomicU64,
    callback_failures: AtomicU64,
    actors_reaped: AtomicU64,
    cooldowns_purged: AtomicU64,

    /// Ticks processed by the simulation worker
    ticks: AtomicU64,

    /// Peak number of task invocations in a single tick
    peak_tasks_per_tick: AtomicU64,

    use_times: Samples,
    tick_times: Samples,
}

impl EngineMetrics {
    pub fn new(max_samples: usize) -> Self {
        Self {
            uses: AtomicU64::new(0),
            failed_uses: AtomicU64::new(0),
            cooldown_rejections: AtomicU64::new(0),
            activations: AtomicU64::new(0),
            deactivations: AtomicU64::new(0),
            callback_failures: AtomicU64::new(0),
            actors_reaped: AtomicU64::new(0),
            cooldowns_purged: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            peak_tasks_per_tick: AtomicU64::new(0),
            use_times: Samples::new(max_samples),
            tick_times: Samples::new(max_samples),
        }
    }

    pub fn record_use(&self, elapsed: Duration) {
        self.uses.fetch_add(1, Ordering::Relaxed);
        self.use_times.push(elapsed);
    }

    pub fn record_failed_use(&self) {
        self.failed_uses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cooldown_rejection(&self) {
        self.cooldown_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_activation(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deactivation(&self) {
        self.deactivations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback_failure(&self) {
        self.callback_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reap(&self) {
        self.actors_reaped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_purge(&self, removed: usize) {
        self.cooldowns_purged
            .fetch_add(removed as u64, Ordering::Relaxed);
    }

    /// Records one processed tick and tracks the peak task count.
    pub fn record_tick(&self, elapsed: Duration, tasks: usize) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.tick_times.push(elapsed);

        let tasks = tasks as u64;
        let mut current_peak = self.peak_tasks_per_tick.load(Ordering::Relaxed);
        while tasks > current_peak {
            match self.peak_tasks_per_tick.compare_exchange_weak(
                current_peak,
                tasks,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_peak = actual,
            }
        }
    }

    pub fn uses(&self) -> u64 {
        self.uses.load(Ordering::Relaxed)
    }

    pub fn failed_uses(&self) -> u64 {
        self.failed_uses.load(Ordering::Relaxed)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Returns success rate as a percentage (0-100).
    pub fn success_rate(&self) -> f64 {
        let uses = self.uses();
        let total = uses + self.failed_uses();
        if total == 0 {
            100.0
        } else {
            (uses as f64 / total as f64) * 100.0
        }
    }

    /// Creates a snapshot of all metrics for display/logging.
    ///
    /// Individual fields are read atomically; the snapshot as a whole may mix
    /// values from before and after a concurrent update.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uses: self.uses(),
            failed_uses: self.failed_uses(),
            cooldown_rejections: self.cooldown_rejections.load(Ordering::Relaxed),
            activations: self.activations.load(Ordering::Relaxed),
            deactivations: self.deactivations.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            actors_reaped: self.actors_reaped.load(Ordering::Relaxed),
            cooldowns_purged: self.cooldowns_purged.load(Ordering::Relaxed),
            ticks: self.ticks(),
            peak_tasks_per_tick: self.peak_tasks_per_tick.load(Ordering::Relaxed),
            success_rate: self.success_rate(),
            use_p95: self.use_times.p95(),
            tick_p95: self.tick_times.p95(),
            use_samples: self.use_times.len(),
            tick_samples: self.tick_times.len(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new(EngineConfig::DEFAULT_TIMING_SAMPLES)
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uses: u64,
    pub failed_uses: u64,
    pub cooldown_rejections: u64,
    pub activations: u64,
    pub deactivations: u64,
    pub callback_failures: u64,
    pub actors_reaped: u64,
    pub cooldowns_purged: u64,
    pub ticks: u64,
    pub peak_tasks_per_tick: u64,
    pub success_rate: f64,
    pub use_p95: Duration,
    pub tick_p95: Duration,
    pub use_samples: usize,
    pub tick_samples: usize,
}

/// Bounded ring buffer of timing samples.
#[derive(Debug)]
struct Samples {
    capacity: usize,
    buffer: Mutex<VecDeque<Duration>>,
}

impl Samples {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn push(&self, sample: Duration) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(sample);
    }

    fn len(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Nearest-rank 95th percentile, or zero without samples.
    fn p95(&self) -> Duration {
        let mut sorted: Vec<Duration> = self
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect();
        if sorted.is_empty() {
            return Duration::ZERO;
        }
        sorted.sort_unstable();
        let rank = (sorted.len() * 95).div_ceil(100);
        sorted[rank.saturating_sub(1)]
    }
}
