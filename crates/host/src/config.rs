//! Host configuration structures and loaders.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use ability_core::EngineConfig;
use ability_runtime::RuntimeConfig;

/// Everything the host binary needs before it can build a runtime.
#[derive(Clone, Debug, Default)]
pub struct HostConfig {
    pub runtime: RuntimeConfig,
    /// Directory for the log file. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
    /// Ticks the scripted session idles between steps.
    pub idle_ticks: u64,
}

impl HostConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `ABILITY_TICK_MILLIS` - Wall-clock tick period; unset drives ticks manually
    /// - `ABILITY_DEFAULT_TICK_PERIOD` - Cadence for toggles without their own (default: 20)
    /// - `ABILITY_PURGE_INTERVAL` - Ticks between cooldown purges, 0 disables (default: 1200)
    /// - `ABILITY_TIMING_SAMPLES` - Retained timing samples for P95 (default: 256)
    /// - `ABILITY_EVENT_BUFFER` - Broadcast capacity per topic (default: 100)
    /// - `ABILITY_COMMAND_BUFFER` - Worker command queue size (default: 32)
    /// - `ABILITY_IDLE_TICKS` - Ticks between scripted steps (default: 20)
    /// - `ABILITY_LOG_DIR` - Enables file logging; empty picks the platform cache dir
    pub fn from_env() -> Self {
        let mut engine = EngineConfig::default();
        if let Some(period) = read_env::<u64>("ABILITY_DEFAULT_TICK_PERIOD") {
            engine.default_tick_period = period.max(1);
        }
        if let Some(interval) = read_env::<u64>("ABILITY_PURGE_INTERVAL") {
            engine.cooldown_purge_interval = interval;
        }
        if let Some(samples) = read_env::<usize>("ABILITY_TIMING_SAMPLES") {
            engine.max_timing_samples = samples.max(1);
        }

        let mut runtime = RuntimeConfig {
            engine,
            ..RuntimeConfig::default()
        };
        if let Some(capacity) = read_env::<usize>("ABILITY_EVENT_BUFFER") {
            runtime.event_buffer_size = capacity.max(1);
        }
        if let Some(capacity) = read_env::<usize>("ABILITY_COMMAND_BUFFER") {
            runtime.command_buffer_size = capacity.max(1);
        }
        runtime.tick_interval = read_env::<u64>("ABILITY_TICK_MILLIS")
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis);

        let log_dir = env::var("ABILITY_LOG_DIR").ok().map(|dir| {
            if dir.trim().is_empty() {
                default_log_dir()
            } else {
                PathBuf::from(dir)
            }
        });

        Self {
            runtime,
            log_dir,
            idle_ticks: read_env::<u64>("ABILITY_IDLE_TICKS").unwrap_or(20),
        }
    }
}

/// Platform cache directory for log files.
///
/// - macOS: `~/Library/Caches/ability-host/logs`
/// - Linux: `~/.cache/ability-host/logs` (or `$XDG_CACHE_HOME/ability-host/logs`)
/// - Windows: `%LOCALAPPDATA%\ability-host\logs`
/// - Fallback: `/tmp/ability-host/logs`
pub fn default_log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "ability-host")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/tmp/ability-host"))
        .join("logs")
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
