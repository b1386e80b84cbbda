use serde::{Deserialize, Serialize};

/// Engine tunables supplied by the host.
///
/// The core never reads these from disk or the environment; the host builds
/// an `EngineConfig` and passes numbers down as plain arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cadence used for toggleable abilities that do not supply their own.
    pub default_tick_period: u64,

    /// How often expired cooldown entries are physically purged.
    pub cooldown_purge_interval: u64,

    /// Upper bound on retained tick timing samples.
    pub max_timing_samples: usize,
}

impl EngineConfig {
    // ===== compile-time constants =====
    /// Simulation rate the tick arithmetic assumes (one tick every 50ms).
    pub const TICKS_PER_SECOND: u64 = 20;
    pub const MILLIS_PER_TICK: u64 = 1000 / Self::TICKS_PER_SECOND;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_TICK_PERIOD: u64 = 20;
    pub const DEFAULT_PURGE_INTERVAL: u64 = 1200;
    pub const DEFAULT_TIMING_SAMPLES: usize = 256;

    pub fn new() -> Self {
        Self {
            default_tick_period: Self::DEFAULT_TICK_PERIOD,
            cooldown_purge_interval: Self::DEFAULT_PURGE_INTERVAL,
            max_timing_samples: Self::DEFAULT_TIMING_SAMPLES,
        }
    }

    pub fn with_tick_period(default_tick_period: u64) -> Self {
        Self {
            default_tick_period,
            ..Self::new()
        }
    }

    /// Converts a wall-clock duration in milliseconds to whole ticks, rounding up.
    pub const fn ticks_from_millis(millis: u64) -> u64 {
        millis.div_ceil(Self::MILLIS_PER_TICK)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_round_up_to_whole_ticks() {
        assert_eq!(EngineConfig::ticks_from_millis(0), 0);
        assert_eq!(EngineConfig::ticks_from_millis(50), 1);
        assert_eq!(EngineConfig::ticks_from_millis(51), 2);
        assert_eq!(EngineConfig::ticks_from_millis(8_000), 160);
    }

    #[test]
    fn defaults_match_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.default_tick_period, EngineConfig::DEFAULT_TICK_PERIOD);
        assert_eq!(
            config.cooldown_purge_interval,
            EngineConfig::DEFAULT_PURGE_INTERVAL
        );
        assert_eq!(EngineConfig::with_tick_period(5).default_tick_period, 5);
    }
}
