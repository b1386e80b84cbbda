//! Error infrastructure for ability-core.
//!
//! The engine distinguishes three kinds of outcome:
//!
//! - **Illegal transitions** (activating an active toggle, a guard refusing)
//!   are ordinary results and surface as `Ok(false)`, never as errors.
//! - **Invalid input** (nil actor id, blank ability key, zero tick period) is a
//!   caller bug and surfaces as [`EngineError::InvalidArgument`].
//! - **Scheduling failure** aborts a single activation, which is rolled back
//!   before [`EngineError::Schedule`] is returned.
//!
//! Callback failures never reach this type; they are isolated per ability and
//! reported through [`crate::LifecycleListener`].

use crate::clock::ScheduleError;
use crate::types::AbilityKey;

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Validation**: Invalid input that should be rejected without retry
/// - **Internal**: Unexpected state inconsistencies that require investigation
/// - **Fatal**: The engine cannot continue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorSeverity {
    /// Validation error - invalid input, should not retry without changes.
    ///
    /// Examples: nil actor id, empty ability key
    Validation,

    /// Internal error - unexpected state inconsistency.
    Internal,

    /// Fatal error - engine state cannot be trusted.
    ///
    /// Examples: scheduler already shut down
    Fatal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if this error indicates an internal bug.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Common classification shared by the error types of the engine crates.
pub trait Fault: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    ///
    /// Useful for metrics labels and assertions in tests.
    fn error_code(&self) -> &'static str;
}

/// Errors produced by engine operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid argument `{field}`: {reason}")]
    InvalidArgument {
        field: &'static str,
        reason: &'static str,
    },

    #[error("ability `{0}` is already registered")]
    DuplicateAbility(AbilityKey),

    #[error("failed to schedule recurring task for ability `{ability}`")]
    Schedule {
        ability: AbilityKey,
        #[source]
        source: ScheduleError,
    },
}

impl EngineError {
    pub(crate) const fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidArgument { field, reason }
    }

    /// Returns true for caller bugs, as opposed to runtime conditions.
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

impl Fault for EngineError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidArgument { .. } | Self::DuplicateAbility(_) => ErrorSeverity::Validation,
            Self::Schedule { source, .. } => source.severity(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::DuplicateAbility(_) => "duplicate_ability",
            Self::Schedule { .. } => "schedule_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_is_a_validation_fault() {
        let err = EngineError::invalid("ability_key", "must not be empty");
        assert!(err.is_invalid_argument());
        assert_eq!(err.severity(), ErrorSeverity::Validation);
        assert_eq!(err.error_code(), "invalid_argument");
        assert_eq!(
            err.to_string(),
            "invalid argument `ability_key`: must not be empty"
        );
    }

    #[test]
    fn every_fault_maps_to_a_produced_severity() {
        let duplicate = EngineError::DuplicateAbility(AbilityKey::new("dash").unwrap());
        assert_eq!(duplicate.severity(), ErrorSeverity::Validation);
        assert_eq!(ScheduleError::ZeroPeriod.severity().as_str(), "validation");
        assert_eq!(ScheduleError::ShutDown.severity().as_str(), "fatal");
        assert!(!ErrorSeverity::Validation.is_internal());
    }

    #[test]
    fn schedule_failure_inherits_scheduler_severity() {
        let key = AbilityKey::new("cloak").unwrap();
        let err = EngineError::Schedule {
            ability: key,
            source: ScheduleError::ShutDown,
        };
        assert!(!err.is_invalid_argument());
        assert_eq!(err.severity(), ErrorSeverity::Fatal);
        assert!(err.severity().is_internal());
    }
}
