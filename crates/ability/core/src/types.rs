use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Discrete unit of simulation time.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Self = Self(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Ticks remaining until `later`, or zero when `later` is not in the future.
    pub const fn ticks_until(self, later: Tick) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0.saturating_add(rhs))
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session-scoped actor identifier. Never reused within a process lifetime.
///
/// The nil UUID is rejected at construction, so every `ActorId` in the engine
/// is known to be valid.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "Uuid", into = "Uuid")]
pub struct ActorId(Uuid);

impl ActorId {
    pub fn new(id: Uuid) -> Result<Self, EngineError> {
        if id.is_nil() {
            return Err(EngineError::invalid("actor_id", "must not be the nil uuid"));
        }
        Ok(Self(id))
    }

    /// Generates a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl TryFrom<Uuid> for ActorId {
    type Error = EngineError;

    fn try_from(id: Uuid) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<ActorId> for Uuid {
    fn from(id: ActorId) -> Self {
        id.0
    }
}

impl FromStr for ActorId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Uuid::parse_str(s.trim())
            .map_err(|_| EngineError::invalid("actor_id", "not a valid uuid"))?;
        Self::new(id)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable, case-sensitive ability identifier such as `"dragon-fury"`.
///
/// Backed by a shared string so clones on the hot path are a refcount bump.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AbilityKey(Arc<str>);

impl AbilityKey {
    pub fn new(key: &str) -> Result<Self, EngineError> {
        if key.trim().is_empty() {
            return Err(EngineError::invalid("ability_key", "must not be empty"));
        }
        Ok(Self(Arc::from(key)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AbilityKey {
    type Error = EngineError;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        Self::new(&key)
    }
}

impl From<AbilityKey> for String {
    fn from(key: AbilityKey) -> Self {
        key.0.to_string()
    }
}

impl Borrow<str> for AbilityKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AbilityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AbilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for AbilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
