//! Typed identifiers for parameters and realizations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Key of a parameter group, e.g. `MULTFLT`.
///
/// Keys name storage directories and seed rng streams, so they are kept as
/// given and compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterKey(pub String);

impl ParameterKey {
    /// Create a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParameterKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParameterKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Index of one ensemble member (`iens`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RealizationId(pub usize);

impl RealizationId {
    /// Index as usize.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RealizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "realization-{}", self.0)
    }
}

impl From<usize> for RealizationId {
    fn from(iens: usize) -> Self {
        Self(iens)
    }
}
