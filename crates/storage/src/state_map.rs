//! Per-realization state of an ensemble case.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Where a realization stands in the case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RealizationState {
    /// Nothing stored yet.
    #[default]
    Undefined,
    /// Parameters stored.
    Initialized,
    /// Forward model results loaded.
    HasData,
    /// Loading the realization failed.
    LoadFailure,
    /// The realization it was derived from had failed.
    ParentFailure,
}

impl RealizationState {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            RealizationState::LoadFailure | RealizationState::ParentFailure
        )
    }
}

impl fmt::Display for RealizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RealizationState::Undefined => "undefined",
            RealizationState::Initialized => "initialized",
            RealizationState::HasData => "has data",
            RealizationState::LoadFailure => "load failure",
            RealizationState::ParentFailure => "parent failure",
        };
        f.write_str(s)
    }
}

/// State of every realization, indexed by `iens`.
///
/// Realizations past the end are [`RealizationState::Undefined`]; setting one
/// grows the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateMap {
    states: Vec<RealizationState>,
}

impl StateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, iens: usize) -> RealizationState {
        self.states.get(iens).copied().unwrap_or_default()
    }

    pub fn set(&mut self, iens: usize, state: RealizationState) {
        if iens >= self.states.len() {
            self.states.resize(iens + 1, RealizationState::Undefined);
        }
        self.states[iens] = state;
    }

    /// Set `state` only where the realization is still undefined.
    pub fn update_undefined(&mut self, iens: usize, state: RealizationState) {
        if self.get(iens) == RealizationState::Undefined {
            self.set(iens, state);
        }
    }

    /// Indices of realizations in `state`, ascending.
    pub fn realizations(&self, state: RealizationState) -> Vec<usize> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == state)
            .map(|(iens, _)| iens)
            .collect()
    }

    /// Load from `path`; a missing file is an empty map.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)?;
        let map: Self = serde_json::from_str(&text)?;
        debug!(path = %path.display(), realizations = map.len(), "State map loaded");
        Ok(map)
    }

    /// Write to `path`, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), realizations = self.len(), "State map saved");
        Ok(())
    }
}
