//! Parameter config shared by every realization of one `MULTFLT` group.
//!
//! A config is immutable once built and is shared through `Arc`, so any
//! number of nodes (one per realization) can hold it while being updated on
//! different threads.
//!
//! # File format
//!
//! ```json
//! {
//!   "key": "MULTFLT",
//!   "parameters": [
//!     { "name": "F1", "prior": { "distribution": "LOGUNIF", "min": 0.001, "max": 1.0 } },
//!     { "name": "F2", "prior": { "distribution": "RAW" }, "bounds": [-3.0, 3.0] }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use enkf_foundation::{ParameterKey, StableHasher};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NodeError, Result};
use crate::transform::Prior;

/// Valid range of a latent value, enforced by truncation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp a value into the range.
    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Whether `value` lies inside the range (inclusive).
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl From<[f64; 2]> for Bounds {
    fn from([min, max]: [f64; 2]) -> Self {
        Self { min, max }
    }
}

impl From<Bounds> for [f64; 2] {
    fn from(b: Bounds) -> Self {
        [b.min, b.max]
    }
}

/// One parameter (one fault) of the group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub prior: Prior,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, prior: Prior) -> Self {
        Self {
            name: name.into(),
            prior,
            bounds: None,
        }
    }

    /// Attach truncation bounds.
    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.bounds = Some(Bounds::new(min, max));
        self
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ConfigFile {
    key: ParameterKey,
    parameters: Vec<ParameterSpec>,
}

/// Validated config of a `MULTFLT` parameter group.
#[derive(Debug, Clone)]
pub struct MultfltConfig {
    key: ParameterKey,
    parameters: Vec<ParameterSpec>,
    index: IndexMap<String, usize>,
    fingerprint: u64,
}

impl MultfltConfig {
    /// Build and validate a config.
    ///
    /// Fails with [`NodeError::InvalidConfig`] when there are no parameters,
    /// a name is empty or repeated, bounds are inverted or not finite, or a
    /// prior has invalid parameters.
    pub fn new(key: impl Into<ParameterKey>, parameters: Vec<ParameterSpec>) -> Result<Self> {
        let key = key.into();
        if key.as_str().is_empty() {
            return Err(NodeError::InvalidConfig("parameter key is empty".into()));
        }
        if parameters.is_empty() {
            return Err(NodeError::InvalidConfig(format!(
                "{key}: config must declare at least one parameter"
            )));
        }

        let mut index = IndexMap::with_capacity(parameters.len());
        for (i, spec) in parameters.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(NodeError::InvalidConfig(format!(
                    "{key}: parameter {i} has an empty name"
                )));
            }
            if index.insert(spec.name.clone(), i).is_some() {
                return Err(NodeError::InvalidConfig(format!(
                    "{key}: duplicate parameter name '{}'",
                    spec.name
                )));
            }
            spec.prior.validate().map_err(|msg| {
                NodeError::InvalidConfig(format!("{key}: prior of '{}': {msg}", spec.name))
            })?;
            if let Some(b) = spec.bounds {
                if !(b.min.is_finite() && b.max.is_finite() && b.min <= b.max) {
                    return Err(NodeError::InvalidConfig(format!(
                        "{key}: bounds of '{}' are invalid: [{}, {}]",
                        spec.name, b.min, b.max
                    )));
                }
            }
        }

        let fingerprint = fingerprint(&key, &parameters);
        debug!(%key, size = parameters.len(), fingerprint, "Parameter config built");

        Ok(Self {
            key,
            parameters,
            index,
            fingerprint,
        })
    }

    /// Parse a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(json)
            .map_err(|e| NodeError::InvalidConfig(format!("malformed config: {e}")))?;
        Self::new(file.key, file.parameters)
    }

    /// Load a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Render the config back to JSON.
    pub fn to_json_string(&self) -> Result<String> {
        let file = ConfigFile {
            key: self.key.clone(),
            parameters: self.parameters.clone(),
        };
        serde_json::to_string_pretty(&file)
            .map_err(|e| NodeError::Format(format!("config serialization: {e}")))
    }

    /// Wrap into the shared handle nodes hold.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn key(&self) -> &ParameterKey {
        &self.key
    }

    /// Number of parameters (`data` length of every node).
    pub fn size(&self) -> usize {
        self.parameters.len()
    }

    /// Stable identity of the config.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Parameter names in index order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    /// Name of parameter `index`.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.parameters.get(index).map(|p| p.name.as_str())
    }

    /// Index of the parameter called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn prior(&self, index: usize) -> Option<&Prior> {
        self.parameters.get(index).map(|p| &p.prior)
    }

    pub fn bounds(&self, index: usize) -> Option<Bounds> {
        self.parameters.get(index).and_then(|p| p.bounds)
    }

    /// Whether any parameter carries truncation bounds.
    pub fn has_bounds(&self) -> bool {
        self.parameters.iter().any(|p| p.bounds.is_some())
    }

    /// Apply every parameter's prior transform. `data` and `out` must both
    /// have `size()` entries.
    pub(crate) fn transform_into(&self, data: &[f64], out: &mut [f64]) {
        for ((spec, &x), y) in self.parameters.iter().zip(data).zip(out.iter_mut()) {
            *y = spec.prior.transform(x);
        }
    }
}

fn fingerprint(key: &ParameterKey, parameters: &[ParameterSpec]) -> u64 {
    let mut h = StableHasher::new();
    h.write_str(key.as_str()).write_u64(parameters.len() as u64);
    for spec in parameters {
        h.write_str(&spec.name);
        spec.prior.hash_into(&mut h);
        match spec.bounds {
            Some(b) => h.write_u64(1).write_f64(b.min).write_f64(b.max),
            None => h.write_u64(0),
        };
    }
    h.finish()
}
