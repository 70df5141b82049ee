//! The node contract every ensemble parameter kind implements.
//!
//! The update engine never looks inside a parameter kind. It allocates nodes,
//! flattens them into the update matrix, writes the result back, clamps,
//! aggregates and persists them, all through [`EnkfNode`]. A new parameter
//! kind plugs in by implementing the trait and adding a variant to
//! [`AnyNode`](crate::AnyNode).

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use enkf_foundation::{ParameterKey, RngStream};
use serde::{Deserialize, Serialize};

use crate::bridge::ActiveList;
use crate::error::{NodeError, Result};

/// Tag identifying a parameter kind in persisted files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Fault transmissibility multipliers.
    Multflt,
}

impl NodeKind {
    pub const ALL: [NodeKind; 1] = [NodeKind::Multflt];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Multflt => "MULTFLT",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self> {
        NodeKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| NodeError::InvalidConfig(format!("unknown parameter kind '{s}'")))
    }
}

/// Capability set of an ensemble parameter node.
///
/// # Contract
///
/// - `size()` never changes for the lifetime of a node.
/// - Every method that changes data invalidates any derived output.
/// - A failing method leaves the node unchanged.
/// - `deserialize(serialize(node))` over [`ActiveList::All`] reproduces the
///   data bit for bit.
pub trait EnkfNode: Send + Sized {
    /// Kind tag written into persisted files.
    fn kind(&self) -> NodeKind;

    /// Key of the parameter group.
    fn key(&self) -> &ParameterKey;

    /// Number of scalar values.
    fn size(&self) -> usize;

    /// Stable identity of the node's config.
    fn fingerprint(&self) -> u64;

    /// Fresh node built from the same config, data at its neutral value.
    fn blank(&self) -> Self;

    /// Deep copy of the data; derived output starts stale.
    fn copy(&self) -> Self;

    /// Write the active entries into `target[row_offset..]`; returns the
    /// number written.
    fn serialize(&self, active: &ActiveList, target: &mut [f64], row_offset: usize)
        -> Result<usize>;

    /// Read the active entries from `source[row_offset..]`; returns the
    /// number read.
    fn deserialize(&mut self, active: &ActiveList, source: &[f64], row_offset: usize)
        -> Result<usize>;

    /// Clamp data to configured bounds. Returns whether any value changed.
    fn truncate(&mut self) -> bool;

    /// Seed data from the prior.
    fn initialize(&mut self, rng: &mut RngStream);

    /// Write a checkpoint record including config identity.
    fn fwrite(&self, writer: &mut dyn Write) -> Result<()>;

    /// Read a record written by [`EnkfNode::fwrite`].
    fn fread(&mut self, reader: &mut dyn Read) -> Result<()>;

    /// Set every value to zero.
    fn clear(&mut self);

    /// `self += other`
    fn iadd(&mut self, other: &Self) -> Result<()>;

    /// `self -= other`
    fn isub(&mut self, other: &Self) -> Result<()>;

    /// `self *= other`, element-wise.
    fn imul(&mut self, other: &Self) -> Result<()>;

    /// `self += other * other`, element-wise.
    fn iaddsqr(&mut self, other: &Self) -> Result<()>;

    /// `self *= factor`
    fn scale(&mut self, factor: f64);

    /// Element-wise square root.
    fn isqrt(&mut self);

    /// Human-readable dump of the output values against parameter names.
    fn fprintf_results(&mut self, writer: &mut dyn Write) -> Result<()>;

    /// Check that `other` was built from the same config.
    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.kind() != other.kind() {
            return Err(NodeError::ConfigMismatch(format!(
                "kind {} vs {}",
                self.kind(),
                other.kind()
            )));
        }
        if self.size() != other.size() {
            return Err(NodeError::ConfigMismatch(format!(
                "{}: size {} vs {}",
                self.key(),
                self.size(),
                other.size()
            )));
        }
        if self.fingerprint() != other.fingerprint() {
            return Err(NodeError::ConfigMismatch(format!(
                "{} and {} were built from different configs",
                self.key(),
                other.key()
            )));
        }
        Ok(())
    }
}
