//! Enum dispatch over every parameter kind.
//!
//! Storage and the update driver hold heterogeneous parameter groups, so they
//! work with [`AnyNode`] and [`ParameterConfig`]. Each variant forwards to
//! its concrete kind; binary operations between different variants fail with
//! [`NodeError::ConfigMismatch`].

use std::io::{Read, Write};
use std::sync::Arc;

use enkf_foundation::{ParameterKey, RngStream};

use crate::bridge::ActiveList;
use crate::config::MultfltConfig;
use crate::error::{NodeError, Result};
use crate::multflt::Multflt;
use crate::node::{EnkfNode, NodeKind};

/// Config of any parameter kind.
#[derive(Debug, Clone)]
pub enum ParameterConfig {
    Multflt(Arc<MultfltConfig>),
}

impl ParameterConfig {
    pub fn kind(&self) -> NodeKind {
        match self {
            ParameterConfig::Multflt(_) => NodeKind::Multflt,
        }
    }

    pub fn key(&self) -> &ParameterKey {
        match self {
            ParameterConfig::Multflt(c) => c.key(),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            ParameterConfig::Multflt(c) => c.size(),
        }
    }

    /// Parameter names in index order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            ParameterConfig::Multflt(c) => c.names().collect(),
        }
    }

    /// Allocate a node of this kind.
    pub fn alloc(&self) -> Result<AnyNode> {
        match self {
            ParameterConfig::Multflt(c) => Multflt::new(Arc::clone(c)).map(AnyNode::Multflt),
        }
    }
}

impl From<Arc<MultfltConfig>> for ParameterConfig {
    fn from(config: Arc<MultfltConfig>) -> Self {
        ParameterConfig::Multflt(config)
    }
}

/// A node of any parameter kind.
#[derive(Debug)]
pub enum AnyNode {
    Multflt(Multflt),
}

impl From<Multflt> for AnyNode {
    fn from(node: Multflt) -> Self {
        AnyNode::Multflt(node)
    }
}

impl AnyNode {
    pub fn as_multflt(&self) -> Option<&Multflt> {
        match self {
            AnyNode::Multflt(n) => Some(n),
        }
    }

    pub fn as_multflt_mut(&mut self) -> Option<&mut Multflt> {
        match self {
            AnyNode::Multflt(n) => Some(n),
        }
    }

    /// Store in a per-realization file.
    pub fn ens_write(&self, path: &std::path::Path) -> Result<()> {
        match self {
            AnyNode::Multflt(n) => n.ens_write(path),
        }
    }

    /// Load from a per-realization file.
    pub fn ens_read(&mut self, path: &std::path::Path) -> Result<()> {
        match self {
            AnyNode::Multflt(n) => n.ens_read(path),
        }
    }
}

// Pairs two nodes of the same variant, or reports the mismatch.
macro_rules! same_kind {
    ($self:ident, $other:ident, |$a:ident, $b:ident| $body:expr) => {
        match ($self, $other) {
            (AnyNode::Multflt($a), AnyNode::Multflt($b)) => $body,
            #[allow(unreachable_patterns)]
            (a, b) => Err(NodeError::ConfigMismatch(format!(
                "cannot combine {} with {}",
                a.kind(),
                b.kind()
            ))),
        }
    };
}

impl EnkfNode for AnyNode {
    fn kind(&self) -> NodeKind {
        match self {
            AnyNode::Multflt(n) => n.kind(),
        }
    }

    fn key(&self) -> &ParameterKey {
        match self {
            AnyNode::Multflt(n) => n.key(),
        }
    }

    fn size(&self) -> usize {
        match self {
            AnyNode::Multflt(n) => n.size(),
        }
    }

    fn fingerprint(&self) -> u64 {
        match self {
            AnyNode::Multflt(n) => n.fingerprint(),
        }
    }

    fn blank(&self) -> Self {
        match self {
            AnyNode::Multflt(n) => AnyNode::Multflt(n.blank()),
        }
    }

    fn copy(&self) -> Self {
        match self {
            AnyNode::Multflt(n) => AnyNode::Multflt(n.copy()),
        }
    }

    fn serialize(
        &self,
        active: &ActiveList,
        target: &mut [f64],
        row_offset: usize,
    ) -> Result<usize> {
        match self {
            AnyNode::Multflt(n) => n.serialize(active, target, row_offset),
        }
    }

    fn deserialize(
        &mut self,
        active: &ActiveList,
        source: &[f64],
        row_offset: usize,
    ) -> Result<usize> {
        match self {
            AnyNode::Multflt(n) => n.deserialize(active, source, row_offset),
        }
    }

    fn truncate(&mut self) -> bool {
        match self {
            AnyNode::Multflt(n) => n.truncate(),
        }
    }

    fn initialize(&mut self, rng: &mut RngStream) {
        match self {
            AnyNode::Multflt(n) => n.initialize(rng),
        }
    }

    fn fwrite(&self, writer: &mut dyn Write) -> Result<()> {
        match self {
            AnyNode::Multflt(n) => n.fwrite(writer),
        }
    }

    fn fread(&mut self, reader: &mut dyn Read) -> Result<()> {
        match self {
            AnyNode::Multflt(n) => n.fread(reader),
        }
    }

    fn clear(&mut self) {
        match self {
            AnyNode::Multflt(n) => n.clear(),
        }
    }

    fn iadd(&mut self, other: &Self) -> Result<()> {
        same_kind!(self, other, |a, b| a.iadd(b))
    }

    fn isub(&mut self, other: &Self) -> Result<()> {
        same_kind!(self, other, |a, b| a.isub(b))
    }

    fn imul(&mut self, other: &Self) -> Result<()> {
        same_kind!(self, other, |a, b| a.imul(b))
    }

    fn iaddsqr(&mut self, other: &Self) -> Result<()> {
        same_kind!(self, other, |a, b| a.iaddsqr(b))
    }

    fn scale(&mut self, factor: f64) {
        match self {
            AnyNode::Multflt(n) => n.scale(factor),
        }
    }

    fn isqrt(&mut self) {
        match self {
            AnyNode::Multflt(n) => n.isqrt(),
        }
    }

    fn fprintf_results(&mut self, writer: &mut dyn Write) -> Result<()> {
        match self {
            AnyNode::Multflt(n) => n.fprintf_results(writer),
        }
    }
}
