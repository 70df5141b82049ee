//! `MULTFLT`: fault transmissibility multipliers of one realization.
//!
//! The node stores one latent value per fault. The multiplier the simulator
//! applies is the output of that fault's prior transform (see
//! [`crate::transform`]), computed lazily and cached until the latent data
//! changes.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use enkf_foundation::{ParameterKey, RngStream};
use tracing::debug;

use crate::aggregate;
use crate::bridge::{deserialize_slice, serialize_slice, ActiveList};
use crate::config::MultfltConfig;
use crate::error::{NodeError, Result};
use crate::node::{EnkfNode, NodeKind};
use crate::persistence::{
    read_record, read_record_file, write_record, write_record_file, CheckpointRecord, NodeRecord,
};
use crate::report;

/// Fault multipliers of one realization.
#[derive(Debug)]
pub struct Multflt {
    config: Arc<MultfltConfig>,
    data: Vec<f64>,
    /// `transform(data)`, `None` when stale.
    output: Option<Vec<f64>>,
}

impl Multflt {
    /// Allocate a node bound to `config`, every latent value at zero.
    pub fn new(config: Arc<MultfltConfig>) -> Result<Self> {
        let size = config.size();
        if size == 0 {
            return Err(NodeError::InvalidConfig(format!(
                "{}: cannot allocate a node of size 0",
                config.key()
            )));
        }
        Ok(Self {
            config,
            data: vec![0.0; size],
            output: None,
        })
    }

    pub fn config(&self) -> &Arc<MultfltConfig> {
        &self.config
    }

    /// Replace the data wholesale.
    pub fn set_data(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.data.len() {
            return Err(NodeError::length(self.data.len(), values.len()));
        }
        self.data.copy_from_slice(values);
        self.invalidate();
        Ok(())
    }

    /// Owned copy of the data.
    pub fn data(&self) -> Vec<f64> {
        self.data.clone()
    }

    /// Copy the data into `out`, which must have `size()` entries.
    pub fn get_data(&self, out: &mut [f64]) -> Result<()> {
        if out.len() != self.data.len() {
            return Err(NodeError::length(self.data.len(), out.len()));
        }
        out.copy_from_slice(&self.data);
        Ok(())
    }

    /// Borrow the data.
    pub fn data_ref(&self) -> &[f64] {
        &self.data
    }

    /// Recompute and cache the output.
    pub fn output_transform(&mut self) {
        let mut out = vec![0.0; self.data.len()];
        self.config.transform_into(&self.data, &mut out);
        self.output = Some(out);
    }

    /// Whether the cached output matches the data.
    pub fn is_output_valid(&self) -> bool {
        self.output.is_some()
    }

    /// Borrow the output, recomputing it first if stale.
    pub fn output_ref(&mut self) -> &[f64] {
        let config = &self.config;
        let data = &self.data;
        self.output.get_or_insert_with(|| {
            let mut out = vec![0.0; data.len()];
            config.transform_into(data, &mut out);
            out
        })
    }

    /// Copy the output into `out`; a stale cache is bypassed by computing the
    /// transform directly.
    pub fn get_output_data(&self, out: &mut [f64]) -> Result<()> {
        if out.len() != self.data.len() {
            return Err(NodeError::length(self.data.len(), out.len()));
        }
        match &self.output {
            Some(cached) => out.copy_from_slice(cached),
            None => self.config.transform_into(&self.data, out),
        }
        Ok(())
    }

    /// Name of parameter `index`.
    pub fn get_name(&self, index: usize) -> Option<&str> {
        self.config.name(index)
    }

    /// Output value of the parameter called `name`.
    pub fn user_get(&mut self, name: &str) -> Option<f64> {
        let index = self.config.index_of(name)?;
        self.output_ref().get(index).copied()
    }

    /// Store the data in the per-realization file at `path`.
    pub fn ens_write(&self, path: &Path) -> Result<()> {
        write_record_file(path, &NodeRecord::new(self.kind(), &self.data))
    }

    /// Load the data from a file written by [`Multflt::ens_write`].
    pub fn ens_read(&mut self, path: &Path) -> Result<()> {
        let record: NodeRecord = read_record_file(path)?;
        self.data = record.into_data(self.kind(), self.data.len())?;
        self.invalidate();
        Ok(())
    }

    /// Write the output as an Eclipse `MULTFLT` keyword.
    pub fn write_keyword(&mut self, writer: &mut dyn Write) -> Result<()> {
        let config = Arc::clone(&self.config);
        report::write_multflt_keyword(writer, config.names(), self.output_ref())
    }

    /// Write the `MULTFLT` include file for the simulator at `path`.
    pub fn ecl_write(&mut self, path: &Path) -> Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        self.write_keyword(&mut file)?;
        file.flush()?;
        debug!(key = %self.config.key(), path = %path.display(), "MULTFLT keyword written");
        Ok(())
    }

    /// Mean node of an ensemble, checked against `config`.
    pub fn alloc_mean(config: &Arc<MultfltConfig>, nodes: &[&Multflt]) -> Result<Multflt> {
        for node in nodes {
            if node.config.fingerprint() != config.fingerprint() {
                return Err(NodeError::ConfigMismatch(format!(
                    "{} node does not belong to config {}",
                    node.config.key(),
                    config.key()
                )));
            }
        }
        aggregate::alloc_mean(nodes)
    }

    fn invalidate(&mut self) {
        self.output = None;
    }

    fn zip_apply(&mut self, other: &Self, op: impl Fn(f64, f64) -> f64) -> Result<()> {
        self.check_compatible(other)?;
        for (a, &b) in self.data.iter_mut().zip(&other.data) {
            *a = op(*a, b);
        }
        self.invalidate();
        Ok(())
    }
}

impl EnkfNode for Multflt {
    fn kind(&self) -> NodeKind {
        NodeKind::Multflt
    }

    fn key(&self) -> &ParameterKey {
        self.config.key()
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn fingerprint(&self) -> u64 {
        self.config.fingerprint()
    }

    fn blank(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            data: vec![0.0; self.data.len()],
            output: None,
        }
    }

    fn copy(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            data: self.data.clone(),
            output: None,
        }
    }

    fn serialize(
        &self,
        active: &ActiveList,
        target: &mut [f64],
        row_offset: usize,
    ) -> Result<usize> {
        serialize_slice(&self.data, active, target, row_offset)
    }

    fn deserialize(
        &mut self,
        active: &ActiveList,
        source: &[f64],
        row_offset: usize,
    ) -> Result<usize> {
        let n = deserialize_slice(&mut self.data, active, source, row_offset)?;
        self.invalidate();
        Ok(n)
    }

    fn truncate(&mut self) -> bool {
        let mut changed = false;
        for (i, value) in self.data.iter_mut().enumerate() {
            if let Some(bounds) = self.config.bounds(i) {
                let clamped = bounds.clamp(*value);
                if clamped.to_bits() != value.to_bits() {
                    *value = clamped;
                    changed = true;
                }
            }
        }
        if changed {
            self.invalidate();
        }
        changed
    }

    fn initialize(&mut self, rng: &mut RngStream) {
        for (spec, value) in self.config.parameters().iter().zip(self.data.iter_mut()) {
            *value = if spec.prior.is_constant() {
                0.0
            } else {
                rng.normal()
            };
        }
        self.invalidate();
    }

    fn fwrite(&self, writer: &mut dyn Write) -> Result<()> {
        let record = CheckpointRecord::new(
            self.kind(),
            self.config.key(),
            self.config.fingerprint(),
            &self.data,
        );
        write_record(writer, &record)
    }

    fn fread(&mut self, reader: &mut dyn Read) -> Result<()> {
        let record: CheckpointRecord = read_record(reader)?;
        self.data = record.into_data(
            self.kind(),
            self.config.key(),
            self.config.fingerprint(),
            self.data.len(),
        )?;
        self.invalidate();
        Ok(())
    }

    fn clear(&mut self) {
        self.data.fill(0.0);
        self.invalidate();
    }

    fn iadd(&mut self, other: &Self) -> Result<()> {
        self.zip_apply(other, |a, b| a + b)
    }

    fn isub(&mut self, other: &Self) -> Result<()> {
        self.zip_apply(other, |a, b| a - b)
    }

    fn imul(&mut self, other: &Self) -> Result<()> {
        self.zip_apply(other, |a, b| a * b)
    }

    fn iaddsqr(&mut self, other: &Self) -> Result<()> {
        self.zip_apply(other, |a, b| a + b * b)
    }

    fn scale(&mut self, factor: f64) {
        self.data.iter_mut().for_each(|v| *v *= factor);
        self.invalidate();
    }

    fn isqrt(&mut self) {
        self.data.iter_mut().for_each(|v| *v = v.sqrt());
        self.invalidate();
    }

    fn fprintf_results(&mut self, writer: &mut dyn Write) -> Result<()> {
        let config = Arc::clone(&self.config);
        report::write_results(writer, config.names(), self.output_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParameterSpec;
    use crate::transform::Prior;

    fn config(names: &[&str]) -> Arc<MultfltConfig> {
        let params = names
            .iter()
            .map(|n| ParameterSpec::new(*n, Prior::Raw))
            .collect();
        MultfltConfig::new("MULTFLT", params).unwrap().shared()
    }

    fn bounded_config() -> Arc<MultfltConfig> {
        let params = ["F1", "F2", "F3"]
            .iter()
            .map(|n| ParameterSpec::new(*n, Prior::Raw).with_bounds(0.0, 1.0))
            .collect();
        MultfltConfig::new("MULTFLT", params).unwrap().shared()
    }

    fn node_with(config: &Arc<MultfltConfig>, data: &[f64]) -> Multflt {
        let mut node = Multflt::new(Arc::clone(config)).unwrap();
        node.set_data(data).unwrap();
        node
    }

    #[test]
    fn test_new_node_is_zero_and_stale() {
        let node = Multflt::new(config(&["F1", "F2"])).unwrap();
        assert_eq!(node.data_ref(), &[0.0, 0.0]);
        assert!(!node.is_output_valid());
    }

    #[test]
    fn test_set_data_length_mismatch_leaves_node() {
        let cfg = config(&["F1", "F2", "F3"]);
        let mut node = node_with(&cfg, &[0.1, 0.2, 0.3]);
        let err = node.set_data(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            NodeError::LengthMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(node.data(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_mutation_invalidates_output() {
        let cfg = config(&["F1"]);
        let mut node = node_with(&cfg, &[0.5]);
        node.output_transform();
        assert!(node.is_output_valid());

        node.set_data(&[0.7]).unwrap();
        assert!(!node.is_output_valid());
        assert_eq!(node.output_ref(), &[0.7]);
        assert!(node.is_output_valid());

        node.deserialize(&ActiveList::All, &[0.9], 0).unwrap();
        assert!(!node.is_output_valid());
    }

    #[test]
    fn test_output_uses_prior_transform() {
        let params = vec![
            ParameterSpec::new("F1", Prior::Uniform { min: 0.0, max: 2.0 }),
            ParameterSpec::new("F2", Prior::Const { value: 0.25 }),
            ParameterSpec::new("F3", Prior::LogNormal { mean: 0.0, std: 1.0 }),
        ];
        let cfg = MultfltConfig::new("MULTFLT", params).unwrap().shared();
        let mut node = node_with(&cfg, &[0.0, 3.0, 0.0]);

        let mut out = [0.0; 3];
        node.get_output_data(&mut out).unwrap();
        assert!((out[0] - 1.0).abs() < 1e-12);
        assert_eq!(out[1], 0.25);
        assert_eq!(out[2], 1.0);
        // reading through the bypass does not fill the cache
        assert!(!node.is_output_valid());

        assert_eq!(node.output_ref(), &out);
        assert_eq!(node.user_get("F2"), Some(0.25));
        assert_eq!(node.user_get("F9"), None);
    }

    #[test]
    fn test_output_transform_is_deterministic() {
        let params = vec![ParameterSpec::new(
            "F1",
            Prior::LogUniform { min: 0.001, max: 1.0 },
        )];
        let cfg = MultfltConfig::new("MULTFLT", params).unwrap().shared();
        let mut node = node_with(&cfg, &[0.42]);
        node.output_transform();
        let first = node.output_ref().to_vec();
        node.output_transform();
        assert_eq!(first[0].to_bits(), node.output_ref()[0].to_bits());
    }

    #[test]
    fn test_serialize_scenario() {
        let cfg = config(&["F1", "F2", "F3"]);
        let node = node_with(&cfg, &[0.1, 0.2, 0.3]);
        let mut buf = [0.0; 3];
        assert_eq!(node.serialize(&ActiveList::All, &mut buf, 0).unwrap(), 3);
        assert_eq!(buf, [0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_ens_write_read_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MULTFLT").join("0");
        let cfg = config(&["F1", "F2", "F3"]);

        let node = node_with(&cfg, &[0.1, 0.2, 0.3]);
        node.ens_write(&path).unwrap();

        let mut fresh = Multflt::new(Arc::clone(&cfg)).unwrap();
        fresh.ens_read(&path).unwrap();
        assert_eq!(fresh.data_ref(), &[0.1, 0.2, 0.3]);
        assert!(!fresh.is_output_valid());
    }

    #[test]
    fn test_ens_read_rejects_other_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node");
        node_with(&config(&["F1", "F2"]), &[1.0, 2.0])
            .ens_write(&path)
            .unwrap();

        let mut node = node_with(&config(&["F1", "F2", "F3"]), &[7.0, 8.0, 9.0]);
        assert!(matches!(node.ens_read(&path), Err(NodeError::Format(_))));
        assert_eq!(node.data_ref(), &[7.0, 8.0, 9.0]);

        let missing = dir.path().join("missing");
        assert!(matches!(node.ens_read(&missing), Err(NodeError::Io(_))));
    }

    #[test]
    fn test_ens_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node");
        let cfg = config(&["F1"]);
        node_with(&cfg, &[1.0]).ens_write(&path).unwrap();
        node_with(&cfg, &[2.0]).ens_write(&path).unwrap();

        let mut node = Multflt::new(cfg).unwrap();
        node.ens_read(&path).unwrap();
        assert_eq!(node.data_ref(), &[2.0]);
    }

    #[test]
    fn test_truncate_scenario() {
        let cfg = bounded_config();
        let mut node = node_with(&cfg, &[-0.5, 0.5, 1.5]);
        assert!(node.truncate());
        assert_eq!(node.data_ref(), &[0.0, 0.5, 1.0]);
        // idempotent, and a no-op does not touch the cache
        node.output_transform();
        assert!(!node.truncate());
        assert_eq!(node.data_ref(), &[0.0, 0.5, 1.0]);
        assert!(node.is_output_valid());
    }

    #[test]
    fn test_truncate_skips_unbounded_entries() {
        let params = vec![
            ParameterSpec::new("F1", Prior::Raw).with_bounds(-1.0, 1.0),
            ParameterSpec::new("F2", Prior::Raw),
        ];
        let cfg = MultfltConfig::new("MULTFLT", params).unwrap().shared();
        let mut node = node_with(&cfg, &[5.0, 5.0]);
        node.truncate();
        assert_eq!(node.data_ref(), &[1.0, 5.0]);
    }

    #[test]
    fn test_copy_is_deep_and_stale() {
        let cfg = config(&["F1", "F2"]);
        let mut node = node_with(&cfg, &[1.0, 2.0]);
        node.output_transform();
        let mut copy = node.copy();
        assert!(!copy.is_output_valid());
        copy.scale(2.0);
        assert_eq!(node.data_ref(), &[1.0, 2.0]);
        assert_eq!(copy.data_ref(), &[2.0, 4.0]);
    }

    #[test]
    fn test_math_ops() {
        let cfg = config(&["F1", "F2"]);
        let mut acc = Multflt::new(Arc::clone(&cfg)).unwrap();
        let x = node_with(&cfg, &[3.0, -4.0]);

        acc.iaddsqr(&x).unwrap();
        assert_eq!(acc.data_ref(), &[9.0, 16.0]);
        acc.isqrt();
        assert_eq!(acc.data_ref(), &[3.0, 4.0]);
        acc.imul(&x).unwrap();
        assert_eq!(acc.data_ref(), &[9.0, -16.0]);
        acc.isub(&x).unwrap();
        assert_eq!(acc.data_ref(), &[6.0, -12.0]);
        acc.iadd(&x).unwrap();
        assert_eq!(acc.data_ref(), &[9.0, -16.0]);
        acc.clear();
        assert_eq!(acc.data_ref(), &[0.0, 0.0]);
    }

    #[test]
    fn test_math_ops_reject_foreign_config() {
        let mut a = Multflt::new(config(&["F1", "F2"])).unwrap();
        let b = Multflt::new(config(&["G1", "G2"])).unwrap();
        assert!(matches!(a.iadd(&b), Err(NodeError::ConfigMismatch(_))));
    }

    #[test]
    fn test_initialize_is_reproducible_and_skips_constants() {
        let params = vec![
            ParameterSpec::new("F1", Prior::Raw),
            ParameterSpec::new("F2", Prior::Const { value: 1.0 }),
        ];
        let cfg = MultfltConfig::new("MULTFLT", params).unwrap().shared();
        let base = RngStream::derive(42, "MULTFLT");

        let mut a = Multflt::new(Arc::clone(&cfg)).unwrap();
        a.initialize(&mut base.for_realization(3));
        let mut b = Multflt::new(cfg).unwrap();
        b.initialize(&mut base.for_realization(3));

        assert_eq!(a.data_ref(), b.data_ref());
        assert_ne!(a.data_ref()[0], 0.0);
        assert_eq!(a.data_ref()[1], 0.0);
    }

    #[test]
    fn test_fwrite_fread_round_trip() {
        let cfg = config(&["F1", "F2", "F3"]);
        let node = node_with(&cfg, &[0.1, f64::MIN_POSITIVE, -7.25]);
        let mut bytes = Vec::new();
        node.fwrite(&mut bytes).unwrap();

        let mut back = Multflt::new(Arc::clone(&cfg)).unwrap();
        back.fread(&mut bytes.as_slice()).unwrap();
        assert_eq!(back.data_ref(), node.data_ref());
    }

    #[test]
    fn test_fread_rejects_other_config_of_same_size() {
        let node = node_with(&config(&["F1", "F2"]), &[1.0, 2.0]);
        let mut bytes = Vec::new();
        node.fwrite(&mut bytes).unwrap();

        let mut other = Multflt::new(config(&["G1", "G2"])).unwrap();
        assert!(matches!(
            other.fread(&mut bytes.as_slice()),
            Err(NodeError::ConfigMismatch(_))
        ));
        assert_eq!(other.data_ref(), &[0.0, 0.0]);
    }

    #[test]
    fn test_fprintf_results() {
        let cfg = config(&["F1", "F2", "F3"]);
        let mut node = node_with(&cfg, &[0.1, 0.2, 0.3]);
        let mut out = Vec::new();
        node.fprintf_results(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "F1 0.1\nF2 0.2\nF3 0.3\n");
    }

    #[test]
    fn test_ecl_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MULTFLT.INC");
        let cfg = config(&["F1"]);
        node_with(&cfg, &[0.5]).ecl_write(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "MULTFLT\n 'F1'  0.5 /\n/\n");
    }

    #[test]
    fn test_alloc_mean_checks_config() {
        let cfg = config(&["F1"]);
        let other = config(&["G1"]);
        let a = node_with(&cfg, &[1.0]);
        let b = node_with(&other, &[3.0]);
        assert!(matches!(
            Multflt::alloc_mean(&cfg, &[&a, &b]),
            Err(NodeError::ConfigMismatch(_))
        ));
        let mean = Multflt::alloc_mean(&cfg, &[&a]).unwrap();
        assert_eq!(mean.data_ref(), &[1.0]);
    }
}
