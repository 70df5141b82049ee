//! Integration test harness for ensemble parameter cases.
//!
//! This crate provides utilities for end-to-end testing of the update
//! round trip: Config → Initialize → Load matrix → Update → Save → Verify.

use enkf_node::{ActiveList, AnyNode, EnkfNode, MultfltConfig, ParameterConfig};
use enkf_storage::{EnsembleFs, Parameter};
use nalgebra::DMatrix;
use tempfile::TempDir;

/// A freshly initialized ensemble case in a temporary directory.
pub struct TestEnsemble {
    // keeps the case directory alive
    _dir: TempDir,
    fs: EnsembleFs,
    config: ParameterConfig,
    realizations: Vec<usize>,
}

impl TestEnsemble {
    /// Create a case from a JSON parameter config and sample `realizations`
    /// members from the prior with `seed`.
    ///
    /// # Panics
    ///
    /// Panics if the config is invalid or the case cannot be written.
    pub fn from_json(json: &str, realizations: usize, seed: u64) -> Self {
        let config: ParameterConfig = MultfltConfig::from_json_str(json)
            .expect("invalid parameter config")
            .shared()
            .into();
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut fs = EnsembleFs::create(&dir.path().join("default_0")).expect("create case");

        let realizations: Vec<usize> = (0..realizations).collect();
        let template = config.alloc().expect("alloc template");
        fs.init_ensemble(&template, seed, &realizations)
            .expect("init ensemble");

        Self {
            _dir: dir,
            fs,
            config,
            realizations,
        }
    }

    pub fn fs(&self) -> &EnsembleFs {
        &self.fs
    }

    pub fn fs_mut(&mut self) -> &mut EnsembleFs {
        &mut self.fs
    }

    pub fn config(&self) -> &ParameterConfig {
        &self.config
    }

    pub fn realizations(&self) -> &[usize] {
        &self.realizations
    }

    /// Blank node of the parameter group.
    pub fn template(&self) -> AnyNode {
        self.config.alloc().expect("alloc template")
    }

    /// The group with `active` entries taking part in the update.
    pub fn parameters(&self, active: ActiveList) -> Vec<Parameter> {
        vec![Parameter::new(self.template()).with_active(active)]
    }

    /// Load the parameter matrix over every realization.
    pub fn load_matrix(&mut self, active: ActiveList) -> DMatrix<f64> {
        let parameters = self.parameters(active);
        self.fs
            .load_parameters(&parameters, &self.realizations)
            .expect("load parameters")
    }

    /// Write an updated matrix back.
    pub fn save_matrix(&mut self, active: ActiveList, matrix: &DMatrix<f64>) {
        let parameters = self.parameters(active);
        self.fs
            .save_parameters(&parameters, &self.realizations, matrix)
            .expect("save parameters");
    }

    /// Stored node of realization `iens`.
    pub fn node(&self, iens: usize) -> AnyNode {
        let mut node = self.template();
        self.fs.load_node(iens, &mut node).expect("load node");
        node
    }

    /// Latent data of realization `iens`.
    pub fn data(&self, iens: usize) -> Vec<f64> {
        let node = self.node(iens);
        let mut data = vec![0.0; node.size()];
        node.serialize(&ActiveList::All, &mut data, 0)
            .expect("serialize node");
        data
    }

    /// Every stored node, in realization order.
    pub fn nodes(&self) -> Vec<AnyNode> {
        self.fs
            .load_ensemble(&self.template(), &self.realizations)
            .expect("load ensemble")
    }
}
