//! Ensemble case directory.
//!
//! ```text
//! <root>/
//!   case.json                      manifest
//!   state_map.json                 per-realization state
//!   parameters/<KEY>/realization-<iens>.node
//! ```
//!
//! Realizations share nothing but the immutable config, so bulk operations
//! load and store them in parallel.

use std::fs;
use std::path::{Path, PathBuf};

use enkf_foundation::{ParameterKey, RealizationId, RngStream};
use enkf_node::{AnyNode, EnkfNode};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::checkpoint::{load_checkpoint, write_checkpoint};
use crate::error::{Result, StorageError};
use crate::parameters::{row_count, Parameter};
use crate::state_map::{RealizationState, StateMap};

/// Manifest file marking a directory as a case.
pub const CASE_MANIFEST: &str = "case.json";

/// Case layout version (increment on breaking changes).
pub const CASE_FORMAT_VERSION: u32 = 1;

const STATE_MAP_FILE: &str = "state_map.json";
const PARAMETER_DIR: &str = "parameters";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CaseManifest {
    case_name: String,
    format_version: u32,
}

/// A mounted ensemble case.
#[derive(Debug)]
pub struct EnsembleFs {
    root: PathBuf,
    case_name: String,
    read_only: bool,
    state_map: StateMap,
}

impl EnsembleFs {
    /// Create a case at `path` and mount it writable. An existing case is
    /// mounted as is.
    pub fn create(path: &Path) -> Result<Self> {
        let manifest_path = path.join(CASE_MANIFEST);
        if !manifest_path.exists() {
            fs::create_dir_all(path.join(PARAMETER_DIR))?;
            let case_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "default".to_string());
            let manifest = CaseManifest {
                case_name,
                format_version: CASE_FORMAT_VERSION,
            };
            fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
            info!(path = %path.display(), case = %manifest.case_name, "Case created");
        }
        Self::mount(path, false)
    }

    /// Mount the existing case at `path`.
    pub fn mount(path: &Path, read_only: bool) -> Result<Self> {
        let manifest_path = path.join(CASE_MANIFEST);
        if !manifest_path.is_file() {
            return Err(StorageError::NotACase {
                path: path.to_path_buf(),
                reason: format!("missing {CASE_MANIFEST}"),
            });
        }
        let manifest: CaseManifest = serde_json::from_str(&fs::read_to_string(&manifest_path)?)?;
        if manifest.format_version != CASE_FORMAT_VERSION {
            return Err(StorageError::NotACase {
                path: path.to_path_buf(),
                reason: format!(
                    "case format version {} (expected {})",
                    manifest.format_version, CASE_FORMAT_VERSION
                ),
            });
        }

        let state_map = StateMap::load(&path.join(STATE_MAP_FILE))?;
        info!(
            path = %path.display(),
            case = %manifest.case_name,
            read_only,
            realizations = state_map.len(),
            "Case mounted"
        );
        Ok(Self {
            root: path.to_path_buf(),
            case_name: manifest.case_name,
            read_only,
            state_map,
        })
    }

    pub fn case_name(&self) -> &str {
        &self.case_name
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_map(&self) -> &StateMap {
        &self.state_map
    }

    /// Realizations currently in `state`.
    pub fn realizations(&self, state: RealizationState) -> Vec<usize> {
        self.state_map.realizations(state)
    }

    /// Record a state change and persist the map.
    pub fn set_state(&mut self, iens: usize, state: RealizationState) -> Result<()> {
        self.check_writable()?;
        self.state_map.set(iens, state);
        self.sync()
    }

    /// Persist the state map.
    pub fn sync(&self) -> Result<()> {
        self.state_map.save(&self.root.join(STATE_MAP_FILE))
    }

    /// File holding realization `iens` of group `key`.
    pub fn node_path(&self, key: &ParameterKey, iens: usize) -> PathBuf {
        self.root
            .join(PARAMETER_DIR)
            .join(key.as_str())
            .join(format!("{}.node", RealizationId(iens)))
    }

    pub fn has_node(&self, key: &ParameterKey, iens: usize) -> bool {
        self.node_path(key, iens).is_file()
    }

    /// Store `node` as realization `iens`.
    pub fn save_node(&mut self, iens: usize, node: &AnyNode) -> Result<()> {
        self.check_writable()?;
        self.write_node(iens, node)?;
        self.state_map
            .update_undefined(iens, RealizationState::Initialized);
        self.sync()
    }

    /// Load realization `iens` into `node`; the group is `node`'s key.
    pub fn load_node(&self, iens: usize, node: &mut AnyNode) -> Result<()> {
        let path = self.node_path(node.key(), iens);
        node.ens_read(&path)?;
        debug!(key = %node.key(), iens, "Node loaded");
        Ok(())
    }

    /// Stack the active entries of every group into one column per
    /// realization, in the order of `realizations`.
    ///
    /// A realization that fails to load is marked
    /// [`RealizationState::LoadFailure`] and the first failure is returned.
    pub fn load_parameters(
        &mut self,
        parameters: &[Parameter],
        realizations: &[usize],
    ) -> Result<DMatrix<f64>> {
        let rows = row_count(parameters);
        let mut data = vec![0.0; rows * realizations.len()];
        if rows > 0 {
            let this = &*self;
            let failures: Vec<(usize, StorageError)> = data
                .par_chunks_mut(rows)
                .zip(realizations.par_iter())
                .filter_map(|(column, &iens)| {
                    this.load_column(parameters, iens, column)
                        .err()
                        .map(|e| (iens, e))
                })
                .collect();
            self.record_failures(failures)?;
        }

        info!(
            case = %self.case_name,
            rows,
            realizations = realizations.len(),
            "Parameters loaded"
        );
        Ok(DMatrix::from_vec(rows, realizations.len(), data))
    }

    /// Write each column of `matrix` back into its realization's nodes.
    ///
    /// Inactive entries keep their stored values (a group without a stored
    /// node starts from its template). Every node is truncated to its bounds
    /// before it is written. Nothing is written unless every column applies
    /// cleanly.
    pub fn save_parameters(
        &mut self,
        parameters: &[Parameter],
        realizations: &[usize],
        matrix: &DMatrix<f64>,
    ) -> Result<()> {
        self.check_writable()?;
        let rows = row_count(parameters);
        if matrix.nrows() != rows {
            return Err(StorageError::shape(rows, matrix.nrows()));
        }
        if matrix.ncols() != realizations.len() {
            return Err(StorageError::shape(realizations.len(), matrix.ncols()));
        }

        if rows > 0 {
            let this = &*self;
            // every column is applied in memory before the first node is written
            let updated: Vec<(usize, Vec<AnyNode>)> = matrix
                .as_slice()
                .par_chunks(rows)
                .zip(realizations.par_iter())
                .map(|(column, &iens)| {
                    this.apply_column(parameters, iens, column)
                        .map(|nodes| (iens, nodes))
                })
                .collect::<Result<_>>()?;
            updated.par_iter().try_for_each(|(iens, nodes)| {
                nodes.iter().try_for_each(|node| this.write_node(*iens, node))
            })?;
        }

        for &iens in realizations {
            self.state_map
                .update_undefined(iens, RealizationState::Initialized);
        }
        self.sync()?;
        info!(
            case = %self.case_name,
            rows,
            realizations = realizations.len(),
            "Parameters saved"
        );
        Ok(())
    }

    /// Sample every realization of `template`'s group from its prior and
    /// store it.
    ///
    /// Realization `iens` draws from `RngStream::derive(seed, key)
    /// .for_realization(iens)`, so the result does not depend on which other
    /// realizations are initialized alongside it.
    pub fn init_ensemble(
        &mut self,
        template: &AnyNode,
        seed: u64,
        realizations: &[usize],
    ) -> Result<()> {
        self.check_writable()?;
        let base = RngStream::derive(seed, template.key().as_str());
        let this = &*self;
        realizations.par_iter().try_for_each(|&iens| {
            let mut node = template.blank();
            node.initialize(&mut base.for_realization(iens));
            this.write_node(iens, &node)
        })?;

        for &iens in realizations {
            self.state_map.set(iens, RealizationState::Initialized);
        }
        self.sync()?;
        info!(
            case = %self.case_name,
            key = %template.key(),
            seed,
            realizations = realizations.len(),
            "Ensemble initialized"
        );
        Ok(())
    }

    /// Load realizations of `template`'s group, in the order given.
    pub fn load_ensemble(
        &self,
        template: &AnyNode,
        realizations: &[usize],
    ) -> Result<Vec<AnyNode>> {
        realizations
            .par_iter()
            .map(|&iens| {
                let mut node = template.blank();
                self.load_node(iens, &mut node)?;
                Ok(node)
            })
            .collect()
    }

    /// Snapshot the stored realizations of `template`'s group to `path`.
    pub fn write_checkpoint(
        &self,
        path: &Path,
        template: &AnyNode,
        realizations: &[usize],
        compression_level: i32,
    ) -> Result<()> {
        let nodes = self.load_ensemble(template, realizations)?;
        let members: Vec<(usize, &AnyNode)> =
            realizations.iter().copied().zip(nodes.iter()).collect();
        write_checkpoint(path, &members, compression_level)
    }

    /// Store every member of the checkpoint at `path`. Returns the restored
    /// realizations.
    pub fn restore_checkpoint(&mut self, path: &Path, template: &AnyNode) -> Result<Vec<usize>> {
        self.check_writable()?;
        let members = load_checkpoint(path, template)?;
        for (iens, node) in &members {
            self.write_node(*iens, node)?;
            self.state_map
                .update_undefined(*iens, RealizationState::Initialized);
        }
        self.sync()?;
        Ok(members.into_iter().map(|(iens, _)| iens).collect())
    }

    /// Copy the stored nodes of `keys` for `realizations` into `target`.
    ///
    /// A realization failed here is marked
    /// [`RealizationState::ParentFailure`] in `target` and skipped. An
    /// undefined realization without stored nodes is skipped. Any other
    /// missing node fails the copy before a file is written.
    pub fn copy_to(
        &self,
        target: &mut EnsembleFs,
        keys: &[ParameterKey],
        realizations: &[usize],
    ) -> Result<()> {
        target.check_writable()?;
        let mut copies = Vec::new();
        for &iens in realizations {
            let state = self.state_map.get(iens);
            if state.is_failure() {
                copies.push((iens, false));
                continue;
            }
            let stored = keys.iter().filter(|key| self.has_node(key, iens)).count();
            if stored == 0 && state == RealizationState::Undefined {
                debug!(case = %self.case_name, iens, "Skipping realization without nodes");
                continue;
            }
            if let Some(key) = keys.iter().find(|key| !self.has_node(key, iens)) {
                return Err(StorageError::MissingNode {
                    key: key.to_string(),
                    iens,
                });
            }
            copies.push((iens, true));
        }

        let copied = self.copy_nodes(target, keys, &copies);
        // states of the realizations copied so far are kept even on error
        target.sync()?;
        copied?;
        info!(
            from = %self.case_name,
            to = %target.case_name,
            realizations = copies.len(),
            "Case copied"
        );
        Ok(())
    }

    fn copy_nodes(
        &self,
        target: &mut EnsembleFs,
        keys: &[ParameterKey],
        copies: &[(usize, bool)],
    ) -> Result<()> {
        for &(iens, has_data) in copies {
            if !has_data {
                target.state_map.set(iens, RealizationState::ParentFailure);
                continue;
            }
            for key in keys {
                let dest = target.node_path(key, iens);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(self.node_path(key, iens), &dest)?;
            }
            target
                .state_map
                .update_undefined(iens, RealizationState::Initialized);
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly(self.case_name.clone()));
        }
        Ok(())
    }

    fn write_node(&self, iens: usize, node: &AnyNode) -> Result<()> {
        node.ens_write(&self.node_path(node.key(), iens))?;
        debug!(key = %node.key(), iens, "Node stored");
        Ok(())
    }

    fn load_column(&self, parameters: &[Parameter], iens: usize, column: &mut [f64]) -> Result<()> {
        let mut offset = 0;
        for parameter in parameters {
            let mut node = parameter.template.blank();
            self.load_node(iens, &mut node)?;
            offset += node.serialize(&parameter.active, column, offset)?;
        }
        Ok(())
    }

    /// Updated nodes of every group for one column.
    fn apply_column(
        &self,
        parameters: &[Parameter],
        iens: usize,
        column: &[f64],
    ) -> Result<Vec<AnyNode>> {
        let mut offset = 0;
        let mut nodes = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            let mut node = parameter.template.blank();
            if self.has_node(parameter.key(), iens) {
                self.load_node(iens, &mut node)?;
            }
            offset += node.deserialize(&parameter.active, column, offset)?;
            if node.truncate() {
                debug!(key = %parameter.key(), iens, "Updated values truncated to bounds");
            }
            nodes.push(node);
        }
        Ok(nodes)
    }

    fn record_failures(&mut self, failures: Vec<(usize, StorageError)>) -> Result<()> {
        if failures.is_empty() {
            return Ok(());
        }
        if !self.read_only {
            for (iens, _) in &failures {
                self.state_map.set(*iens, RealizationState::LoadFailure);
            }
            self.sync()?;
        }
        let mut failures = failures.into_iter();
        let first = failures.next();
        for (iens, error) in failures {
            warn!(case = %self.case_name, iens, %error, "Realization failed to load");
        }
        match first {
            Some((iens, error)) => {
                warn!(case = %self.case_name, iens, %error, "Realization failed to load");
                Err(error)
            }
            None => Ok(()),
        }
    }
}
