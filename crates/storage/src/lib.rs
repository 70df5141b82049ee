//! EnKF Storage
//!
//! Ensemble cases on disk: one node file per parameter group and
//! realization, a per-realization state map, and the parameter matrices the
//! update engine reads and writes.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use enkf_node::{MultfltConfig, ParameterConfig};
//! use enkf_storage::{EnsembleFs, Parameter};
//!
//! let config: ParameterConfig = MultfltConfig::from_json_file(Path::new("multflt.json"))?
//!     .shared()
//!     .into();
//! let mut fs = EnsembleFs::create(Path::new("storage/default_0"))?;
//! fs.init_ensemble(&config.alloc()?, 42, &[0, 1, 2])?;
//!
//! let parameters = vec![Parameter::new(config.alloc()?)];
//! let matrix = fs.load_parameters(&parameters, &[0, 1, 2])?;
//! fs.save_parameters(&parameters, &[0, 1, 2], &matrix)?;
//! # Ok::<(), enkf_storage::StorageError>(())
//! ```

pub mod checkpoint;
pub mod error;
pub mod fs;
pub mod parameters;
pub mod state_map;

pub use checkpoint::{load_checkpoint, write_checkpoint, EnsembleCheckpoint};
pub use error::{Result, StorageError};
pub use fs::EnsembleFs;
pub use parameters::Parameter;
pub use state_map::{RealizationState, StateMap};
