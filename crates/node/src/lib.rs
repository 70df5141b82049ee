//! EnKF Parameter Nodes
//!
//! One parameter group of one ensemble realization, and the contract the
//! update engine drives it through.
//!
//! - [`EnkfNode`]: the capability set every parameter kind implements.
//! - [`Multflt`]: fault transmissibility multipliers, bound to a shared
//!   [`MultfltConfig`].
//! - [`AnyNode`] / [`ParameterConfig`]: enum dispatch over every kind.
//! - [`bridge`]: flattening nodes into the update matrix and back.
//! - [`aggregate`]: ensemble mean and standard deviation.
//!
//! ```
//! use enkf_node::{ActiveList, EnkfNode, Multflt, MultfltConfig, ParameterSpec, Prior};
//!
//! let config = MultfltConfig::new(
//!     "MULTFLT",
//!     vec![
//!         ParameterSpec::new("F1", Prior::Raw),
//!         ParameterSpec::new("F2", Prior::Uniform { min: 0.0, max: 1.0 }),
//!     ],
//! )
//! .unwrap()
//! .shared();
//!
//! let mut node = Multflt::new(config).unwrap();
//! node.deserialize(&ActiveList::All, &[0.25, 0.0], 0).unwrap();
//! assert_eq!(node.output_ref(), &[0.25, 0.5]);
//! ```

pub mod aggregate;
pub mod any;
pub mod bridge;
pub mod config;
pub mod error;
pub mod multflt;
pub mod node;
pub mod persistence;
pub mod reductions;
pub mod report;
pub mod transform;

pub use aggregate::{alloc_mean, alloc_stats};
pub use any::{AnyNode, ParameterConfig};
pub use bridge::{ActiveIndices, ActiveList};
pub use config::{Bounds, MultfltConfig, ParameterSpec};
pub use error::{NodeError, Result};
pub use multflt::Multflt;
pub use node::{EnkfNode, NodeKind};
pub use transform::Prior;
