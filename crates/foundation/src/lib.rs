//! EnKF Foundation
//!
//! Small building blocks shared by every ensemble parameter crate: stable
//! hashing for config fingerprints, deterministic random streams for sampling
//! priors per realization, and typed identifiers.

pub mod ids;
pub mod rng;
pub mod stable_hash;

pub use ids::{ParameterKey, RealizationId};
pub use rng::RngStream;
pub use stable_hash::{fnv1a64, fnv1a64_str, StableHasher};
