//! Ensemble statistics over nodes of one parameter group.
//!
//! Written against [`EnkfNode`] only: nodes are flattened through
//! `serialize`, reduced row by row, and the result is written into a blank
//! node through `deserialize`. Any parameter kind gets mean and standard
//! deviation for free.

use tracing::debug;

use crate::bridge::ActiveList;
use crate::error::{NodeError, Result};
use crate::node::EnkfNode;
use crate::reductions::ordered_mean;

/// Check the ensemble is non-empty and homogeneous; returns the first node.
fn check_ensemble<'a, N: EnkfNode>(nodes: &[&'a N]) -> Result<&'a N> {
    let (first, rest) = nodes.split_first().ok_or(NodeError::EmptyEnsemble)?;
    for node in rest {
        first.check_compatible(node)?;
    }
    Ok(*first)
}

/// Node whose data is the per-entry mean over `nodes`.
///
/// Fails with [`NodeError::EmptyEnsemble`] for zero nodes and
/// [`NodeError::ConfigMismatch`] when the nodes do not share a config. The
/// result does not depend on the order of `nodes`.
pub fn alloc_mean<N: EnkfNode>(nodes: &[&N]) -> Result<N> {
    let first = check_ensemble(nodes)?;
    let size = first.size();
    let members = nodes.len();

    // column j holds realization j
    let mut matrix = vec![0.0; size * members];
    for (j, node) in nodes.iter().enumerate() {
        node.serialize(&ActiveList::All, &mut matrix, j * size)?;
    }

    let mut row = Vec::with_capacity(members);
    let mean: Vec<f64> = (0..size)
        .map(|i| {
            row.clear();
            row.extend((0..members).map(|j| matrix[j * size + i]));
            ordered_mean(&row)
        })
        .collect();

    let mut out = first.blank();
    out.deserialize(&ActiveList::All, &mean, 0)?;
    debug!(key = %first.key(), members, "Ensemble mean computed");
    Ok(out)
}

/// Per-entry mean and population standard deviation over `nodes`.
///
/// Same errors as [`alloc_mean`].
pub fn alloc_stats<N: EnkfNode>(nodes: &[&N]) -> Result<(N, N)> {
    let mean = alloc_mean(nodes)?;

    let mut std = mean.blank();
    for node in nodes {
        let mut deviation = node.copy();
        deviation.isub(&mean)?;
        std.iaddsqr(&deviation)?;
    }
    std.scale(1.0 / nodes.len() as f64);
    std.isqrt();

    Ok((mean, std))
}
