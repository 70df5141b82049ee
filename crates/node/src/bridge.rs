//! Serialization bridge between node data and the ensemble update matrix.
//!
//! The analysis step works on one tall vector per realization that stacks
//! every parameter group on top of each other. Each node copies its active
//! entries into a window `[row_offset, row_offset + active_size)` of that
//! vector, and copies them back after the update. Which entries take part is
//! described by an [`ActiveList`].
//!
//! ```
//! use enkf_node::bridge::{deserialize_slice, serialize_slice, ActiveList};
//!
//! let data = [0.1, 0.2, 0.3, 0.4];
//! let active = ActiveList::partial(vec![3, 1]);
//! let mut column = [0.0; 5];
//! assert_eq!(serialize_slice(&data, &active, &mut column, 2).unwrap(), 2);
//! assert_eq!(column, [0.0, 0.0, 0.2, 0.4, 0.0]);
//!
//! let mut updated = [9.0; 4];
//! deserialize_slice(&mut updated, &active, &column, 2).unwrap();
//! assert_eq!(updated, [9.0, 0.2, 9.0, 0.4]);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{NodeError, Result};

/// Sorted, deduplicated entry indices.
///
/// Only built through [`ActiveList::partial`] or deserialization, both of
/// which normalize the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<usize>", into = "Vec<usize>")]
pub struct ActiveIndices(Vec<usize>);

impl ActiveIndices {
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<usize>> for ActiveIndices {
    fn from(mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self(indices)
    }
}

impl From<ActiveIndices> for Vec<usize> {
    fn from(indices: ActiveIndices) -> Self {
        indices.0
    }
}

/// Subset of a node's entries that participates in an update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActiveList {
    /// Every entry, in index order.
    #[default]
    All,
    /// Listed entries, in index order.
    Partial(ActiveIndices),
}

impl ActiveList {
    /// Build a partial list; indices are sorted and deduplicated.
    pub fn partial(indices: Vec<usize>) -> Self {
        Self::Partial(indices.into())
    }

    /// Active indices, `None` for [`ActiveList::All`].
    pub fn indices(&self) -> Option<&[usize]> {
        match self {
            ActiveList::All => None,
            ActiveList::Partial(indices) => Some(indices.as_slice()),
        }
    }

    /// Number of active entries for a node of `size` entries.
    pub fn active_size(&self, size: usize) -> usize {
        match self {
            ActiveList::All => size,
            ActiveList::Partial(indices) => indices.len(),
        }
    }

    /// Whether `index` takes part.
    pub fn is_active(&self, index: usize) -> bool {
        match self {
            ActiveList::All => true,
            ActiveList::Partial(indices) => indices.as_slice().binary_search(&index).is_ok(),
        }
    }

    /// Check that every index fits a node of `size` entries.
    fn check(&self, size: usize) -> Result<()> {
        if let ActiveList::Partial(indices) = self {
            if let Some(&last) = indices.as_slice().last() {
                if last >= size {
                    return Err(NodeError::length(size, last + 1));
                }
            }
        }
        Ok(())
    }
}

/// Row window `[row_offset, row_offset + active_size)` of a buffer of length
/// `buffer_len`.
fn window(
    active_size: usize,
    buffer_len: usize,
    row_offset: usize,
) -> Result<std::ops::Range<usize>> {
    let end = row_offset
        .checked_add(active_size)
        .ok_or_else(|| NodeError::length(buffer_len, usize::MAX))?;
    if end > buffer_len {
        return Err(NodeError::length(end, buffer_len));
    }
    Ok(row_offset..end)
}

/// Copy the active entries of `data` into `target` starting at `row_offset`.
///
/// Returns the number of values written. Nothing is written on error.
pub fn serialize_slice(
    data: &[f64],
    active: &ActiveList,
    target: &mut [f64],
    row_offset: usize,
) -> Result<usize> {
    active.check(data.len())?;
    let rows = window(active.active_size(data.len()), target.len(), row_offset)?;
    let out = &mut target[rows];
    match active {
        ActiveList::All => out.copy_from_slice(data),
        ActiveList::Partial(indices) => {
            for (slot, &i) in out.iter_mut().zip(indices.as_slice()) {
                *slot = data[i];
            }
        }
    }
    Ok(out.len())
}

/// Overwrite the active entries of `data` from `source` starting at
/// `row_offset`; inactive entries are untouched.
///
/// Returns the number of values read. `data` is untouched on error.
pub fn deserialize_slice(
    data: &mut [f64],
    active: &ActiveList,
    source: &[f64],
    row_offset: usize,
) -> Result<usize> {
    active.check(data.len())?;
    let rows = window(active.active_size(data.len()), source.len(), row_offset)?;
    let input = &source[rows];
    match active {
        ActiveList::All => data.copy_from_slice(input),
        ActiveList::Partial(indices) => {
            for (&value, &i) in input.iter().zip(indices.as_slice()) {
                data[i] = value;
            }
        }
    }
    Ok(input.len())
}
