//! On-disk records for nodes.
//!
//! Two layouts, both bincode encoded (fixed-width little-endian integers,
//! `f64` stored by bit pattern, so values round-trip exactly):
//!
//! - [`NodeRecord`]: header + data. One file per realization in the
//!   ensemble storage area (`ens_write` / `ens_read`).
//! - [`CheckpointRecord`]: header + config key + config fingerprint + data,
//!   written to an arbitrary stream (`fwrite` / `fread`). The fingerprint lets
//!   a reader refuse a checkpoint taken with a different config even when the
//!   size happens to match.
//!
//! The header carries the magic bytes, a format version, the kind tag and the
//! declared length, so a reader detects truncated or foreign files and length
//! mismatches before touching the node.

use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use enkf_foundation::ParameterKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NodeError, Result};
use crate::node::NodeKind;

/// Magic bytes at the start of every node record.
pub const NODE_MAGIC: [u8; 4] = *b"ENKF";

/// Record format version (increment on breaking changes).
pub const NODE_FORMAT_VERSION: u32 = 1;

/// Header shared by both record layouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub kind: NodeKind,
    /// Declared number of values.
    pub size: u64,
}

impl NodeHeader {
    pub fn new(kind: NodeKind, size: usize) -> Self {
        Self {
            magic: NODE_MAGIC,
            version: NODE_FORMAT_VERSION,
            kind,
            size: size as u64,
        }
    }

    /// Check the header against what the reading node expects, and the
    /// declared size against the number of values actually stored.
    pub fn validate(&self, kind: NodeKind, size: usize, stored: usize) -> Result<()> {
        if self.magic != NODE_MAGIC {
            return Err(NodeError::Format("not a node record (bad magic)".into()));
        }
        if self.version != NODE_FORMAT_VERSION {
            return Err(NodeError::Format(format!(
                "unsupported record version {} (expected {})",
                self.version, NODE_FORMAT_VERSION
            )));
        }
        if self.kind != kind {
            return Err(NodeError::Format(format!(
                "record holds a {} node, expected {}",
                self.kind, kind
            )));
        }
        if self.size != stored as u64 {
            return Err(NodeError::Format(format!(
                "record declares {} values but stores {}",
                self.size, stored
            )));
        }
        if self.size != size as u64 {
            return Err(NodeError::Format(format!(
                "record holds {} values, config size is {}",
                self.size, size
            )));
        }
        Ok(())
    }
}

/// Per-realization node file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub header: NodeHeader,
    pub data: Vec<f64>,
}

impl NodeRecord {
    pub fn new(kind: NodeKind, data: &[f64]) -> Self {
        Self {
            header: NodeHeader::new(kind, data.len()),
            data: data.to_vec(),
        }
    }

    /// Validate and hand out the data.
    pub fn into_data(self, kind: NodeKind, size: usize) -> Result<Vec<f64>> {
        self.header.validate(kind, size, self.data.len())?;
        Ok(self.data)
    }
}

/// Checkpoint record carrying config identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub header: NodeHeader,
    pub key: ParameterKey,
    pub fingerprint: u64,
    pub data: Vec<f64>,
}

impl CheckpointRecord {
    pub fn new(kind: NodeKind, key: &ParameterKey, fingerprint: u64, data: &[f64]) -> Self {
        Self {
            header: NodeHeader::new(kind, data.len()),
            key: key.clone(),
            fingerprint,
            data: data.to_vec(),
        }
    }

    /// Validate against the reading node and hand out the data.
    pub fn into_data(
        self,
        kind: NodeKind,
        key: &ParameterKey,
        fingerprint: u64,
        size: usize,
    ) -> Result<Vec<f64>> {
        self.header.validate(kind, size, self.data.len())?;
        if &self.key != key {
            return Err(NodeError::ConfigMismatch(format!(
                "checkpoint belongs to {}, expected {}",
                self.key, key
            )));
        }
        if self.fingerprint != fingerprint {
            return Err(NodeError::ConfigMismatch(format!(
                "checkpoint of {} was written with a different config \
                 (fingerprint {:016x}, current {:016x})",
                key, self.fingerprint, fingerprint
            )));
        }
        Ok(self.data)
    }
}

fn from_bincode(err: bincode::Error) -> NodeError {
    match *err {
        bincode::ErrorKind::Io(e) if e.kind() == ErrorKind::UnexpectedEof => {
            NodeError::Format("record is truncated".into())
        }
        bincode::ErrorKind::Io(e) => NodeError::Io(e),
        other => NodeError::Format(other.to_string()),
    }
}

/// Encode a record onto a stream.
pub fn write_record<T: Serialize>(writer: &mut dyn Write, record: &T) -> Result<()> {
    bincode::serialize_into(&mut *writer, record).map_err(from_bincode)
}

/// Decode a record from a stream.
pub fn read_record<T: DeserializeOwned>(reader: &mut dyn Read) -> Result<T> {
    bincode::deserialize_from(&mut *reader).map_err(from_bincode)
}

/// Sibling temporary file used for atomic replacement.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write a record file, replacing any existing file atomically.
pub fn write_record_file<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let bytes = bincode::serialize(record).map_err(from_bincode)?;
    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, &bytes).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    debug!(path = %path.display(), bytes = bytes.len(), "Node record written");
    Ok(())
}

/// Read a record file.
pub fn read_record_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "Node record read");
    bincode::deserialize(&bytes).map_err(from_bincode)
}
