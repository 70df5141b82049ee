//! Whole-ensemble snapshots of one parameter group.
//!
//! A checkpoint holds every member's node record (as written by
//! [`EnkfNode::fwrite`]) under a header naming the group and its config
//! fingerprint. The file is bincode encoded and zstd compressed.
//!
//! Loading fails loudly when the header does not match the template the
//! caller restores into; a snapshot taken under another config is never
//! silently reinterpreted.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use enkf_foundation::ParameterKey;
use enkf_node::{AnyNode, EnkfNode, NodeError, NodeKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, StorageError};

/// Checkpoint format version (increment on breaking changes).
pub const CHECKPOINT_VERSION: u32 = 1;

/// Default zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Identity of the snapshotted group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointHeader {
    pub version: u32,
    pub kind: NodeKind,
    pub key: ParameterKey,
    /// Config fingerprint of every member.
    pub fingerprint: u64,
    pub created_at: SystemTime,
}

/// One realization's node record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMember {
    pub iens: usize,
    pub record: Vec<u8>,
}

/// Complete checkpoint (header + members).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleCheckpoint {
    pub header: CheckpointHeader,
    pub members: Vec<CheckpointMember>,
}

impl EnsembleCheckpoint {
    /// Snapshot `members`, which must all share one config.
    pub fn capture(members: &[(usize, &AnyNode)]) -> Result<Self> {
        let (_, first) = members.first().ok_or(NodeError::EmptyEnsemble)?;
        let mut records = Vec::with_capacity(members.len());
        for (iens, node) in members {
            first.check_compatible(node)?;
            let mut record = Vec::new();
            node.fwrite(&mut record)?;
            records.push(CheckpointMember {
                iens: *iens,
                record,
            });
        }

        Ok(Self {
            header: CheckpointHeader {
                version: CHECKPOINT_VERSION,
                kind: first.kind(),
                key: first.key().clone(),
                fingerprint: first.fingerprint(),
                created_at: SystemTime::now(),
            },
            members: records,
        })
    }

    /// Check the header against `template`.
    pub fn validate(&self, template: &AnyNode) -> Result<()> {
        let header = &self.header;
        if header.version != CHECKPOINT_VERSION {
            return Err(StorageError::Checkpoint(format!(
                "unsupported checkpoint version {} (expected {})",
                header.version, CHECKPOINT_VERSION
            )));
        }
        if header.kind != template.kind() || &header.key != template.key() {
            return Err(StorageError::Checkpoint(format!(
                "checkpoint holds {} {}, expected {} {}",
                header.kind,
                header.key,
                template.kind(),
                template.key()
            )));
        }
        if header.fingerprint != template.fingerprint() {
            return Err(StorageError::Checkpoint(format!(
                "{} config changed since the checkpoint was taken \
                 (fingerprint {:016x}, current {:016x})",
                header.key,
                header.fingerprint,
                template.fingerprint()
            )));
        }
        Ok(())
    }

    /// Rebuild every member from `template`.
    pub fn restore(&self, template: &AnyNode) -> Result<Vec<(usize, AnyNode)>> {
        self.validate(template)?;
        self.members
            .iter()
            .map(|member| {
                let mut node = template.blank();
                node.fread(&mut member.record.as_slice())?;
                Ok((member.iens, node))
            })
            .collect()
    }
}

/// Write a checkpoint of `members` to `path` (bincode + zstd).
pub fn write_checkpoint(
    path: &Path,
    members: &[(usize, &AnyNode)],
    compression_level: i32,
) -> Result<()> {
    let checkpoint = EnsembleCheckpoint::capture(members)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let serialized = bincode::serialize(&checkpoint)
        .map_err(|e| StorageError::Checkpoint(format!("serialization failed: {e}")))?;
    let compressed = zstd::encode_all(&serialized[..], compression_level)?;
    debug!(
        bytes = serialized.len(),
        compressed_bytes = compressed.len(),
        "Checkpoint encoded"
    );

    let tmp = path.with_extension("ckpt.tmp");
    fs::write(&tmp, &compressed)?;
    fs::rename(&tmp, path)?;

    info!(
        path = %path.display(),
        key = %checkpoint.header.key,
        members = checkpoint.members.len(),
        "Checkpoint written"
    );
    Ok(())
}

/// Read a checkpoint from `path` (decompress + deserialize).
pub fn read_checkpoint(path: &Path) -> Result<EnsembleCheckpoint> {
    let compressed = fs::read(path)?;
    let serialized = zstd::decode_all(&compressed[..])
        .map_err(|e| StorageError::Checkpoint(format!("decompression failed: {e}")))?;
    let checkpoint: EnsembleCheckpoint = bincode::deserialize(&serialized)
        .map_err(|e| StorageError::Checkpoint(format!("deserialization failed: {e}")))?;
    debug!(
        path = %path.display(),
        compressed_bytes = compressed.len(),
        "Checkpoint read"
    );
    Ok(checkpoint)
}

/// Read a checkpoint and rebuild its members from `template`.
pub fn load_checkpoint(path: &Path, template: &AnyNode) -> Result<Vec<(usize, AnyNode)>> {
    let members = read_checkpoint(path)?.restore(template)?;
    info!(
        path = %path.display(),
        key = %template.key(),
        members = members.len(),
        "Checkpoint loaded"
    );
    Ok(members)
}
