//! JSON-lines record emission.
//!
//! One self-contained JSON object per line, `key` first, non-ASCII written
//! literally. The file only appears at its destination once every record has
//! been encoded and flushed.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{EmitError, SerializationError};
use crate::models::ProjectedRecord;

/// What [`write_jsonl`] put on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmitSummary {
    /// Final path of the artifact.
    pub path: PathBuf,
    /// Lines written.
    pub records: usize,
    /// File size in bytes.
    pub bytes: u64,
    /// Hex SHA-256 of the file content.
    pub sha256: String,
}

/// Encode one record as a single line (without the trailing newline).
///
/// # Errors
///
/// Returns [`SerializationError`] if the encoder fails.
pub fn encode_record(record: &ProjectedRecord) -> Result<String, SerializationError> {
    serde_json::to_string(record)
        .map_err(|source| SerializationError { key: record.key().to_string(), source })
}

/// Encode every record, in order. Nothing is returned unless all succeed.
///
/// # Errors
///
/// Returns the first [`SerializationError`].
pub fn emit(records: &[ProjectedRecord]) -> Result<Vec<String>, SerializationError> {
    records.iter().map(encode_record).collect()
}

/// Decode one emitted line back into a record.
///
/// # Errors
///
/// Fails if the line is not a JSON object of strings with a `key`.
pub fn decode_line(line: &str) -> Result<ProjectedRecord, serde_json::Error> {
    serde_json::from_str(line)
}

/// Write records to `path` as JSON lines, replacing any existing file atomically.
///
/// Lines are encoded up front so an encoding failure leaves the destination
/// untouched; the temporary file lives next to the destination so the final
/// rename stays on one filesystem.
///
/// # Errors
///
/// Returns [`EmitError::Serialization`] if a record cannot be encoded and
/// [`EmitError::Io`] if the file cannot be written or moved into place.
pub fn write_jsonl(
    path: impl AsRef<Path>,
    records: &[ProjectedRecord],
) -> Result<EmitSummary, EmitError> {
    let path = path.as_ref();
    let lines = emit(records)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| EmitError::io(&dir, e))?;

    let tmp = NamedTempFile::new_in(&dir).map_err(|e| EmitError::io(&dir, e))?;
    let mut hasher = Sha256::new();
    let mut bytes = 0u64;

    {
        let mut writer = BufWriter::new(tmp.as_file());
        for line in &lines {
            for chunk in [line.as_bytes(), b"\n".as_slice()] {
                writer.write_all(chunk).map_err(|e| EmitError::io(tmp.path(), e))?;
                hasher.update(chunk);
                bytes += chunk.len() as u64;
            }
        }
        writer.flush().map_err(|e| EmitError::io(tmp.path(), e))?;
    }
    tmp.as_file().sync_all().map_err(|e| EmitError::io(tmp.path(), e))?;

    tmp.persist(path).map_err(|e| EmitError::io(path, e.error))?;

    let summary = EmitSummary {
        path: path.to_path_buf(),
        records: lines.len(),
        bytes,
        sha256: format!("{:x}", hasher.finalize()),
    };
    tracing::info!(
        path = %summary.path.display(),
        records = summary.records,
        bytes = summary.bytes,
        "Wrote JSON lines"
    );
    Ok(summary)
}
