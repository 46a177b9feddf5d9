//! Snapshot persistence
//!
//! Snapshots are stored as comma-separated UTF-8 with a byte-order mark and CRLF record
//! terminators, the header being the first record.

use super::{Row, Snapshot};
use crate::config::backup_path_for;
use crate::error::{Result, SnapshotError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read the snapshot at `path`
///
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
/// - [`SnapshotError::Empty`] when the file holds no header row
/// - [`SnapshotError::MissingColumn`] when the header has no `task_id_column` cell
/// - [`SnapshotError::RaggedRow`] when a row is wider or narrower than the header
pub async fn read_snapshot(path: &Path, task_id_column: &str) -> Result<Option<Snapshot>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No snapshot file");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let data = bytes.strip_prefix(BOM).unwrap_or(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);
    let mut records = reader.records();

    let header: Row = match records.next() {
        Some(record) => record?.iter().map(str::to_string).collect(),
        None => {
            return Err(SnapshotError::Empty {
                path: path.to_path_buf(),
            }
            .into());
        }
    };
    if !header.iter().any(|cell| cell == task_id_column) {
        return Err(SnapshotError::MissingColumn {
            column: task_id_column.to_string(),
        }
        .into());
    }

    let mut rows: Vec<Row> = Vec::new();
    for record in records {
        rows.push(record?.iter().map(str::to_string).collect());
    }

    let snapshot = Snapshot::with_rows(header, rows)?;
    info!(path = %path.display(), rows = snapshot.len(), "Read snapshot");
    Ok(Some(snapshot))
}

/// Write `snapshot` to `path`, replacing any existing file
///
/// Missing parent directories are created.
pub async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(BOM.to_vec());
    writer.write_record(snapshot.header())?;
    for row in snapshot.rows() {
        writer.write_record(row)?;
    }
    let data = writer.into_inner().map_err(|e| e.into_error())?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data).await?;

    info!(path = %path.display(), rows = snapshot.len(), "Wrote snapshot");
    Ok(())
}

/// Copy the file at `path` verbatim to `<path>.backup`
pub async fn backup_snapshot(path: &Path) -> Result<PathBuf> {
    let backup = backup_path_for(path);
    tokio::fs::copy(path, &backup).await?;
    info!(from = %path.display(), to = %backup.display(), "Backed up snapshot");
    Ok(backup)
}
