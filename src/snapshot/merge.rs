//! Keyed reconciliation of a fresh snapshot with a persisted one

use super::Snapshot;
use crate::error::MergeError;
use std::collections::HashSet;
use tracing::info;

/// Result of a merge
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Combined snapshot
    pub snapshot: Snapshot,
    /// Data rows taken from the new snapshot
    pub new_rows: usize,
    /// Data rows carried over from the old snapshot
    pub carried_over: usize,
}

/// Replaces rows of refreshed tasks and keeps every other row of the old snapshot
///
/// Task ids are compared by exact string equality.
#[derive(Clone, Debug)]
pub struct SnapshotMerger {
    task_id_column: String,
}

impl SnapshotMerger {
    /// Merger keyed on the header cell named `task_id_column`
    pub fn new(task_id_column: impl Into<String>) -> Self {
        Self {
            task_id_column: task_id_column.into(),
        }
    }

    /// New rows in their order, followed by the old rows whose task id is not among them
    ///
    /// # Errors
    /// - [`MergeError::HeaderMismatch`] unless both headers are identical
    /// - [`MergeError::MissingColumn`] when the header has no task id column
    pub fn merge(&self, new: Snapshot, old: Snapshot) -> Result<MergeOutcome, MergeError> {
        if new.header() != old.header() {
            return Err(MergeError::HeaderMismatch {
                old: old.header().to_vec(),
                new: new.header().to_vec(),
            });
        }

        let key = new
            .column_index(&self.task_id_column)
            .ok_or_else(|| MergeError::MissingColumn {
                column: self.task_id_column.clone(),
            })?;

        let fresh: HashSet<&str> = new.rows().iter().map(|row| row[key].as_str()).collect();
        let kept: Vec<_> = old
            .rows()
            .iter()
            .filter(|row| !fresh.contains(row[key].as_str()))
            .cloned()
            .collect();

        let new_rows = new.len();
        let carried_over = kept.len();
        info!(
            new_rows,
            carried_over,
            replaced = old.len() - carried_over,
            "Merged snapshot"
        );

        // Old rows already have the width of the shared header
        let mut snapshot = new;
        snapshot.rows.extend(kept);

        Ok(MergeOutcome {
            snapshot,
            new_rows,
            carried_over,
        })
    }
}
