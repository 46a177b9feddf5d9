//! Tabular snapshot of the board
//!
//! A [`Snapshot`] is a header row plus data rows, every row holding exactly as many cells
//! as the header. It is built from tasks by [`projection`], combined with a previous
//! snapshot by [`merge`] and persisted by [`store`].

pub mod merge;
pub mod projection;
pub mod store;

pub use merge::{MergeOutcome, SnapshotMerger};
pub use projection::StickerCatalog;
pub use store::{backup_snapshot, read_snapshot, write_snapshot};

use crate::error::SnapshotError;

/// Ordered cells, positionally aligned to a header
pub type Row = Vec<String>;

/// Header plus data rows of equal width
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    header: Row,
    rows: Vec<Row>,
}

impl Snapshot {
    /// Snapshot with no data rows
    pub fn new(header: Row) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Snapshot from a header and data rows
    ///
    /// # Errors
    /// Returns [`SnapshotError::RaggedRow`] for the first row whose width differs from the
    /// header's. Rows are numbered from 2, the header being row 1.
    pub fn with_rows(header: Row, rows: Vec<Row>) -> Result<Self, SnapshotError> {
        let mut snapshot = Self::new(header);
        for (i, row) in rows.into_iter().enumerate() {
            snapshot.check_width(i + 2, &row)?;
            snapshot.rows.push(row);
        }
        Ok(snapshot)
    }

    /// Append a data row
    pub fn push_row(&mut self, row: Row) -> Result<(), SnapshotError> {
        self.check_width(self.rows.len() + 2, &row)?;
        self.rows.push(row);
        Ok(())
    }

    /// Header cells
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Data rows, header excluded
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the header cell named `name`
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|cell| cell == name)
    }

    /// All rows, header first
    pub fn into_rows(self) -> Vec<Row> {
        let mut all = Vec::with_capacity(self.rows.len() + 1);
        all.push(self.header);
        all.extend(self.rows);
        all
    }

    fn check_width(&self, line: usize, row: &[String]) -> Result<(), SnapshotError> {
        if row.len() != self.header.len() {
            return Err(SnapshotError::RaggedRow {
                line,
                expected: self.header.len(),
                found: row.len(),
            });
        }
        Ok(())
    }
}
