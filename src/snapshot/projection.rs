//! Task to row projection
//!
//! Each sticker group becomes one column, ordered by display name. Groups fetched from the
//! API resolve the value id stored on a task through their states; hardcoded groups, and
//! any group without states, contribute the task's raw value verbatim.

use super::{Row, Snapshot};
use crate::config::HeaderLabels;
use crate::deadline::format_deadline;
use crate::error::{Error, Result};
use crate::types::{StickerGroup, Task};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// One sticker column of the snapshot
#[derive(Clone, Debug)]
struct StickerColumn {
    group_id: String,
    name: String,
    values: HashMap<String, String>,
}

/// Sticker groups resolved into snapshot columns
#[derive(Clone, Debug, Default)]
pub struct StickerCatalog {
    columns: Vec<StickerColumn>,
}

impl StickerCatalog {
    /// Combine fetched groups with the hardcoded ones
    ///
    /// A hardcoded entry overrides the display name of a fetched group with the same id.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when two distinct groups share a display name.
    pub fn build(groups: &[StickerGroup], hardcoded: &BTreeMap<String, String>) -> Result<Self> {
        let mut names: BTreeMap<&str, &str> = BTreeMap::new();
        let mut values: HashMap<&str, HashMap<String, String>> = HashMap::new();

        for group in groups {
            names.insert(&group.id, &group.name);
            let states = group
                .states
                .iter()
                .map(|s| (s.id.clone(), s.name.clone()))
                .collect();
            values.insert(&group.id, states);
        }
        for (id, name) in hardcoded {
            names.insert(id, name);
        }

        let mut columns: Vec<StickerColumn> = names
            .into_iter()
            .map(|(id, name)| StickerColumn {
                group_id: id.to_string(),
                name: name.to_string(),
                values: values.remove(id).unwrap_or_default(),
            })
            .collect();
        columns.sort_by(|a, b| a.name.cmp(&b.name));

        for pair in columns.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(Error::config(
                    "stickers",
                    format!(
                        "sticker groups \"{}\" and \"{}\" share the name \"{}\"",
                        pair[0].group_id, pair[1].group_id, pair[0].name
                    ),
                ));
            }
        }

        let state_count: usize = columns.iter().map(|c| c.values.len()).sum();
        debug!(groups = columns.len(), states = state_count, "Sticker catalog built");

        Ok(Self { columns })
    }

    /// Number of sticker columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether there are no sticker columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Group ids in column order
    pub fn group_ids(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.group_id.as_str())
    }

    /// Fixed labels followed by the sticker display names
    ///
    /// # Errors
    /// Returns [`Error::Config`] when a sticker name equals one of the fixed labels.
    pub fn header(&self, labels: &HeaderLabels) -> Result<Row> {
        let fixed = labels.fixed();
        if let Some(column) = self.columns.iter().find(|c| fixed.contains(&c.name.as_str())) {
            return Err(Error::config(
                "stickers",
                format!(
                    "sticker group \"{}\" is named like the fixed column \"{}\"",
                    column.group_id, column.name
                ),
            ));
        }

        let mut header: Row = fixed.iter().map(|s| s.to_string()).collect();
        header.extend(self.columns.iter().map(|c| c.name.clone()));
        Ok(header)
    }

    /// Row of one task, aligned to [`header`](Self::header)
    pub fn project(&self, task: &Task) -> Row {
        let unknown: Vec<&str> = task
            .stickers
            .keys()
            .map(String::as_str)
            .filter(|id| !self.columns.iter().any(|c| c.group_id == *id))
            .collect();
        if !unknown.is_empty() {
            let known: Vec<&str> = self.group_ids().collect();
            warn!(
                task_id = %task.id,
                unknown = ?unknown,
                known = ?known,
                "Task references sticker groups that are not known"
            );
        }

        let mut row = Vec::with_capacity(4 + self.columns.len());
        row.push(task.id.clone());
        row.push(task.title.clone());
        row.push(format_deadline(task.deadline_ms()));
        row.push(task.id_task_project.clone().unwrap_or_default());

        for column in &self.columns {
            let raw = task.stickers.get(&column.group_id).map(cell_text);
            let cell = match raw {
                None => String::new(),
                Some(raw) if column.values.is_empty() => raw,
                Some(value_id) => column.values.get(&value_id).cloned().unwrap_or_default(),
            };
            row.push(cell);
        }
        row
    }

    /// Snapshot of `tasks` in input order
    pub fn project_all(&self, tasks: &[Task], labels: &HeaderLabels) -> Result<Snapshot> {
        let mut snapshot = Snapshot::new(self.header(labels)?);
        for task in tasks {
            snapshot.push_row(self.project(task))?;
        }
        Ok(snapshot)
    }
}

/// Cell text of a raw sticker value
fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
