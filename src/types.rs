//! Remote data model and progress events
//!
//! Records are deserialized straight from API responses and never mutated; unknown
//! fields are ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A task as returned by the task list or task detail endpoint
///
/// Only the detail endpoint fills `id_task_project`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task id; empty when the record carries none
    #[serde(default)]
    pub id: String,

    /// Task title
    #[serde(default)]
    pub title: String,

    /// Deadline block, absent when the task has no deadline
    #[serde(default)]
    pub deadline: Option<Deadline>,

    /// Project-scoped id (e.g. "AB-1234")
    #[serde(default)]
    pub id_task_project: Option<String>,

    /// Sticker group id to selected value id, or to a literal value for hardcoded groups
    #[serde(default)]
    pub stickers: BTreeMap<String, serde_json::Value>,
}

impl Task {
    /// Deadline as epoch milliseconds, if set
    pub fn deadline_ms(&self) -> Option<i64> {
        self.deadline.as_ref().and_then(|d| d.deadline)
    }
}

/// Deadline block of a task
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Deadline {
    /// Epoch milliseconds
    #[serde(default)]
    pub deadline: Option<i64>,
}

/// Board column
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column id
    pub id: String,

    /// Column title
    #[serde(default)]
    pub title: String,
}

/// A string sticker group and its selectable values
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StickerGroup {
    /// Group id, used as key in [`Task::stickers`]
    pub id: String,

    /// Display name, used as the snapshot column header
    #[serde(default)]
    pub name: String,

    /// Selectable values
    #[serde(default)]
    pub states: Vec<StickerState>,
}

/// One selectable value of a sticker group
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StickerState {
    /// Value id stored on tasks
    pub id: String,

    /// Display name written into the snapshot
    #[serde(default)]
    pub name: String,
}

/// One page of a list endpoint
#[derive(Clone, Debug, Deserialize)]
pub struct Page<T> {
    /// Items on this page
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,

    /// Pagination marker
    #[serde(default)]
    pub paging: Paging,
}

/// Pagination marker of a list response
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Paging {
    /// Whether more pages follow; `null` and absent mean no
    #[serde(default)]
    pub next: Option<bool>,
}

impl<T> Page<T> {
    /// Whether the server announced another page
    pub fn has_next(&self) -> bool {
        self.paging.next.unwrap_or(false)
    }
}

/// Event emitted during an export run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// One page of a collection was obtained
    PageFetched {
        /// URL of the collection, without paging parameters
        resource: String,
        /// Offset of the page
        offset: usize,
        /// Items on the page
        items: usize,
    },

    /// Full detail of a task was obtained
    TaskFetched {
        /// 1-based position within the current round
        index: usize,
        /// Size of the current round
        total: usize,
        /// Task id
        task_id: String,
        /// Task title
        title: String,
    },

    /// Full detail of a task could not be obtained in this round
    TaskMissing {
        /// 1-based position within the current round
        index: usize,
        /// Size of the current round
        total: usize,
        /// Task id
        task_id: String,
    },

    /// A retry round over missing tasks is starting
    RetryRound {
        /// Round number, starting at 1
        round: u32,
        /// Tasks still missing
        remaining: usize,
    },

    /// New rows were merged with the previous snapshot
    SnapshotMerged {
        /// Data rows built in this run
        new_rows: usize,
        /// Data rows carried over from the previous snapshot
        carried_over: usize,
    },

    /// The snapshot file was written
    SnapshotWritten {
        /// Destination path
        path: PathBuf,
        /// Data rows written, header excluded
        rows: usize,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_task_deserializes_from_detail_payload() {
        let task: Task = serde_json::from_value(json!({
            "id": "t-1",
            "title": "Write report",
            "deadline": { "deadline": 1_700_000_000_000_i64, "withTime": true },
            "idTaskProject": "AB-1234",
            "idTaskCommon": "ID-99",
            "stickers": { "g-1": "s-1", "g-hard": "free text" },
            "archived": false
        }))
        .unwrap();

        assert_eq!(task.id, "t-1");
        assert_eq!(task.deadline_ms(), Some(1_700_000_000_000));
        assert_eq!(task.id_task_project.as_deref(), Some("AB-1234"));
        assert_eq!(task.stickers["g-hard"], json!("free text"));
    }

    #[test]
    fn listing_task_without_optional_fields() {
        let task: Task = serde_json::from_value(json!({ "id": "t-2" })).unwrap();
        assert_eq!(task.title, "");
        assert_eq!(task.deadline_ms(), None);
        assert!(task.id_task_project.is_none());
        assert!(task.stickers.is_empty());

        // A deadline block without a timestamp counts as no deadline
        let task: Task =
            serde_json::from_value(json!({ "id": "t-3", "deadline": { "withTime": false } }))
                .unwrap();
        assert_eq!(task.deadline_ms(), None);
    }

    #[test]
    fn page_next_marker_variants() {
        let page: Page<Column> = serde_json::from_value(json!({
            "content": [{ "id": "c-1", "title": "Backlog" }],
            "paging": { "count": 1, "limit": 1000, "offset": 0, "next": true }
        }))
        .unwrap();
        assert!(page.has_next());
        assert_eq!(page.content.len(), 1);

        let page: Page<Column> =
            serde_json::from_value(json!({ "content": [], "paging": { "next": null } })).unwrap();
        assert!(!page.has_next());

        let page: Page<Column> = serde_json::from_value(json!({})).unwrap();
        assert!(!page.has_next());
        assert!(page.content.is_empty());
    }

    #[test]
    fn sticker_group_with_states() {
        let group: StickerGroup = serde_json::from_value(json!({
            "id": "g-1",
            "name": "Priority",
            "states": [{ "id": "s-1", "name": "High" }, { "id": "s-2", "name": "Low" }]
        }))
        .unwrap();
        assert_eq!(group.states.len(), 2);
        assert_eq!(group.states[0].name, "High");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::RetryRound {
            round: 2,
            remaining: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "retry_round");
        assert_eq!(json["remaining"], 5);
    }
}
