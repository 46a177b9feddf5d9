//! Deadline recency filtering and column selection
//!
//! Tasks in deadline-checked columns (typically "Done") are re-fetched only while their
//! deadline is recent; older ones keep the row the previous snapshot already holds.

use crate::types::{Column, Task};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, warn};

/// Selects tasks whose deadline is more recent than a day offset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskDeadlineFilter {
    days_offset: u32,
}

impl TaskDeadlineFilter {
    /// Filter keeping deadlines later than "now minus `days_offset` days"
    pub fn new(days_offset: u32) -> Self {
        Self { days_offset }
    }

    /// Instant a deadline must be strictly later than, relative to `now`
    ///
    /// Offsets reaching past the earliest representable instant clamp to it, so every
    /// dated task counts as recent.
    pub fn threshold(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::try_days(i64::from(self.days_offset))
            .and_then(|offset| now.checked_sub_signed(offset))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Whether `task` counts as recent at `now`
    ///
    /// A task without a deadline always counts as recent, so undated tasks are never
    /// dropped from a refresh.
    pub fn is_recent(&self, task: &Task, now: DateTime<Utc>) -> bool {
        let Some(ms) = task.deadline_ms() else {
            return true;
        };
        match deadline_datetime(ms) {
            Some(deadline) => deadline > self.threshold(now),
            None => {
                warn!(
                    task_id = %task.id,
                    deadline = ms,
                    "Deadline out of range, treating task as undated"
                );
                true
            }
        }
    }

    /// Tasks that count as recent at `now`, in input order
    pub fn recent_at(&self, tasks: &[Task], now: DateTime<Utc>) -> Vec<Task> {
        tasks
            .iter()
            .filter(|task| self.is_recent(task, now))
            .cloned()
            .collect()
    }
}

/// Tasks whose deadline is later than now minus `deadline_days_offset` days
pub fn get_recent_tasks(tasks: &[Task], deadline_days_offset: u32) -> Vec<Task> {
    TaskDeadlineFilter::new(deadline_days_offset).recent_at(tasks, Utc::now())
}

/// Convert an epoch-millisecond timestamp
pub fn deadline_datetime(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Format a deadline as `dd.mm.YYYY HH:MM` in UTC; empty when there is none
pub fn format_deadline(ms: Option<i64>) -> String {
    ms.and_then(deadline_datetime)
        .map(|dt| dt.format("%d.%m.%Y %H:%M").to_string())
        .unwrap_or_default()
}

/// Ids of the board columns whose tasks are fetched without a deadline check
///
/// Columns listed in `exclude` are never requested. Columns listed in `check_deadline`
/// are skipped here because their tasks are requested separately.
pub fn partition_columns(
    columns: &[Column],
    exclude: &[String],
    check_deadline: &[String],
) -> Vec<String> {
    let mut ids = Vec::new();
    for column in columns {
        if exclude.contains(&column.id) {
            info!(
                "Excluding column \"{}\" (\"{}\") from requests",
                column.id, column.title
            );
            continue;
        }
        if check_deadline.contains(&column.id) {
            info!(
                "Column \"{}\" (\"{}\") is requested with a deadline check",
                column.id, column.title
            );
            continue;
        }
        ids.push(column.id.clone());
    }
    ids
}
