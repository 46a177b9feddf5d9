//! Export run orchestration
//!
//! [`Exporter`] ties the fetchers, the deadline filter, projection, merge and the snapshot
//! store together. Every request is awaited before the next one is issued.

use crate::client::{Endpoints, HttpTransport, Transport};
use crate::config::Config;
use crate::deadline::{get_recent_tasks, partition_columns};
use crate::error::Result;
use crate::fetch::{BulkRetryFetcher, PagedFetcher};
use crate::snapshot::{
    SnapshotMerger, StickerCatalog, backup_snapshot, read_snapshot, write_snapshot,
};
use crate::types::{Column, Event, StickerGroup, Task};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// How a run produced its snapshot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// No previous snapshot: every task was exported
    Full,
    /// Recent and open tasks were refreshed and merged into the previous snapshot
    Incremental,
}

/// Outcome of a successful run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Mode the run used
    pub mode: RunMode,
    /// Data rows in the written snapshot
    pub rows_written: usize,
    /// Data rows built from freshly fetched tasks
    pub new_rows: usize,
    /// Data rows kept from the previous snapshot
    pub carried_over: usize,
    /// Backup of the previous snapshot, if one was made
    pub backup: Option<PathBuf>,
}

/// Exports the tasks of one board into a snapshot file
pub struct Exporter {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    event_tx: broadcast::Sender<Event>,
}

impl Exporter {
    /// Create an exporter talking to the configured API over HTTP
    ///
    /// # Errors
    /// Returns [`Error::Config`](crate::Error::Config) when the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config.api)?);
        Self::with_transport(config, transport)
    }

    /// Create an exporter using a custom transport
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let endpoints = Endpoints::new(&config.api.base_url)?;
        let (event_tx, _) = broadcast::channel(1000);

        Ok(Self {
            config: Arc::new(config),
            transport,
            endpoints,
            event_tx,
        })
    }

    /// Subscribe to progress events
    ///
    /// Events sent before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// All columns of the configured board
    pub async fn fetch_columns(&self) -> Result<Vec<Column>> {
        info!("Fetching board columns");
        let url = self.endpoints.columns(&self.config.api.board_id)?;
        let columns: Vec<Column> = self.pages().fetch_all(&url).await?;
        info!("Columns fetched: {}", columns.len());
        Ok(columns)
    }

    /// Task summaries of the given columns, column by column
    pub async fn fetch_tasks(&self, column_ids: &[String]) -> Result<Vec<Task>> {
        info!("Fetching tasks of {} columns", column_ids.len());
        let pages = self.pages();
        let mut tasks = Vec::new();
        for column_id in column_ids {
            let url = self.endpoints.task_list(column_id)?;
            let column_tasks: Vec<Task> = pages.fetch_all(&url).await?;
            debug!(column_id = %column_id, tasks = column_tasks.len(), "Column tasks fetched");
            for task in column_tasks {
                if task.id.is_empty() {
                    warn!(
                        column_id = %column_id,
                        title = %task.title,
                        "Skipping task listed without an id"
                    );
                    continue;
                }
                tasks.push(task);
            }
        }
        info!("Tasks fetched: {}", tasks.len());
        Ok(tasks)
    }

    /// String sticker groups of the company
    pub async fn fetch_stickers(&self) -> Result<Vec<StickerGroup>> {
        info!("Fetching sticker groups");
        let url = self.endpoints.string_stickers()?;
        let groups: Vec<StickerGroup> = self.pages().fetch_all(&url).await?;
        let states: usize = groups.iter().map(|g| g.states.len()).sum();
        info!("Sticker groups fetched: {} ({} values)", groups.len(), states);
        Ok(groups)
    }

    /// Full records of `tasks`, in the same order
    pub async fn fetch_full_tasks(&self, tasks: &[Task]) -> Result<Vec<Task>> {
        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        BulkRetryFetcher::new(
            Arc::clone(&self.transport),
            self.endpoints.clone(),
            self.config.fetch.retry.clone(),
            self.config.fetch.item_retry.clone(),
        )
        .with_events(self.event_tx.clone())
        .fetch_all(&ids)
        .await
    }

    /// Run one export
    ///
    /// When the snapshot file exists, tasks of the deadline-checked columns are refreshed
    /// only if their deadline is recent, tasks of the other columns always are, and the
    /// result is merged into the previous snapshot after backing it up. Otherwise every
    /// task is exported.
    ///
    /// # Errors
    /// Fails without touching the snapshot file when the previous snapshot is unreadable,
    /// its header differs from the freshly built one, or a bounded retry policy gives up.
    pub async fn run(&self) -> Result<RunSummary> {
        info!("🚀 Starting Yougile export");
        let snapshot_cfg = &self.config.snapshot;
        let columns_cfg = &self.config.columns;
        let path = &snapshot_cfg.path;

        let previous = read_snapshot(path, &snapshot_cfg.labels.task_id).await?;

        let columns = self.fetch_columns().await?;
        let regular_ids =
            partition_columns(&columns, &columns_cfg.exclude, &columns_cfg.check_deadline);
        let checked_tasks = self.fetch_tasks(&columns_cfg.check_deadline).await?;
        let regular_tasks = self.fetch_tasks(&regular_ids).await?;

        let groups = self.fetch_stickers().await?;
        let catalog = StickerCatalog::build(&groups, &self.config.stickers.hardcoded)?;

        let summary = match previous {
            Some(old) => {
                info!(
                    path = %path.display(),
                    "Snapshot exists, refreshing tasks with a deadline in the last {} days",
                    columns_cfg.deadline_days_offset
                );
                let recent = get_recent_tasks(&checked_tasks, columns_cfg.deadline_days_offset);
                info!(
                    "Found {} of {} deadline-checked tasks with a recent deadline",
                    recent.len(),
                    checked_tasks.len()
                );

                let to_update: Vec<Task> = recent.into_iter().chain(regular_tasks).collect();
                let full = self.fetch_full_tasks(&to_update).await?;
                let fresh = catalog.project_all(&full, &snapshot_cfg.labels)?;

                let outcome = SnapshotMerger::new(snapshot_cfg.labels.task_id.as_str())
                    .merge(fresh, old)?;
                self.emit_event(Event::SnapshotMerged {
                    new_rows: outcome.new_rows,
                    carried_over: outcome.carried_over,
                });

                let backup = if snapshot_cfg.backup {
                    Some(backup_snapshot(path).await?)
                } else {
                    None
                };

                write_snapshot(path, &outcome.snapshot).await?;
                RunSummary {
                    mode: RunMode::Incremental,
                    rows_written: outcome.snapshot.len(),
                    new_rows: outcome.new_rows,
                    carried_over: outcome.carried_over,
                    backup,
                }
            }
            None => {
                info!(path = %path.display(), "No snapshot yet, exporting every task");
                let all: Vec<Task> = checked_tasks.into_iter().chain(regular_tasks).collect();
                let full = self.fetch_full_tasks(&all).await?;
                let snapshot = catalog.project_all(&full, &snapshot_cfg.labels)?;

                write_snapshot(path, &snapshot).await?;
                RunSummary {
                    mode: RunMode::Full,
                    rows_written: snapshot.len(),
                    new_rows: snapshot.len(),
                    carried_over: 0,
                    backup: None,
                }
            }
        };

        self.emit_event(Event::SnapshotWritten {
            path: path.clone(),
            rows: summary.rows_written,
        });
        info!(rows = summary.rows_written, "🎉 Done, snapshot saved");
        Ok(summary)
    }

    fn pages(&self) -> PagedFetcher {
        PagedFetcher::new(
            Arc::clone(&self.transport),
            self.config.fetch.page_size,
            self.config.fetch.retry.clone(),
            self.config.fetch.page_retry.clone(),
        )
        .with_events(self.event_tx.clone())
    }

    /// Send an event; having no subscribers is fine
    fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
