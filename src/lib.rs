//! # yougile-sync
//!
//! Exports the tasks of a Yougile board into a CSV snapshot and keeps it current.
//!
//! ## Design Philosophy
//!
//! yougile-sync is designed to be:
//! - **Patient** - Rate limits and transient failures delay a run, they do not fail it
//! - **Incremental** - Later runs refresh open and recently due tasks and keep every other row
//! - **Strict about structure** - A snapshot whose header changed is never merged silently
//! - **Event-driven** - Consumers subscribe to progress events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use yougile_sync::{Config, Exporter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.api.api_key = "secret".to_string();
//!     config.api.board_id = "board-id".to_string();
//!     config.columns.check_deadline = vec!["done-column-id".to_string()];
//!
//!     let exporter = Exporter::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = exporter.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = exporter.run().await?;
//!     println!("{} rows written", summary.rows_written);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP transport and endpoint URLs
pub mod client;
/// Configuration types
pub mod config;
/// Deadline filtering and column selection
pub mod deadline;
/// Error types
pub mod error;
/// Paginated and per-task fetching
pub mod fetch;
/// Retry logic with exponential backoff
pub mod retry;
/// Snapshot rows, projection, merge and persistence
pub mod snapshot;
/// Export run orchestration
pub mod sync;
/// Remote data model and events
pub mod types;

// Re-export commonly used types
pub use client::{Endpoints, HttpTransport, Transport};
pub use config::{Config, RetryConfig, RetryPolicy};
pub use deadline::{TaskDeadlineFilter, get_recent_tasks, partition_columns};
pub use error::{Error, MergeError, Result, SnapshotError};
pub use fetch::{BulkRetryFetcher, PagedFetcher};
pub use snapshot::{MergeOutcome, Row, Snapshot, SnapshotMerger, StickerCatalog};
pub use sync::{Exporter, RunMode, RunSummary};
pub use types::{Column, Event, StickerGroup, Task};
