//! Common test utilities for yougile-sync integration tests
//!
//! A [`MockBoard`] serves the list and detail endpoints from a `wiremock` server so that
//! whole export runs can be exercised without the real API.

#![allow(dead_code)]

use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use yougile_sync::{Config, RetryConfig, RetryPolicy};

/// Page size used by every test configuration
pub const PAGE_SIZE: usize = 2;

/// UTF-8 byte-order mark at the start of every snapshot
pub const BOM: &str = "\u{feff}";

/// Mock Yougile API for one board
pub struct MockBoard {
    pub server: MockServer,
}

impl MockBoard {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to put into the configuration
    pub fn base_url(&self) -> String {
        format!("{}/api-v2", self.server.uri())
    }

    /// Serve `items` from a list endpoint, split into pages of [`PAGE_SIZE`]
    pub async fn list(&self, resource: &str, filter: Option<(&str, &str)>, items: Vec<Value>) {
        let pages: Vec<&[Value]> = if items.is_empty() {
            vec![&items[..]]
        } else {
            items.chunks(PAGE_SIZE).collect()
        };
        let last = pages.len() - 1;

        for (i, content) in pages.into_iter().enumerate() {
            let body = json!({
                "content": content,
                "paging": { "next": i < last, "limit": PAGE_SIZE, "offset": i * PAGE_SIZE }
            });
            let mut mock = Mock::given(method("GET"))
                .and(path(format!("/api-v2/{resource}")))
                .and(query_param("limit", PAGE_SIZE.to_string()))
                .and(query_param("offset", (i * PAGE_SIZE).to_string()));
            if let Some((key, value)) = filter {
                mock = mock.and(query_param(key, value));
            }
            mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&self.server)
                .await;
        }
    }

    pub async fn columns(&self, board_id: &str, columns: Vec<Value>) {
        self.list("columns", Some(("boardId", board_id)), columns).await;
    }

    pub async fn column_tasks(&self, column_id: &str, tasks: Vec<Value>) {
        self.list("task-list", Some(("columnId", column_id)), tasks).await;
    }

    pub async fn stickers(&self, groups: Vec<Value>) {
        self.list("string-stickers", None, groups).await;
    }

    /// Serve the full record of a task
    pub async fn task(&self, task: Value) {
        let id = task["id"].as_str().unwrap_or_default().to_string();
        Mock::given(method("GET"))
            .and(path(format!("/api-v2/tasks/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(task))
            .mount(&self.server)
            .await;
    }

    /// Answer the first `times` detail requests for `id` with `status`
    pub async fn task_failing(&self, id: &str, status: u16, times: u64) {
        let mut response = ResponseTemplate::new(status);
        if status == 429 {
            response = response.insert_header("Retry-After", "0");
        }
        Mock::given(method("GET"))
            .and(path(format!("/api-v2/tasks/{id}")))
            .respond_with(response)
            .up_to_n_times(times)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Number of requests received for a path
    pub async fn hits(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }
}

/// Configuration for a run against `board`, writing into `dir`
///
/// Waits are in milliseconds and outer retries are bounded so a broken test fails
/// instead of hanging.
pub fn test_config(board: &MockBoard, dir: &Path) -> Config {
    let mut config = Config::default();
    config.api.base_url = board.base_url();
    config.api.api_key = "test-key".into();
    config.api.board_id = "board-1".into();
    config.api.request_timeout = Duration::from_secs(5);
    config.fetch.page_size = PAGE_SIZE;
    config.fetch.retry = RetryConfig {
        max_attempts: 2,
        rate_limit_wait: Duration::from_millis(1),
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config.fetch.page_retry = RetryPolicy::bounded(Duration::from_millis(5), 3);
    config.fetch.item_retry = RetryPolicy::bounded(Duration::from_millis(5), 3);
    config.snapshot.path = dir.join("yougile_tasks.csv");
    config
}

/// Snapshot file content from rows, with BOM and CRLF terminators
pub fn csv_text(rows: &[&[&str]]) -> String {
    let mut text = String::from(BOM);
    for row in rows {
        text.push_str(&row.join(","));
        text.push_str("\r\n");
    }
    text
}
