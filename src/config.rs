//! Configuration types for yougile-sync

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, path::PathBuf, time::Duration};

/// Main configuration
///
/// Every field has a default, so a configuration file only needs the settings that
/// differ. The API key and board id have no usable default and are normally supplied
/// through the environment or command line.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API connection settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Pagination and retry behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Which columns are fetched and how
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Sticker groups that the API does not list
    #[serde(default)]
    pub stickers: StickersConfig,

    /// Persisted snapshot location and layout
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

/// Remote API connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the API (default: "https://ru.yougile.com/api-v2")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token; never written back out
    #[serde(default, skip_serializing)]
    pub api_key: String,

    /// Board whose columns are exported
    #[serde(default)]
    pub board_id: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            board_id: String::new(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("board_id", &self.board_id)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Pagination and retry behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Items requested per page (default: 1000)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Bounded retry applied to every single request
    #[serde(default)]
    pub retry: RetryConfig,

    /// Outer retry around a page request once the bounded retry gave up
    #[serde(default)]
    pub page_retry: RetryPolicy,

    /// Outer retry rounds over task details that could not be fetched
    #[serde(default)]
    pub item_retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            retry: RetryConfig::default(),
            page_retry: RetryPolicy::default(),
            item_retry: RetryPolicy::default(),
        }
    }
}

/// Retry configuration for a single request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait after a 429 response that carries no `Retry-After` header (default: 2 seconds)
    #[serde(default = "default_rate_limit_wait", with = "duration_serde")]
    pub rate_limit_wait: Duration,

    /// Initial delay before retrying a transient failure (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to transient-failure delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            rate_limit_wait: default_rate_limit_wait(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Fixed-interval retry policy for the outer loops
///
/// `max_rounds = None` retries until the operation succeeds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Pause between rounds (default: 10 seconds)
    #[serde(default = "default_retry_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Maximum number of retry rounds after the first try (default: unbounded)
    #[serde(default)]
    pub max_rounds: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: default_retry_interval(),
            max_rounds: None,
        }
    }
}

impl RetryPolicy {
    /// Policy that keeps retrying forever at the given interval
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_rounds: None,
        }
    }

    /// Policy that gives up after `max_rounds` retry rounds
    pub fn bounded(interval: Duration, max_rounds: u32) -> Self {
        Self {
            interval,
            max_rounds: Some(max_rounds),
        }
    }

    /// Whether another round may start after `rounds_done` retry rounds
    pub fn allows_round(&self, rounds_done: u32) -> bool {
        self.max_rounds.is_none_or(|max| rounds_done < max)
    }
}

/// Column selection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnsConfig {
    /// Columns that are never requested
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Columns whose tasks are refreshed only while their deadline is recent
    #[serde(default)]
    pub check_deadline: Vec<String>,

    /// How many days back a deadline still counts as recent (default: 60)
    #[serde(default = "default_deadline_days_offset")]
    pub deadline_days_offset: u32,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            check_deadline: Vec::new(),
            deadline_days_offset: default_deadline_days_offset(),
        }
    }
}

/// Sticker groups that are not returned by the sticker endpoint
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StickersConfig {
    /// Group id to display name; task values for these groups are used verbatim
    #[serde(default)]
    pub hardcoded: BTreeMap<String, String>,
}

/// Snapshot file settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Snapshot path (default: "yougile_tasks.csv")
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,

    /// Copy the previous snapshot to `<path>.backup` before overwriting (default: true)
    #[serde(default = "default_true")]
    pub backup: bool,

    /// Header cells of the fixed columns
    #[serde(default)]
    pub labels: HeaderLabels,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
            backup: true,
            labels: HeaderLabels::default(),
        }
    }
}

impl SnapshotConfig {
    /// Sibling path the previous snapshot is copied to
    pub fn backup_path(&self) -> PathBuf {
        backup_path_for(&self.path)
    }
}

/// Header cells of the four fixed snapshot columns
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderLabels {
    /// Task identifier column; rows are matched on it when merging
    #[serde(default = "default_task_id_label")]
    pub task_id: String,
    /// Task title column
    #[serde(default = "default_title_label")]
    pub title: String,
    /// Formatted deadline column
    #[serde(default = "default_deadline_label")]
    pub deadline: String,
    /// Project-scoped task id column
    #[serde(default = "default_project_id_label")]
    pub project_id: String,
}

impl Default for HeaderLabels {
    fn default() -> Self {
        Self {
            task_id: default_task_id_label(),
            title: default_title_label(),
            deadline: default_deadline_label(),
            project_id: default_project_id_label(),
        }
    }
}

impl HeaderLabels {
    /// The fixed header cells in snapshot order
    pub fn fixed(&self) -> [&str; 4] {
        [&self.task_id, &self.title, &self.deadline, &self.project_id]
    }
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config {
            message: format!("invalid configuration file: {}", e),
            key: None,
        })
    }

    /// Read and parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check settings that would otherwise fail deep inside a run
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url)
            .map_err(|e| Error::config("api.base_url", format!("invalid base URL: {}", e)))?;
        if self.api.api_key.trim().is_empty() {
            return Err(Error::config("api.api_key", "API key must not be empty"));
        }
        if self.api.board_id.trim().is_empty() {
            return Err(Error::config("api.board_id", "board id must not be empty"));
        }
        if self.fetch.page_size == 0 {
            return Err(Error::config("fetch.page_size", "page size must be positive"));
        }
        if self.fetch.retry.max_attempts == 0 {
            return Err(Error::config(
                "fetch.retry.max_attempts",
                "at least one retry attempt is required",
            ));
        }
        let retry = &self.fetch.retry;
        if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "fetch.retry.backoff_multiplier",
                format!(
                    "backoff multiplier must be a finite number of at least 1, got {}",
                    retry.backoff_multiplier
                ),
            ));
        }
        if retry.initial_delay > retry.max_delay {
            return Err(Error::config(
                "fetch.retry.initial_delay",
                "initial delay must not exceed max delay",
            ));
        }

        let labels = self.snapshot.labels.fixed();
        for (i, label) in labels.iter().enumerate() {
            if label.is_empty() {
                return Err(Error::config("snapshot.labels", "header labels must not be empty"));
            }
            if labels[..i].contains(label) {
                return Err(Error::config(
                    "snapshot.labels",
                    format!("header label \"{}\" is used twice", label),
                ));
            }
        }
        Ok(())
    }
}

/// `<path>.backup`, keeping the full original file name
pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".backup");
    PathBuf::from(name)
}

// Default value functions
fn default_base_url() -> String {
    "https://ru.yougile.com/api-v2".into()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_page_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_rate_limit_wait() -> Duration {
    Duration::from_secs(2)
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_deadline_days_offset() -> u32 {
    60
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("yougile_tasks.csv")
}

fn default_task_id_label() -> String {
    "task_id".into()
}

fn default_title_label() -> String {
    "title".into()
}

fn default_deadline_label() -> String {
    "deadline".into()
}

fn default_project_id_label() -> String {
    "project_id".into()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
