//! HTTP access to the Yougile API
//!
//! [`Transport`] is the seam between the fetch engine and the network: one GET returning
//! a JSON document, with 429 and other non-success answers turned into typed errors.
//! [`HttpTransport`] implements it with `reqwest`; tests substitute scripted transports.
//! [`Endpoints`] builds the resource URLs from the configured base URL.

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use std::time::Duration;
use url::Url;

/// A synchronous-in-spirit request client: one request, one JSON answer
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and return the decoded JSON body
    ///
    /// # Errors
    ///
    /// - [`Error::RateLimited`] for 429 responses, carrying `Retry-After` when present
    /// - [`Error::HttpStatus`] for any other non-success status
    /// - [`Error::Network`] when the request could not be completed
    /// - [`Error::Decode`] when the body is not JSON
    async fn get_json(&self, url: &Url) -> Result<serde_json::Value>;
}

/// `reqwest`-backed transport with bearer authentication
pub struct HttpTransport {
    client: reqwest::Client,
    api_key: String,
}

impl HttpTransport {
    /// Create a transport from the API settings
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(api.request_timeout)
            .user_agent(concat!("yougile-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_key: api.api_key.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &Url) -> Result<serde_json::Value> {
        tracing::debug!(url = %url, "Requesting");

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(Error::RateLimited {
                url: url.to_string(),
                retry_after,
            });
        }
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| Error::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Parse a `Retry-After` value given in whole seconds
///
/// The HTTP-date form is not used by the API and yields `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Resource URLs of the API
#[derive(Clone, Debug)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    /// Build endpoints below `base_url`
    ///
    /// A trailing slash is added when missing so that the last path segment of the base
    /// URL (e.g. `api-v2`) is kept.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            base: Url::parse(&base)?,
        })
    }

    /// Columns of a board
    pub fn columns(&self, board_id: &str) -> Result<Url> {
        let mut url = self.base.join("columns")?;
        url.query_pairs_mut().append_pair("boardId", board_id);
        Ok(url)
    }

    /// Task summaries of a column
    pub fn task_list(&self, column_id: &str) -> Result<Url> {
        let mut url = self.base.join("task-list")?;
        url.query_pairs_mut().append_pair("columnId", column_id);
        Ok(url)
    }

    /// String sticker groups of the company
    pub fn string_stickers(&self) -> Result<Url> {
        Ok(self.base.join("string-stickers")?)
    }

    /// Full detail of one task
    pub fn task(&self, task_id: &str) -> Result<Url> {
        Ok(self
            .base
            .join(&format!("tasks/{}", urlencoding::encode(task_id)))?)
    }
}
