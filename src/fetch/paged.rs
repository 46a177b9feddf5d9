use super::EventSink;
use crate::client::Transport;
use crate::config::{RetryConfig, RetryPolicy};
use crate::error::{Error, Result};
use crate::retry::{request_with_retry, retry_rounds};
use crate::types::{Event, Page};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

/// Retrieves a complete collection from a paginated list endpoint
///
/// Pages are requested with `limit`/`offset` appended to the base query, starting at
/// offset 0 and advancing by the page size. A page request never fails the walk: the
/// bounded per-request retry runs inside the configured outer [`RetryPolicy`].
pub struct PagedFetcher {
    transport: Arc<dyn Transport>,
    page_size: usize,
    retry: RetryConfig,
    policy: RetryPolicy,
    events: EventSink,
}

impl PagedFetcher {
    /// Create a fetcher
    ///
    /// # Arguments
    /// * `transport` - Request client
    /// * `page_size` - Items requested per page
    /// * `retry` - Bounded retry for each page request
    /// * `policy` - Outer retry once the bounded retry gave up
    pub fn new(
        transport: Arc<dyn Transport>,
        page_size: usize,
        retry: RetryConfig,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            page_size,
            retry,
            policy,
            events: EventSink::default(),
        }
    }

    /// Emit a [`Event::PageFetched`] for every page obtained
    pub fn with_events(mut self, tx: broadcast::Sender<Event>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    /// Fetch every item of the collection at `base`, in server order
    ///
    /// Stops after a page whose `paging.next` is false, or at the first empty page even
    /// if it claims more data follows.
    pub async fn fetch_all<T: DeserializeOwned>(&self, base: &Url) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut offset = 0;

        loop {
            let page: Page<T> = self.fetch_page(base, offset).await?;
            let has_next = page.has_next();
            let count = page.content.len();

            self.events.emit(Event::PageFetched {
                resource: base.to_string(),
                offset,
                items: count,
            });

            if count == 0 {
                if has_next {
                    warn!(url = %base, offset, "Empty page claims more data, stopping");
                }
                break;
            }
            items.extend(page.content);
            if !has_next {
                break;
            }
            offset += self.page_size;
        }

        debug!(url = %base, total = items.len(), "Collection complete");
        Ok(items)
    }

    /// Fetch the single page starting at `offset`
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        base: &Url,
        offset: usize,
    ) -> Result<Page<T>> {
        let url = page_url(base, self.page_size, offset);
        debug!(url = %url, "Requesting page");

        retry_rounds(&self.policy, url.as_str(), || {
            request_with_retry(&self.retry, || self.request_page::<T>(&url))
        })
        .await
    }

    async fn request_page<T: DeserializeOwned>(&self, url: &Url) -> Result<Page<T>> {
        let value = self.transport.get_json(url).await?;
        serde_json::from_value(value).map_err(|e| Error::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// `base` with `limit` and `offset` appended to its query
///
/// Works whether or not `base` already carries query parameters.
pub fn page_url(base: &Url, limit: usize, offset: usize) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("limit", &limit.to_string())
        .append_pair("offset", &offset.to_string());
    url
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::test_helpers::{Reply, ScriptedTransport};
    use crate::types::Column;
    use serde_json::json;
    use std::time::Duration;

    const BASE: &str = "http://api.test/api-v2/columns?boardId=b1";

    fn base() -> Url {
        Url::parse(BASE).unwrap()
    }

    fn page(url_offset: usize, limit: usize) -> String {
        format!("{}&limit={}&offset={}", BASE, limit, url_offset)
    }

    fn columns(range: std::ops::Range<usize>, next: Option<bool>) -> Reply {
        let content: Vec<_> = range
            .map(|i| json!({ "id": format!("c-{i}"), "title": format!("Column {i}") }))
            .collect();
        Reply::Json(json!({ "content": content, "paging": { "next": next } }))
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            rate_limit_wait: Duration::from_millis(1),
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    fn fetcher(
        transport: Arc<ScriptedTransport>,
        page_size: usize,
        policy: RetryPolicy,
    ) -> PagedFetcher {
        PagedFetcher::new(transport, page_size, fast_retry(5), policy)
    }

    #[test]
    fn page_url_appends_to_existing_query() {
        assert_eq!(page_url(&base(), 1000, 2000).as_str(), page(2000, 1000));

        let bare = Url::parse("http://api.test/api-v2/string-stickers").unwrap();
        assert_eq!(
            page_url(&bare, 10, 0).as_str(),
            "http://api.test/api-v2/string-stickers?limit=10&offset=0"
        );
    }

    #[tokio::test]
    async fn returns_all_items_in_order_across_pages() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(&page(0, 3), vec![columns(0..3, Some(true))]);
        transport.script(&page(3, 3), vec![columns(3..6, Some(true))]);
        transport.script(&page(6, 3), vec![columns(6..7, Some(false))]);

        let fetcher = fetcher(transport.clone(), 3, RetryPolicy::bounded(Duration::ZERO, 0));
        let items: Vec<Column> = fetcher.fetch_all(&base()).await.unwrap();

        let ids: Vec<_> = items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c-0", "c-1", "c-2", "c-3", "c-4", "c-5", "c-6"]);
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn null_next_marker_ends_collection() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(&page(0, 5), vec![columns(0..5, None)]);

        let fetcher = fetcher(transport.clone(), 5, RetryPolicy::bounded(Duration::ZERO, 0));
        let items: Vec<Column> = fetcher.fetch_all(&base()).await.unwrap();

        assert_eq!(items.len(), 5);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn empty_page_claiming_more_still_terminates() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(&page(0, 2), vec![columns(0..2, Some(true))]);
        transport.script(&page(2, 2), vec![columns(0..0, Some(true))]);

        let fetcher = fetcher(transport.clone(), 2, RetryPolicy::bounded(Duration::ZERO, 0));
        let items: Vec<Column> = fetcher.fetch_all(&base()).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(transport.calls_to(&page(4, 2)), 0, "must not request past the empty page");
    }

    #[tokio::test]
    async fn three_failures_recovered_without_outer_round() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(
            &page(0, 10),
            vec![
                Reply::Status(502),
                Reply::RateLimited(None),
                Reply::Status(503),
                columns(0..4, Some(false)),
            ],
        );

        // A zero-round outer policy proves the inner retry alone recovered the page
        let fetcher = fetcher(transport.clone(), 10, RetryPolicy::bounded(Duration::ZERO, 0));
        let items: Vec<Column> = fetcher.fetch_all(&base()).await.unwrap();

        assert_eq!(items.len(), 4);
        assert_eq!(transport.calls_to(&page(0, 10)), 4);
    }

    #[tokio::test]
    async fn persistent_failure_is_outlasted_by_outer_rounds() {
        // 14 failures: more than two full inner budgets of 6 requests each
        let mut replies = vec![Reply::Status(500); 14];
        replies.push(columns(0..1, Some(false)));

        let transport = Arc::new(ScriptedTransport::new());
        transport.script(&page(0, 10), replies);

        let fetcher = fetcher(
            transport.clone(),
            10,
            RetryPolicy::unbounded(Duration::from_millis(2)),
        );
        let items: Vec<Column> = fetcher.fetch_all(&base()).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(transport.calls_to(&page(0, 10)), 15);
    }

    #[tokio::test]
    async fn non_retryable_failure_goes_straight_to_outer_round() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(
            &page(0, 10),
            vec![Reply::Status(401), columns(0..2, Some(false))],
        );

        let fetcher = fetcher(
            transport.clone(),
            10,
            RetryPolicy::bounded(Duration::from_millis(1), 1),
        );
        let items: Vec<Column> = fetcher.fetch_all(&base()).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(transport.calls_to(&page(0, 10)), 2);
    }

    #[tokio::test]
    async fn bounded_policy_surfaces_give_up() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(&page(0, 10), vec![Reply::Status(500)]);

        let fetcher = PagedFetcher::new(
            transport.clone(),
            10,
            fast_retry(1),
            RetryPolicy::bounded(Duration::from_millis(1), 2),
        );
        let result: Result<Vec<Column>> = fetcher.fetch_all(&base()).await;

        assert!(matches!(
            result,
            Err(Error::RetriesExhausted { attempts: 3, .. })
        ));
        // 3 rounds of (1 + 1 retry)
        assert_eq!(transport.calls_to(&page(0, 10)), 6);
    }

    #[tokio::test]
    async fn malformed_page_is_retried_by_outer_round() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(
            &page(0, 10),
            vec![
                Reply::Json(json!({ "content": "oops" })),
                columns(0..1, Some(false)),
            ],
        );

        let fetcher = fetcher(
            transport.clone(),
            10,
            RetryPolicy::unbounded(Duration::from_millis(1)),
        );
        let items: Vec<Column> = fetcher.fetch_all(&base()).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn page_events_are_emitted() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(&page(0, 2), vec![columns(0..2, Some(true))]);
        transport.script(&page(2, 2), vec![columns(2..3, Some(false))]);

        let (tx, mut rx) = broadcast::channel(16);
        let fetcher = fetcher(transport, 2, RetryPolicy::default()).with_events(tx);
        let _: Vec<Column> = fetcher.fetch_all(&base()).await.unwrap();

        let mut offsets = Vec::new();
        while let Ok(Event::PageFetched { offset, items, .. }) = rx.try_recv() {
            offsets.push((offset, items));
        }
        assert_eq!(offsets, [(0, 2), (2, 1)]);
    }
}
