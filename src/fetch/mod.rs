//! Fetch engine
//!
//! - [`PagedFetcher`] walks a paginated list endpoint until the collection is complete.
//! - [`BulkRetryFetcher`] fetches full task records one by one and re-runs the
//!   failed subset in rounds until every record is obtained.
//!
//! Requests are issued strictly one after another; the only pauses are retry waits.

mod bulk;
mod paged;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use bulk::BulkRetryFetcher;
pub use paged::{PagedFetcher, page_url};

use crate::types::Event;
use tokio::sync::broadcast;

/// Optional event sink shared by the fetchers
#[derive(Clone, Debug, Default)]
pub(crate) struct EventSink(Option<broadcast::Sender<Event>>);

impl EventSink {
    pub(crate) fn new(tx: broadcast::Sender<Event>) -> Self {
        Self(Some(tx))
    }

    pub(crate) fn emit(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        if let Some(tx) = &self.0 {
            tx.send(event).ok();
        }
    }
}
