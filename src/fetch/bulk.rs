use super::EventSink;
use crate::client::{Endpoints, Transport};
use crate::config::{RetryConfig, RetryPolicy};
use crate::error::{Error, Result};
use crate::retry::request_with_retry;
use crate::types::{Event, Task};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Fetches full task records one at a time, re-running failures in rounds
///
/// A detail request that still fails after its bounded retry marks the task as missing
/// instead of aborting the batch. After each pass over the pending ids the missing
/// subset is retried after `policy.interval`, until none remain or a bounded policy
/// runs out of rounds.
pub struct BulkRetryFetcher {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    retry: RetryConfig,
    policy: RetryPolicy,
    events: EventSink,
}

impl BulkRetryFetcher {
    /// Create a fetcher
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        retry: RetryConfig,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            endpoints,
            retry,
            policy,
            events: EventSink::default(),
        }
    }

    /// Emit per-task and per-round progress events
    pub fn with_events(mut self, tx: broadcast::Sender<Event>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    /// Fetch the full record of every id
    ///
    /// The result holds one record per input id, in input order, whichever round
    /// obtained it.
    ///
    /// # Errors
    /// Returns [`Error::RetriesExhausted`] only when the policy is bounded and records
    /// are still missing after its last round.
    pub async fn fetch_all(&self, ids: &[String]) -> Result<Vec<Task>> {
        info!("Fetching full data of {} tasks", ids.len());

        let mut results: Vec<Option<Task>> = vec![None; ids.len()];
        let mut pending: Vec<usize> = (0..ids.len()).collect();
        let mut round: u32 = 0;

        loop {
            let missing = self.fetch_round(ids, &pending, &mut results).await;
            if missing.is_empty() {
                break;
            }

            if !self.policy.allows_round(round) {
                warn!(
                    missing = missing.len(),
                    rounds = round,
                    "Giving up on task details"
                );
                return Err(Error::RetriesExhausted {
                    what: format!("{} task details", missing.len()),
                    attempts: round + 1,
                });
            }
            round += 1;

            self.events.emit(Event::RetryRound {
                round,
                remaining: missing.len(),
            });
            warn!(
                round,
                remaining = missing.len(),
                wait_secs = self.policy.interval.as_secs_f64(),
                "Waiting before fetching the remaining task details again"
            );
            tokio::time::sleep(self.policy.interval).await;
            pending = missing;
        }

        let tasks: Vec<Task> = results.into_iter().flatten().collect();
        info!("Total full task data obtained: {}/{}", tasks.len(), ids.len());
        Ok(tasks)
    }

    /// Fetch the full record of a single task with bounded retry
    pub async fn fetch_one(&self, task_id: &str) -> Result<Task> {
        let url = self.endpoints.task(task_id)?;
        request_with_retry(&self.retry, || async {
            let value = self.transport.get_json(&url).await?;
            let task: Task = serde_json::from_value(value).map_err(|e| Error::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            Ok::<_, Error>(task)
        })
        .await
    }

    /// One pass over `pending`; returns the positions still missing
    async fn fetch_round(
        &self,
        ids: &[String],
        pending: &[usize],
        results: &mut [Option<Task>],
    ) -> Vec<usize> {
        let total = pending.len();
        let mut missing = Vec::new();

        for (n, &pos) in pending.iter().enumerate() {
            let index = n + 1;
            let task_id = &ids[pos];
            match self.fetch_one(task_id).await {
                Ok(task) => {
                    info!("[{}/{}] ✅ {}", index, total, task.title);
                    self.events.emit(Event::TaskFetched {
                        index,
                        total,
                        task_id: task_id.clone(),
                        title: task.title.clone(),
                    });
                    results[pos] = Some(task);
                }
                Err(e) => {
                    warn!(
                        task_id = %task_id,
                        error = %e,
                        "[{}/{}] task details not obtained",
                        index,
                        total
                    );
                    self.events.emit(Event::TaskMissing {
                        index,
                        total,
                        task_id: task_id.clone(),
                    });
                    missing.push(pos);
                }
            }
        }

        info!("Full task data obtained: {}/{}", total - missing.len(), total);
        missing
    }
}
