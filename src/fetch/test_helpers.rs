//! Scripted transport for fetcher tests.

use crate::client::Transport;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// One scripted answer
#[derive(Clone, Debug)]
pub(crate) enum Reply {
    Json(serde_json::Value),
    RateLimited(Option<Duration>),
    Status(u16),
}

/// Answers requests from per-URL queues.
///
/// Each request pops the front of its URL's queue; the last reply stays in place and
/// answers every later request. Unknown URLs get a 404.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(&self, url: &str, replies: Vec<Reply>) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(&self, url: &Url) -> Result<serde_json::Value> {
        let key = url.to_string();
        self.calls.lock().unwrap().push(key.clone());

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            match replies.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Json(value)) => Ok(value),
            Some(Reply::RateLimited(retry_after)) => Err(Error::RateLimited {
                url: key,
                retry_after,
            }),
            Some(Reply::Status(status)) => Err(Error::HttpStatus { url: key, status }),
            None => Err(Error::HttpStatus {
                url: key,
                status: 404,
            }),
        }
    }
}
