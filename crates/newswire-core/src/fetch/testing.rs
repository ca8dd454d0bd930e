use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use super::{Transport, TransportError, TransportResponse};

/// Scripted reply for one request
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Status(u16, String),
    ConnectionReset,
    /// Never answers; the fetcher's attempt timeout fires
    Hang,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply::Status(200, body.into())
    }

    pub fn status(status: u16) -> Self {
        Reply::Status(status, String::new())
    }
}

/// In-memory transport: per-URL reply queues, the last reply repeats
#[derive(Default)]
pub(crate) struct MockTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, String)>>,
}

fn key(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: &str, replies: Vec<Reply>) {
        self.replies
            .lock()
            .unwrap()
            .insert(key(url), replies.into_iter().collect());
    }

    /// (url, user agent) for every request, in order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        let url = key(url);
        self.calls.lock().unwrap().iter().filter(|(u, _)| *u == url).count()
    }

    fn next_reply(&self, url: &str) -> Option<Reply> {
        let mut replies = self.replies.lock().unwrap();
        let queue = replies.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &Url, user_agent: &str) -> Result<TransportResponse, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), user_agent.to_string()));

        match self.next_reply(url.as_str()) {
            Some(Reply::Status(status, body)) => Ok(TransportResponse {
                status,
                body: Bytes::from(body),
            }),
            Some(Reply::ConnectionReset) => Err(TransportError::Connect("connection reset by peer".into())),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Err(TransportError::Timeout)
            }
            None => Ok(TransportResponse {
                status: 404,
                body: Bytes::new(),
            }),
        }
    }
}
