use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::{Client, Proxy};
use url::Url;

use super::retry::RetryPolicy;
use super::throttle::Throttler;
use crate::config::FetchConfig;
use crate::{Error, Result};

/// Largest response body accepted from a publisher
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

// Browser identities rotated on every attempt
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    // Firefox on Linux
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    // Safari on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    // Edge on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Feed,
    Page,
}

impl FetchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchKind::Feed => "feed",
            FetchKind::Page => "page",
        }
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Connection,
    HttpStatus(u16),
    InvalidUrl,
    UnsupportedScheme,
    TooLarge,
    Request,
}

impl FailureKind {
    /// Timeouts, dropped connections, 5xx and 429 are worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            FailureKind::Timeout | FailureKind::Connection => true,
            FailureKind::HttpStatus(status) => *status == 429 || (500..600).contains(status),
            FailureKind::InvalidUrl
            | FailureKind::UnsupportedScheme
            | FailureKind::TooLarge
            | FailureKind::Request => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => f.write_str("timeout"),
            FailureKind::Connection => f.write_str("connection error"),
            FailureKind::HttpStatus(status) => write!(f, "HTTP {}", status),
            FailureKind::InvalidUrl => f.write_str("malformed URL"),
            FailureKind::UnsupportedScheme => f.write_str("unsupported scheme"),
            FailureKind::TooLarge => f.write_str("response too large"),
            FailureKind::Request => f.write_str("request error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.detail)
        }
    }
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success { status: u16, body: Bytes },
    /// Retry budget spent on transient failures; carries the last one
    TransientFailure(FetchFailure),
    PermanentFailure(FetchFailure),
}

/// Terminal result of fetching one target
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub target: String,
    pub kind: FetchKind,
    pub attempts: u32,
    pub outcome: FetchOutcome,
}

impl FetchResult {
    fn rejected(target: &str, kind: FetchKind, failure: FetchFailure) -> Self {
        Self {
            target: target.to_string(),
            kind,
            attempts: 0,
            outcome: FetchOutcome::PermanentFailure(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Success { .. })
    }

    pub fn body(&self) -> Option<&Bytes> {
        match &self.outcome {
            FetchOutcome::Success { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        match &self.outcome {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::TransientFailure(f) | FetchOutcome::PermanentFailure(f) => Some(f),
        }
    }
}

pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("response body too large")]
    TooLarge,
    #[error("{0}")]
    Other(String),
}

/// One HTTP GET; the network seam the fetcher is written against
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url, user_agent: &str) -> std::result::Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport with browser-like headers
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: Self::build_client(config.timeout(), &config.proxy_url)?,
        })
    }

    /// Build HTTP client with optional proxy
    fn build_client(timeout: Duration, proxy_url: &Option<String>) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(ref proxy) = proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for news fetching");
        }

        builder.build().map_err(Error::Http)
    }

    fn build_headers(user_agent: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/rss+xml,application/atom+xml,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
        headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
        if let Ok(ua) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        headers
    }

    fn classify(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() || err.is_request() || err.is_body() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url, user_agent: &str) -> std::result::Result<TransportResponse, TransportError> {
        let mut response = self
            .client
            .get(url.clone())
            .headers(Self::build_headers(user_agent))
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if !status.is_success() {
            return Ok(TransportResponse {
                status: status.as_u16(),
                body: Bytes::new(),
            });
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_BODY_BYTES as u64)
        {
            return Err(TransportError::TooLarge);
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(Self::classify)? {
            if body.len() + chunk.len() > MAX_BODY_BYTES {
                return Err(TransportError::TooLarge);
            }
            body.extend_from_slice(&chunk);
        }

        Ok(TransportResponse {
            status: status.as_u16(),
            body: body.freeze(),
        })
    }
}

/// Round-robin pool of User-Agent strings
#[derive(Debug)]
pub struct UserAgentPool {
    agents: Vec<String>,
    next: AtomicUsize,
}

impl UserAgentPool {
    /// Blank entries are ignored; an empty pool falls back to the defaults
    pub fn new(agents: Vec<String>) -> Self {
        let mut agents: Vec<String> = agents
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if agents.is_empty() {
            agents = DEFAULT_USER_AGENTS.iter().map(|a| a.to_string()).collect();
        }
        Self {
            agents,
            next: AtomicUsize::new(0),
        }
    }

    pub fn next(&self) -> &str {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.agents.len();
        &self.agents[index]
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Fetches one target with throttling, retries and failure classification
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    throttler: Arc<Throttler>,
    policy: RetryPolicy,
    agents: UserAgentPool,
    attempt_timeout: Duration,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        throttler: Arc<Throttler>,
        policy: RetryPolicy,
        agents: UserAgentPool,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            throttler,
            policy,
            agents,
            attempt_timeout,
        }
    }

    pub fn from_config(config: &FetchConfig, transport: Arc<dyn Transport>, throttler: Arc<Throttler>) -> Self {
        Self::new(
            transport,
            throttler,
            RetryPolicy::from_config(config),
            UserAgentPool::new(config.user_agents.clone()),
            config.timeout(),
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch `target`, retrying transient failures within the policy budget
    ///
    /// Handled failures come back as a failed [`FetchResult`]; only an empty
    /// target is an error.
    pub async fn fetch(&self, target: &str, kind: FetchKind) -> Result<FetchResult> {
        let target = target.trim();
        if target.is_empty() {
            return Err(Error::InvalidTarget(format!("empty {} target", kind)));
        }

        let url = match Url::parse(target) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url = target, %kind, error = %e, "Rejecting malformed URL");
                return Ok(FetchResult::rejected(
                    target,
                    kind,
                    FetchFailure::new(FailureKind::InvalidUrl, e.to_string()),
                ));
            }
        };

        if !matches!(url.scheme(), "http" | "https") {
            tracing::warn!(url = target, %kind, scheme = url.scheme(), "Rejecting unsupported scheme");
            return Ok(FetchResult::rejected(
                target,
                kind,
                FetchFailure::new(FailureKind::UnsupportedScheme, url.scheme()),
            ));
        }

        let Some(domain) = url.host_str().map(str::to_ascii_lowercase) else {
            return Ok(FetchResult::rejected(
                target,
                kind,
                FetchFailure::new(FailureKind::InvalidUrl, "missing host"),
            ));
        };

        let url_ref = &url;
        let domain_ref = domain.as_str();
        let attempted = self
            .policy
            .run(
                move |attempt| self.attempt(url_ref, domain_ref, kind, attempt),
                FetchFailure::is_transient,
            )
            .await;

        let outcome = match attempted.result {
            Ok((status, body)) => {
                tracing::debug!(url = target, %kind, status, bytes = body.len(), "Fetched");
                FetchOutcome::Success { status, body }
            }
            Err(failure) if failure.is_transient() => {
                tracing::warn!(
                    url = target,
                    %kind,
                    attempts = attempted.attempts,
                    error = %failure,
                    "Giving up after transient failures"
                );
                FetchOutcome::TransientFailure(failure)
            }
            Err(failure) => {
                tracing::warn!(url = target, %kind, error = %failure, "Permanent fetch failure");
                FetchOutcome::PermanentFailure(failure)
            }
        };

        Ok(FetchResult {
            target: target.to_string(),
            kind,
            attempts: attempted.attempts,
            outcome,
        })
    }

    async fn attempt(
        &self,
        url: &Url,
        domain: &str,
        kind: FetchKind,
        attempt: u32,
    ) -> std::result::Result<(u16, Bytes), FetchFailure> {
        self.throttler.wait_if_needed(domain).await;

        let user_agent = self.agents.next();
        tracing::debug!(url = %url, %kind, attempt, user_agent, "Fetch attempt");

        let response = match tokio::time::timeout(self.attempt_timeout, self.transport.get(url, user_agent)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        match response {
            Ok(response) if (200..300).contains(&response.status) => Ok((response.status, response.body)),
            Ok(response) => Err(FetchFailure::new(FailureKind::HttpStatus(response.status), "")),
            Err(TransportError::Timeout) => Err(FetchFailure::new(
                FailureKind::Timeout,
                format!("no response within {}s", self.attempt_timeout.as_secs_f64()),
            )),
            Err(TransportError::Connect(detail)) => Err(FetchFailure::new(FailureKind::Connection, detail)),
            Err(TransportError::TooLarge) => Err(FetchFailure::new(
                FailureKind::TooLarge,
                format!("over {} bytes", MAX_BODY_BYTES),
            )),
            Err(TransportError::Other(detail)) => Err(FetchFailure::new(FailureKind::Request, detail)),
        }
    }
}
