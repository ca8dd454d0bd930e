mod fetcher;
mod retry;
mod throttle;

#[cfg(test)]
pub(crate) mod testing;

pub use fetcher::{
    FailureKind, FetchFailure, FetchKind, FetchOutcome, FetchResult, Fetcher, HttpTransport, Transport,
    TransportError, TransportResponse, UserAgentPool, DEFAULT_USER_AGENTS, MAX_BODY_BYTES,
};
pub use retry::{Attempted, RetryPolicy};
pub use throttle::Throttler;
