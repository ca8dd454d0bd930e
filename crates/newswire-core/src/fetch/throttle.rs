use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

type DomainClock = Arc<AsyncMutex<Option<Instant>>>;

/// Per-domain politeness gate
///
/// Each domain owns its own clock behind its own lock, so a caller waiting on
/// one domain never holds up requests to another. The outer map lock is only
/// held long enough to look up or insert a clock.
#[derive(Debug)]
pub struct Throttler {
    delay: Duration,
    domains: Mutex<HashMap<String, DomainClock>>,
}

impl Throttler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            domains: Mutex::new(HashMap::new()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn clock(&self, domain: &str) -> DomainClock {
        let mut domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        domains
            .entry(domain.to_ascii_lowercase())
            .or_default()
            .clone()
    }

    /// Suspend until `delay` has passed since the last permitted request to
    /// `domain`, then record now as the new last request. Never fails.
    pub async fn wait_if_needed(&self, domain: &str) {
        let clock = self.clock(domain);
        let mut last = clock.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.delay;
            let now = Instant::now();
            if ready_at > now {
                tracing::debug!(
                    domain,
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "Throttling request"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }
}
