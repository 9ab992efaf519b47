//! Minimum-interval rate limiting for outbound requests.
//!
//! A [`RateLimiter`] remembers when each external service was last called and
//! makes the next caller wait until the configured interval has elapsed.
//! Services are identified by a string key: search backends use their engine
//! name, and every page fetch shares the [`PAGE_SERVICE`] key. Candidate
//! fetches usually go to a different host each time, so a per-host key would
//! never wait at all.
//!
//! The limiter is an explicit collaborator: the binary builds one and hands a
//! shared handle ([`SharedLimiter`]) to every backend and fetcher it creates,
//! so instances talking to the same service share one interval while
//! independent limiters (for example in parallel tests) never interfere.

use rand::{Rng, rng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

pub type SharedLimiter = Arc<RateLimiter>;

/// Limiter key for all page fetches, seed and candidates alike.
pub const PAGE_SERVICE: &str = "pages";

/// Deadline used when the configured interval does not fit an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    max_jitter: Duration,
    last_call: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    /// Create a limiter enforcing `interval` between calls to the same service.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_jitter: Duration::ZERO,
            last_call: Mutex::new(HashMap::new()),
        }
    }

    /// Add up to `max_jitter` of random extra delay to every enforced wait.
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn shared(self) -> SharedLimiter {
        Arc::new(self)
    }

    /// Wait until `service` may be called again, then record the call.
    ///
    /// The first call to a service never waits.
    pub async fn wait(&self, service: &str) {
        let deadline = {
            let mut last_call = self.last_call.lock().await;
            let now = Instant::now();
            let deadline = match last_call.get(service) {
                Some(prev) if !self.interval.is_zero() => {
                    let earliest = prev
                        .checked_add(self.interval.saturating_add(self.jitter()))
                        .unwrap_or_else(|| now + FAR_FUTURE);
                    earliest.max(now)
                }
                _ => now,
            };
            last_call.insert(service.to_string(), deadline);
            deadline
        };

        let wait = deadline.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            debug!(service, wait_ms = wait.as_millis() as u64, "Rate limiting outbound request");
            sleep_until(deadline).await;
        }
    }

    fn jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        let ms: u64 = rng().random_range(0..=self.max_jitter.as_millis() as u64);
        Duration::from_millis(ms)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}
