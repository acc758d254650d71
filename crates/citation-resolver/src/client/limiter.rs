//! Per-provider politeness limiter.
//!
//! Every provider host gets its own `governor` limiter allowing one request
//! per politeness interval, shared by all workers of every batch that uses
//! the same client. A host that answers 429 is paused for its Retry-After
//! interval, capped at [`MAX_BACK_OFF`].

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::time::Instant;

/// Longest pause honored from a Retry-After header.
pub const MAX_BACK_OFF: Duration = Duration::from_secs(120);

/// Host-keyed rate limiters.
pub struct HostLimiter {
    quota: Option<Quota>,
    limiters: Mutex<HashMap<String, Arc<DefaultDirectRateLimiter>>>,
    paused_until: Mutex<HashMap<String, Instant>>,
}

impl HostLimiter {
    /// Create a limiter enforcing `delay` between requests to one host.
    /// A zero delay disables limiting.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        let quota = Quota::with_period(delay).map(|q| q.allow_burst(NonZeroU32::MIN));
        Self {
            quota,
            limiters: Mutex::new(HashMap::new()),
            paused_until: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a request to `host` is allowed.
    pub async fn wait(&self, host: &str) {
        if let Some(until) = self.pause_for(host) {
            tokio::time::sleep_until(until).await;
        }
        let Some(limiter) = self.limiter_for(host) else {
            return;
        };
        limiter.until_ready().await;
    }

    /// Hold further requests to `host` for `delay`.
    pub fn back_off(&self, host: &str, delay: Duration) {
        let until = Instant::now() + delay.min(MAX_BACK_OFF);
        let mut paused = self.paused_until.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = paused.entry(host.to_ascii_lowercase()).or_insert(until);
        *entry = (*entry).max(until);
        tracing::debug!(
            host,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Host paused"
        );
    }

    fn pause_for(&self, host: &str) -> Option<Instant> {
        let mut paused = self.paused_until.lock().unwrap_or_else(PoisonError::into_inner);
        let key = host.to_ascii_lowercase();
        match paused.get(&key) {
            Some(until) if *until > Instant::now() => Some(*until),
            Some(_) => {
                paused.remove(&key);
                None
            }
            None => None,
        }
    }

    fn limiter_for(&self, host: &str) -> Option<Arc<DefaultDirectRateLimiter>> {
        let quota = self.quota?;
        let mut limiters = self.limiters.lock().unwrap_or_else(PoisonError::into_inner);
        let limiter = limiters
            .entry(host.to_ascii_lowercase())
            .or_insert_with(|| Arc::new(RateLimiter::direct(quota)));
        Some(Arc::clone(limiter))
    }

    /// Number of hosts seen so far.
    #[must_use]
    pub fn host_count(&self) -> usize {
        self.limiters.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl std::fmt::Debug for HostLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLimiter")
            .field("enabled", &self.quota.is_some())
            .field("hosts", &self.host_count())
            .finish()
    }
}
