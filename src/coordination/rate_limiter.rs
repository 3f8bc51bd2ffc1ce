//! Per-platform sliding-window admission control (C1).
//!
//! Grounded on the sliding-window pattern in the codebase's own per-IP
//! rate-limit middleware, re-expressed over the coordination-store sorted
//! set contract instead of a single hardcoded in-process map so the window
//! state can be shared across processes by swapping the store.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::coordination::store::CoordinationStore;
use crate::errors::CoordinationError;
use crate::models::Platform;

const WINDOW_SECS: f64 = 3600.0;
const TTL_SLACK_SECS: u64 = 60;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Wall-clock source, injectable so tests can advance time without sleeping.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> f64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> f64 {
        now_secs()
    }
}

pub struct RateLimiter {
    store: Arc<dyn CoordinationStore>,
    poll_interval: Duration,
    caps: Caps,
    clock: Arc<dyn Clock>,
}

/// Per-platform hourly caps, supplied from `Config` at construction.
#[derive(Debug, Clone, Copy)]
pub struct Caps {
    pub chatgpt: u32,
    pub perplexity: u32,
    pub google_ai: u32,
}

impl Caps {
    pub fn for_platform(&self, platform: Platform) -> u32 {
        match platform {
            Platform::Chatgpt => self.chatgpt,
            Platform::Perplexity => self.perplexity,
            Platform::GoogleAi => self.google_ai,
        }
    }
}

fn now_secs() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn key_for(platform: Platform) -> String {
    format!("rl:{}", platform.as_str())
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CoordinationStore>, caps: Caps) -> Self {
        Self {
            store,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            caps,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns whether one request fits under the platform's hourly cap
    /// right now; on true, records the admission.
    pub fn try_acquire(&self, platform: Platform) -> Result<bool, CoordinationError> {
        let key = key_for(platform);
        let now = self.clock.now_secs();

        self.store.zremrangebyscore(&key, now - WINDOW_SECS)?;
        let current = self.store.zcard(&key)?;
        let cap = self.caps.for_platform(platform) as usize;

        if current >= cap {
            return Ok(false);
        }

        let suffix: u32 = rand::thread_rng().gen();
        let member = format!("{now}:{suffix:08x}");
        self.store.zadd(&key, &member, now)?;
        self.store
            .expire(&key, Duration::from_secs_f64(WINDOW_SECS) + Duration::from_secs(TTL_SLACK_SECS))?;
        Ok(true)
    }

    /// Polls `try_acquire` until success or `timeout` elapses.
    pub async fn wait_and_acquire(
        &self,
        platform: Platform,
        timeout: Duration,
    ) -> Result<bool, CoordinationError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.try_acquire(platform)? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(self.poll_interval.min(deadline - tokio::time::Instant::now())).await;
        }
    }

    /// Remaining admissions in the current window, for operators/tests.
    pub fn remaining(&self, platform: Platform) -> Result<u32, CoordinationError> {
        let key = key_for(platform);
        let now = self.clock.now_secs();
        self.store.zremrangebyscore(&key, now - WINDOW_SECS)?;
        let current = self.store.zcard(&key)? as u32;
        Ok(self.caps.for_platform(platform).saturating_sub(current))
    }

    pub fn reset(&self, platform: Platform) -> Result<(), CoordinationError> {
        self.store.delete(&key_for(platform))
    }
}

#[cfg(test)]
struct TestClock(parking_lot::Mutex<f64>);

#[cfg(test)]
impl Clock for TestClock {
    fn now_secs(&self) -> f64 {
        *self.0.lock()
    }
}

#[cfg(test)]
impl TestClock {
    fn new(start: f64) -> Arc<Self> {
        Arc::new(Self(parking_lot::Mutex::new(start)))
    }

    fn advance(&self, secs: f64) {
        *self.0.lock() += secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::store::InMemoryCoordinationStore;

    fn limiter_with_cap(cap: u32) -> RateLimiter {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
        RateLimiter::new(
            store,
            Caps {
                chatgpt: cap,
                perplexity: cap,
                google_ai: cap,
            },
        )
    }

    #[test]
    fn admits_up_to_cap_then_rejects() {
        let limiter = limiter_with_cap(3);
        assert!(limiter.try_acquire(Platform::Chatgpt).unwrap());
        assert!(limiter.try_acquire(Platform::Chatgpt).unwrap());
        assert!(limiter.try_acquire(Platform::Chatgpt).unwrap());
        assert!(!limiter.try_acquire(Platform::Chatgpt).unwrap());
    }

    #[test]
    fn independent_platforms_have_independent_budgets() {
        let limiter = limiter_with_cap(1);
        assert!(limiter.try_acquire(Platform::Chatgpt).unwrap());
        assert!(limiter.try_acquire(Platform::Perplexity).unwrap());
        assert!(!limiter.try_acquire(Platform::Chatgpt).unwrap());
    }

    #[tokio::test]
    async fn wait_and_acquire_times_out_when_exhausted() {
        let limiter = limiter_with_cap(1);
        assert!(limiter.try_acquire(Platform::Chatgpt).unwrap());
        let ok = limiter
            .wait_and_acquire(Platform::Chatgpt, Duration::from_millis(50))
            .await
            .unwrap();
        assert!(!ok);
    }

    /// S4 — rate-limit cap: three admissions succeed, the fourth is
    /// rejected, and a fifth succeeds once the window has fully elapsed.
    #[test]
    fn s4_rate_limit_cap_and_window_rollover() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
        let clock = TestClock::new(1_000_000.0);
        let limiter = RateLimiter::new(
            store,
            Caps {
                chatgpt: 3,
                perplexity: 3,
                google_ai: 3,
            },
        )
        .with_clock(clock.clone());

        assert!(limiter.try_acquire(Platform::Chatgpt).unwrap());
        assert!(limiter.try_acquire(Platform::Chatgpt).unwrap());
        assert!(limiter.try_acquire(Platform::Chatgpt).unwrap());
        assert!(!limiter.try_acquire(Platform::Chatgpt).unwrap());

        clock.advance(3601.0);
        assert!(limiter.try_acquire(Platform::Chatgpt).unwrap());
    }
}
