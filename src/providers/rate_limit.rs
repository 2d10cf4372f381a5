//! Token bucket rate limiter owned by each provider adapter.
//!
//! Tokens refill continuously at the per-minute rate up to the burst
//! capacity. An optional daily allowance is counted over a rolling 24 hour
//! window that starts with the first request.

use crate::core::config::RateLimitConfig;
use crate::core::model::ProviderId;
use crate::core::provider::{ProviderError, ProviderResult, RateLimitStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_update: Instant,
    /// Tokens per second.
    rate: f64,
    capacity: f64,
    day_started: Instant,
    day_count: u32,
}

enum Take {
    Granted,
    Wait(Duration),
    DailyExhausted,
}

impl Bucket {
    fn new(config: &RateLimitConfig) -> Self {
        let per_minute = config.requests_per_minute.max(1);
        let capacity = f64::from(config.burst.unwrap_or(per_minute).max(1));
        let now = Instant::now();
        Self {
            tokens: capacity,
            last_update: now,
            rate: f64::from(per_minute) / 60.0,
            capacity,
            day_started: now,
            day_count: 0,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;

        if now.duration_since(self.day_started) >= DAY {
            self.day_started = now;
            self.day_count = 0;
        }
    }

    fn take(&mut self, per_day: Option<u32>) -> Take {
        self.refill();

        if per_day.is_some_and(|limit| self.day_count >= limit) {
            return Take::DailyExhausted;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            self.day_count += 1;
            Take::Granted
        } else {
            Take::Wait(Duration::from_secs_f64((1.0 - self.tokens) / self.rate))
        }
    }
}

pub struct RateLimiter {
    provider: ProviderId,
    config: RateLimitConfig,
    bucket: Mutex<Bucket>,
    requests_made: AtomicU64,
    requests_rejected: AtomicU64,
}

impl RateLimiter {
    pub fn new(provider: ProviderId, config: RateLimitConfig) -> Self {
        Self {
            provider,
            bucket: Mutex::new(Bucket::new(&config)),
            config,
            requests_made: AtomicU64::new(0),
            requests_rejected: AtomicU64::new(0),
        }
    }

    // A poisoned bucket only means slightly off accounting.
    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter for '{}' was poisoned, recovering", self.provider);
            poisoned.into_inner()
        })
    }

    /// Takes a token, waiting at most `max_wait_ms` for one to refill.
    ///
    /// A spent daily allowance is rejected without waiting. Rejections are
    /// counted and reported as [`ProviderError::RateLimited`].
    pub async fn acquire(&self) -> ProviderResult<()> {
        let deadline = Instant::now() + Duration::from_millis(self.config.max_wait_ms);
        loop {
            let wait = match self.lock().take(self.config.requests_per_day) {
                Take::Granted => {
                    self.requests_made.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Take::DailyExhausted => {
                    debug!("Daily allowance spent for '{}'", self.provider);
                    return Err(self.reject());
                }
                Take::Wait(wait) => wait,
            };

            if Instant::now() + wait > deadline {
                debug!(
                    "Rate limiter for '{}' needs {:?}, more than the allowed wait",
                    self.provider, wait
                );
                return Err(self.reject());
            }

            debug!("Rate limiter: waiting {:?} for '{}'", wait, self.provider);
            tokio::time::sleep(wait).await;
        }
    }

    fn reject(&self) -> ProviderError {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
        ProviderError::RateLimited {
            provider: self.provider,
        }
    }

    pub fn status(&self) -> RateLimitStatus {
        let (tokens, day_count) = {
            let mut bucket = self.lock();
            bucket.refill();
            (bucket.tokens, bucket.day_count)
        };
        RateLimitStatus {
            provider: self.provider,
            requests_made: self.requests_made.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            remaining_this_minute: tokens.floor(),
            remaining_today: self
                .config
                .requests_per_day
                .map(|limit| limit.saturating_sub(day_count)),
        }
    }
}
