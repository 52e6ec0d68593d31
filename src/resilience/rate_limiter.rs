//! Token-bucket rate limiter

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Lowest refill rate accepted; lower values would stall callers indefinitely
const MIN_TOKENS_PER_SECOND: f64 = 0.001;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket with capacity `max_burst`, refilled at `tokens_per_second`.
///
/// The bucket starts full. `try_acquire` never waits; `acquire` sleeps until
/// the next token is due instead of polling.
#[derive(Debug)]
pub struct RateLimiter {
    tokens_per_second: f64,
    max_burst: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a full bucket
    pub fn new(tokens_per_second: f64, max_burst: u32) -> Self {
        let tokens_per_second = if tokens_per_second.is_finite() {
            tokens_per_second.max(MIN_TOKENS_PER_SECOND)
        } else {
            f64::MAX
        };
        let max_burst = f64::from(max_burst.max(1));
        Self {
            tokens_per_second,
            max_burst,
            bucket: Mutex::new(Bucket {
                tokens: max_burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Refill rate
    pub fn tokens_per_second(&self) -> f64 {
        self.tokens_per_second
    }

    /// Bucket capacity
    pub fn max_burst(&self) -> u32 {
        self.max_burst as u32
    }

    /// Tokens currently in the bucket (after refill)
    pub fn available_tokens(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        bucket.tokens
    }

    /// Take a token if one is available
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait until a token is available, then take it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                self.refill(&mut bucket);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                (1.0 - bucket.tokens) / self.tokens_per_second
            };
            tokio::time::sleep(Duration::from_secs_f64(wait.max(0.0))).await;
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.tokens_per_second).min(self.max_burst);
        bucket.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_starts_full() {
        let limiter = RateLimiter::new(1.0, 3);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_over_time() {
        let limiter = RateLimiter::new(2.0, 2);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_capped_at_burst() {
        let limiter = RateLimiter::new(10.0, 2);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(limiter.available_tokens() <= 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_token() {
        let limiter = RateLimiter::new(4.0, 1);
        let started = Instant::now();
        limiter.acquire().await;
        assert!(started.elapsed() < Duration::from_millis(1));

        limiter.acquire().await;
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_rate_is_clamped() {
        let limiter = RateLimiter::new(0.0, 0);
        assert_eq!(limiter.max_burst(), 1);
        assert!(limiter.tokens_per_second() > 0.0);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }
}
