//! Resilience primitives for calling slow or unreliable external systems
//!
//! This module provides:
//! - Bounded retry with exponential backoff and a retry predicate
//! - Circuit breaker that sheds calls after repeated failures
//! - Token-bucket rate limiter with blocking and non-blocking acquisition
//! - Bounded-concurrency task queue and order-preserving parallel map
//!
//! Nothing in here knows about registries or analysis backends; callers map
//! the generic errors onto their own error types.

mod circuit_breaker;
mod concurrency;
mod rate_limiter;
mod retry;

pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use concurrency::{parallel_map, parallel_map_rate_limited, ProgressFn, TaskQueue};
pub use rate_limiter::RateLimiter;
pub use retry::{retry, RetryPolicy};
