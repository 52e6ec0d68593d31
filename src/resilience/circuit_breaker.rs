//! Circuit breaker
//!
//! Closed: calls pass through and consecutive failures are counted.
//! Open: calls are rejected without running until the recovery timeout elapses.
//! HalfOpen: a single trial call is let through; success closes the circuit,
//! failure opens it again.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Calls are rejected
    Open,
    /// Recovery timeout elapsed, one trial call allowed
    HalfOpen,
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Outcome of a call through the breaker
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// Rejected without invoking the operation
    #[error("circuit breaker is open (retry in {}ms)", .retry_after.as_millis())]
    Open { retry_after: Duration },

    /// The operation ran and failed
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Circuit breaker guarding a single downstream operation
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed circuit breaker
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Name used in log records
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state. An open circuit whose recovery timeout has elapsed
    /// reports `HalfOpen`.
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock();
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at))
                if opened_at.elapsed() >= self.config.recovery_timeout =>
            {
                CircuitState::HalfOpen
            }
            (state, _) => state,
        }
    }

    /// Consecutive failures observed while closed
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Force the circuit closed and clear counters
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    /// Run `operation` through the breaker; every error counts as a failure
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(operation, |_| true).await
    }

    /// Run `operation` through the breaker; only errors accepted by
    /// `is_failure` move the breaker towards open. Other errors are passed
    /// through and count as a healthy response.
    pub async fn call_with<T, E, F, Fut, P>(
        &self,
        operation: F,
        is_failure: P,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut permit = self.admit().map_err(|retry_after| BreakerError::Open { retry_after })?;

        let result = operation().await;
        permit.settled = true;
        match &result {
            Ok(_) => self.on_success(),
            Err(err) if is_failure(err) => self.on_failure(),
            Err(_) => self.on_success(),
        }
        result.map_err(BreakerError::Inner)
    }

    fn admit(&self) -> Result<Permit<'_>, Duration> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {}
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(self.config.recovery_timeout);
                if elapsed < self.config.recovery_timeout {
                    return Err(self.config.recovery_timeout - elapsed);
                }
                info!(breaker = %self.name, "circuit half-open, allowing trial call");
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(Duration::ZERO);
                }
                inner.trial_in_flight = true;
            }
        }
        Ok(Permit {
            breaker: self,
            settled: false,
        })
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!(breaker = %self.name, "circuit closed after successful trial call");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        threshold = self.config.failure_threshold,
                        "circuit opened after consecutive failures"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                warn!(breaker = %self.name, "trial call failed, circuit re-opened");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.trial_in_flight = false;
            }
        }
    }
}

/// Admission token; releases a half-open trial slot if the call is dropped
/// before it settles.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.inner.lock().trial_in_flight = false;
        }
    }
}
