//! Cached, rate-limited and circuit-broken registry access
//!
//! Lookups are served from the registry cache first. Misses go through a
//! token bucket and a circuit breaker before reaching the wrapped provider;
//! batches fan out with bounded concurrency.

use crate::cache::Cache;
use crate::error::RegistryError;
use crate::registry::RegistryProvider;
use crate::resilience::{
    parallel_map, BreakerError, CircuitBreaker, CircuitBreakerConfig, ProgressFn, RateLimiter,
};
use crate::update::{PackageVersions, VersionLookup};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of lookups in flight
const DEFAULT_CONCURRENCY: usize = 10;

/// Registry wrapper that memoizes and protects lookups
pub struct CachedRegistry {
    inner: Arc<dyn RegistryProvider>,
    cache: Arc<Cache<PackageVersions>>,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    concurrency: usize,
    ttl: Option<Duration>,
}

impl CachedRegistry {
    /// Wrap `inner` with default limits (10 req/s, burst 10, breaker at 5 failures)
    pub fn new(inner: Arc<dyn RegistryProvider>, cache: Arc<Cache<PackageVersions>>) -> Self {
        let breaker = CircuitBreaker::new(
            format!("registry:{}", inner.registry_name()),
            CircuitBreakerConfig {
                failure_threshold: 5,
                recovery_timeout: Duration::from_secs(30),
            },
        );
        Self {
            inner,
            cache,
            limiter: RateLimiter::new(10.0, 10),
            breaker,
            concurrency: DEFAULT_CONCURRENCY,
            ttl: None,
        }
    }

    /// Replace the rate limit
    pub fn with_rate_limit(mut self, tokens_per_second: f64, max_burst: u32) -> Self {
        self.limiter = RateLimiter::new(tokens_per_second, max_burst);
        self
    }

    /// Replace the circuit breaker thresholds
    pub fn with_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = CircuitBreaker::new(self.breaker.name().to_string(), config);
        self
    }

    /// Set the number of lookups in flight for batches
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Override the cache namespace default TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// The circuit breaker guarding the provider
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Look up every package, in input order.
    ///
    /// Failures are kept per package; one failing lookup does not affect the
    /// others. `on_progress` receives `(completed, total)`.
    pub async fn fetch_all(
        &self,
        packages: &[String],
        on_progress: Option<&ProgressFn<'_>>,
    ) -> VersionLookup {
        let results = parallel_map(
            packages.iter().cloned(),
            self.concurrency,
            |package| async move {
                let result = self.fetch_versions(&package).await;
                if let Err(e) = &result {
                    warn!(package = %package, error = %e, "registry lookup failed");
                }
                (package, result)
            },
            on_progress,
        )
        .await;

        results.into_iter().collect()
    }

    async fn fetch_uncached(&self, package: &str) -> Result<PackageVersions, RegistryError> {
        self.limiter.acquire().await;
        let registry = self.inner.registry_name().to_string();
        self.breaker
            .call_with(
                || self.inner.fetch_versions(package),
                RegistryError::is_retryable,
            )
            .await
            .map_err(|e| match e {
                BreakerError::Open { retry_after } => RegistryError::CircuitOpen {
                    registry,
                    retry_after,
                },
                BreakerError::Inner(e) => e,
            })
    }
}

#[async_trait]
impl RegistryProvider for CachedRegistry {
    fn registry_name(&self) -> &str {
        self.inner.registry_name()
    }

    async fn fetch_versions(&self, package: &str) -> Result<PackageVersions, RegistryError> {
        if let Some(hit) = self.cache.get(package) {
            debug!(package, "registry cache hit");
            return Ok(hit);
        }

        let versions = self.fetch_uncached(package).await?;
        self.cache.set(package, versions.clone(), self.ttl);
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::registry::FixedRegistry;
    use crate::resilience::CircuitState;

    fn cache() -> Arc<Cache<PackageVersions>> {
        Arc::new(Cache::new(CacheConfig::new("registry")))
    }

    fn fixed() -> Arc<FixedRegistry> {
        Arc::new(FixedRegistry::new([
            PackageVersions::new("lodash", ["4.17.0", "4.17.21"]).with_latest("4.17.21"),
            PackageVersions::new("react", ["18.2.0"]),
        ]))
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let inner = fixed();
        let registry = CachedRegistry::new(inner.clone(), cache());

        let first = registry.fetch_versions("lodash").await.unwrap();
        let second = registry.fetch_versions("lodash").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let inner = fixed();
        let registry = CachedRegistry::new(inner.clone(), cache());
        assert!(registry.fetch_versions("missing").await.is_err());
        assert!(registry.fetch_versions("missing").await.is_err());
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_order_and_errors() {
        let registry = CachedRegistry::new(fixed(), cache()).with_concurrency(2);
        let packages = vec!["react".to_string(), "missing".to_string(), "lodash".to_string()];
        let lookup = registry.fetch_all(&packages, None).await;

        assert_eq!(lookup.len(), 3);
        assert!(lookup["react"].is_ok());
        assert!(lookup["missing"].is_err());
        assert_eq!(
            lookup["lodash"].as_ref().unwrap().latest.as_deref(),
            Some("4.17.21")
        );
    }

    #[tokio::test]
    async fn test_not_found_does_not_trip_breaker() {
        let registry = CachedRegistry::new(fixed(), cache()).with_breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_secs(60),
        });
        assert!(registry.fetch_versions("missing").await.is_err());
        assert_eq!(registry.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_sheds_after_transient_failures() {
        let inner = Arc::new(
            FixedRegistry::default().with_failure("flaky", RegistryError::timeout("flaky", "fixed")),
        );
        let registry = CachedRegistry::new(inner.clone(), cache()).with_breaker(
            CircuitBreakerConfig {
                failure_threshold: 2,
                recovery_timeout: Duration::from_secs(60),
            },
        );

        assert!(registry.fetch_versions("flaky").await.is_err());
        assert!(registry.fetch_versions("flaky").await.is_err());
        let shed = registry.fetch_versions("flaky").await.unwrap_err();
        assert!(matches!(shed, RegistryError::CircuitOpen { .. }));
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_progress_is_reported() {
        let registry = CachedRegistry::new(fixed(), cache());
        let seen = parking_lot::Mutex::new(Vec::new());
        let record = |done: usize, total: usize| seen.lock().push((done, total));
        registry
            .fetch_all(&["react".to_string(), "lodash".to_string()], Some(&record))
            .await;
        assert_eq!(*seen.lock(), vec![(1, 2), (2, 2)]);
    }
}
