//! HTTP client shared foundation
//!
//! This module provides a shared HTTP client with:
//! - Configurable timeout and User-Agent
//! - Exponential backoff retry through the shared retry primitive
//! - Mapping of HTTP status codes onto registry errors

use crate::error::RegistryError;
use crate::resilience::{retry, RetryPolicy};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Default timeout for HTTP requests (30 seconds)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default User-Agent header
pub const DEFAULT_USER_AGENT: &str = concat!("catup/", env!("CARGO_PKG_VERSION"));

/// Maximum number of retry attempts after the first request
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BASE_DELAY_MS: u64 = 100;

/// HTTP client wrapper with retry logic
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, RegistryError> {
        Self::with_config(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(timeout: Duration, user_agent: &str) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                RegistryError::network_error(
                    "",
                    "HTTP client",
                    format!("failed to create HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Set the maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Backoff policy for one request
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries + 1)
            .with_base_delay(Duration::from_millis(BASE_DELAY_MS))
    }

    /// Perform a GET request and parse the JSON body.
    ///
    /// Timeouts, connection errors and 429 responses are retried with
    /// exponential backoff; 404 and malformed bodies fail immediately.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        package: &str,
        registry: &str,
    ) -> Result<T, RegistryError> {
        retry(
            &self.retry_policy(),
            || async move {
                let response = self
                    .client
                    .get(url)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .send()
                    .await
                    .map_err(|e| map_send_error(e, package, registry))?;

                check_status(response.status(), package, registry)?;

                response.json::<T>().await.map_err(|e| RegistryError::InvalidResponse {
                    package: package.to_string(),
                    registry: registry.to_string(),
                    message: format!("failed to parse JSON: {}", e),
                })
            },
            RegistryError::is_retryable,
        )
        .await
    }
}

fn map_send_error(error: reqwest::Error, package: &str, registry: &str) -> RegistryError {
    if error.is_timeout() {
        RegistryError::timeout(package, registry)
    } else {
        RegistryError::network_error(package, registry, error.to_string())
    }
}

/// Map a non-success status onto a registry error
fn check_status(status: StatusCode, package: &str, registry: &str) -> Result<(), RegistryError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::TOO_MANY_REQUESTS => Err(RegistryError::rate_limit_exceeded(registry)),
        StatusCode::NOT_FOUND => Err(RegistryError::package_not_found(package, registry)),
        s => Err(RegistryError::network_error(
            package,
            registry,
            format!("HTTP {}", s),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        let client = HttpClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_http_client_with_config() {
        let client = HttpClient::with_config(Duration::from_secs(60), "test-agent/1.0");
        assert!(client.is_ok());
    }

    #[test]
    fn test_http_client_with_max_retries() {
        let client = HttpClient::new().unwrap().with_max_retries(5);
        assert_eq!(client.max_retries, 5);
        assert_eq!(client.retry_policy().max_attempts, 6);
        assert_eq!(client.retry_policy().base_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(30));
        assert!(DEFAULT_USER_AGENT.starts_with("catup/"));
        assert_eq!(MAX_RETRIES, 3);
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(StatusCode::OK, "lodash", "npm").is_ok());
        assert!(matches!(
            check_status(StatusCode::NOT_FOUND, "lodash", "npm"),
            Err(RegistryError::PackageNotFound { .. })
        ));
        assert!(matches!(
            check_status(StatusCode::TOO_MANY_REQUESTS, "lodash", "npm"),
            Err(RegistryError::RateLimitExceeded { .. })
        ));
        let err = check_status(StatusCode::BAD_GATEWAY, "lodash", "npm").unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("502"));
    }
}
