//! Registry providers for fetching package version information
//!
//! This module provides:
//! - HTTP client shared foundation with retry logic
//! - npm registry provider
//! - Cached, rate-limited, circuit-broken wrapper around any provider
//! - Fixed provider serving pre-supplied version lists

mod cached;
mod client;
mod fixed;
mod npm;

pub use cached::CachedRegistry;
pub use client::{HttpClient, DEFAULT_USER_AGENT};
pub use fixed::FixedRegistry;
pub use npm::{NpmRegistry, NPM_REGISTRY_URL};

use crate::error::RegistryError;
use crate::update::PackageVersions;
use async_trait::async_trait;

/// Source of published package versions
#[async_trait]
pub trait RegistryProvider: Send + Sync {
    /// Registry name used in errors and log records
    fn registry_name(&self) -> &str;

    /// Fetch the published versions and `latest` tag of a package
    async fn fetch_versions(&self, package: &str) -> Result<PackageVersions, RegistryError>;
}
