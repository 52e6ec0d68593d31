//! Registry provider serving pre-supplied version lists

use crate::error::RegistryError;
use crate::registry::RegistryProvider;
use crate::update::PackageVersions;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory registry for offline snapshots and tests
#[derive(Debug, Default)]
pub struct FixedRegistry {
    versions: HashMap<String, PackageVersions>,
    failures: HashMap<String, RegistryError>,
    calls: AtomicUsize,
}

impl FixedRegistry {
    /// Serve the given version lists
    pub fn new(versions: impl IntoIterator<Item = PackageVersions>) -> Self {
        Self {
            versions: versions.into_iter().map(|v| (v.name.clone(), v)).collect(),
            ..Self::default()
        }
    }

    /// Fail lookups of `package` with `error`
    pub fn with_failure(mut self, package: impl Into<String>, error: RegistryError) -> Self {
        self.failures.insert(package.into(), error);
        self
    }

    /// Number of lookups served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryProvider for FixedRegistry {
    fn registry_name(&self) -> &str {
        "fixed"
    }

    async fn fetch_versions(&self, package: &str) -> Result<PackageVersions, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.get(package) {
            return Err(error.clone());
        }
        self.versions
            .get(package)
            .cloned()
            .ok_or_else(|| RegistryError::package_not_found(package, self.registry_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_known_packages() {
        let registry = FixedRegistry::new([PackageVersions::new("lodash", ["4.17.21"])]);
        let info = registry.fetch_versions("lodash").await.unwrap();
        assert_eq!(info.versions, vec!["4.17.21"]);
        assert_eq!(registry.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_package_is_not_found() {
        let registry = FixedRegistry::default();
        let err = registry.fetch_versions("nope").await.unwrap_err();
        assert!(matches!(err, RegistryError::PackageNotFound { .. }));
    }

    #[tokio::test]
    async fn test_configured_failure() {
        let registry = FixedRegistry::new([PackageVersions::new("react", ["18.2.0"])])
            .with_failure("react", RegistryError::timeout("react", "fixed"));
        assert!(matches!(
            registry.fetch_versions("react").await,
            Err(RegistryError::Timeout { .. })
        ));
    }
}
