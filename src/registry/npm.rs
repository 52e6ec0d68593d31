//! npm registry provider
//!
//! Fetches package version information from the npm registry.
//! API endpoint: https://registry.npmjs.org/{package}

use crate::error::RegistryError;
use crate::registry::{HttpClient, RegistryProvider};
use crate::update::PackageVersions;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// npm registry base URL
pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// npm registry provider
pub struct NpmRegistry {
    client: HttpClient,
    base_url: String,
}

/// npm package metadata response
#[derive(Debug, Deserialize)]
struct NpmPackageResponse {
    /// Available versions
    #[serde(default)]
    versions: HashMap<String, serde_json::Value>,
    /// Dist-tags (`latest`, `next`, ...)
    #[serde(rename = "dist-tags", default)]
    dist_tags: HashMap<String, String>,
}

impl NpmRegistry {
    /// Create a provider for the public npm registry
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, NPM_REGISTRY_URL)
    }

    /// Create a provider for a registry mirror
    pub fn with_base_url(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the URL for a package; the scope separator is escaped
    fn build_url(&self, package: &str) -> String {
        format!("{}/{}", self.base_url, package.replace('/', "%2F"))
    }
}

#[async_trait]
impl RegistryProvider for NpmRegistry {
    fn registry_name(&self) -> &str {
        "npm"
    }

    async fn fetch_versions(&self, package: &str) -> Result<PackageVersions, RegistryError> {
        let url = self.build_url(package);
        let response: NpmPackageResponse = self
            .client
            .get_json(&url, package, self.registry_name())
            .await?;

        Ok(into_package_versions(package, response))
    }
}

fn into_package_versions(package: &str, response: NpmPackageResponse) -> PackageVersions {
    let mut versions: Vec<String> = response.versions.into_keys().collect();
    versions.sort();
    let info = PackageVersions::new(package, versions);
    match response.dist_tags.get("latest") {
        Some(latest) => info.with_latest(latest),
        None => info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> NpmRegistry {
        NpmRegistry::new(HttpClient::new().unwrap())
    }

    #[test]
    fn test_registry_name() {
        assert_eq!(registry().registry_name(), "npm");
    }

    #[test]
    fn test_build_url() {
        assert_eq!(
            registry().build_url("lodash"),
            "https://registry.npmjs.org/lodash"
        );
    }

    #[test]
    fn test_build_url_scoped_package() {
        assert_eq!(
            registry().build_url("@types/node"),
            "https://registry.npmjs.org/@types%2Fnode"
        );
    }

    #[test]
    fn test_build_url_mirror_trailing_slash() {
        let mirror = NpmRegistry::with_base_url(HttpClient::new().unwrap(), "http://localhost:4873/");
        assert_eq!(mirror.build_url("react"), "http://localhost:4873/react");
    }

    #[test]
    fn test_parse_response() {
        let json = r#"{
            "name": "lodash",
            "dist-tags": { "latest": "4.17.21", "next": "5.0.0-beta.1" },
            "versions": { "4.17.20": {}, "4.17.21": {}, "5.0.0-beta.1": {} }
        }"#;
        let response: NpmPackageResponse = serde_json::from_str(json).unwrap();
        let info = into_package_versions("lodash", response);
        assert_eq!(info.name, "lodash");
        assert_eq!(info.versions.len(), 3);
        assert_eq!(info.latest.as_deref(), Some("4.17.21"));
    }

    #[test]
    fn test_parse_response_without_tags() {
        let response: NpmPackageResponse = serde_json::from_str(r#"{"versions":{"1.0.0":{}}}"#).unwrap();
        let info = into_package_versions("tiny", response);
        assert!(info.latest.is_none());
    }
}
