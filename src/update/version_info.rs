//! Version information from the registry
//!
//! This module provides the PackageVersions struct that represents the
//! published versions of a package plus its `latest` tag.

use crate::domain::parse_version;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Published versions of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersions {
    /// Package name
    pub name: String,
    /// Every published version string
    pub versions: Vec<String>,
    /// Version carrying the `latest` dist-tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
}

impl PackageVersions {
    /// Create a version list without a latest tag
    pub fn new<I, S>(name: impl Into<String>, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            versions: versions.into_iter().map(Into::into).collect(),
            latest: None,
        }
    }

    /// Set the latest tag (builder pattern)
    pub fn with_latest(mut self, latest: impl Into<String>) -> Self {
        self.latest = Some(latest.into());
        self
    }

    /// Versions that parse as semver, ascending
    pub fn sorted_versions(&self) -> Vec<Version> {
        let mut parsed: Vec<Version> = self
            .versions
            .iter()
            .filter_map(|v| parse_version(v))
            .collect();
        parsed.sort();
        parsed.dedup();
        parsed
    }

    /// The latest tag, or the highest stable version when the tag is missing
    pub fn latest_version(&self) -> Option<Version> {
        if let Some(latest) = self.latest.as_deref().and_then(parse_version) {
            return Some(latest);
        }
        self.sorted_versions()
            .into_iter()
            .rev()
            .find(|v| v.pre.is_empty())
    }
}

/// Compare two version strings. Semver ordering when both parse, otherwise
/// a numeric component-wise comparison.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if let (Some(va), Some(vb)) = (parse_version(a), parse_version(b)) {
        return va.cmp(&vb);
    }

    let parse_parts = |s: &str| -> Vec<u64> {
        let s = s.strip_prefix('v').unwrap_or(s);
        s.split(['.', '-']).filter_map(|p| p.parse().ok()).collect()
    };

    let parts_a = parse_parts(a);
    let parts_b = parse_parts(b);

    for (pa, pb) in parts_a.iter().zip(parts_b.iter()) {
        match pa.cmp(pb) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    // If all common parts are equal, the longer version is greater
    parts_a.len().cmp(&parts_b.len())
}

/// True for prerelease versions (`1.0.0-beta.1`, `19.3.0-canary-abc`)
pub fn is_prerelease_version(version: &str) -> bool {
    match parse_version(version) {
        Some(v) => !v.pre.is_empty(),
        None => version.contains('-'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_versions_skips_garbage() {
        let info = PackageVersions::new("lodash", ["4.17.21", "not-a-version", "4.9.0", "4.17.0"]);
        let sorted: Vec<String> = info.sorted_versions().iter().map(|v| v.to_string()).collect();
        assert_eq!(sorted, vec!["4.9.0", "4.17.0", "4.17.21"]);
    }

    #[test]
    fn test_latest_version_prefers_tag() {
        let info = PackageVersions::new("react", ["18.2.0", "19.0.0-rc.1"]).with_latest("18.2.0");
        assert_eq!(info.latest_version(), Some(Version::new(18, 2, 0)));
    }

    #[test]
    fn test_latest_version_without_tag_ignores_prereleases() {
        let info = PackageVersions::new("react", ["18.2.0", "18.3.0", "19.0.0-rc.1"]);
        assert_eq!(info.latest_version(), Some(Version::new(18, 3, 0)));
        assert_eq!(PackageVersions::new("empty", Vec::<String>::new()).latest_version(), None);
    }

    #[test]
    fn test_compare_versions_basic() {
        assert_eq!(compare_versions("1.0.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.0", "2.0.0"), Ordering::Less);
        assert_eq!(compare_versions("2.0.0", "1.0.0"), Ordering::Greater);
    }

    #[test]
    fn test_compare_versions_multi_digit() {
        assert_eq!(compare_versions("1.9.0", "1.10.0"), Ordering::Less);
        assert_eq!(compare_versions("10.0.0", "9.0.0"), Ordering::Greater);
    }

    #[test]
    fn test_compare_versions_prerelease() {
        assert_eq!(compare_versions("1.0.0-alpha", "1.0.0-beta"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0-rc.1", "1.0.0"), Ordering::Less);
    }

    #[test]
    fn test_compare_versions_partial_fallback() {
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("v2", "1.9"), Ordering::Greater);
    }

    #[test]
    fn test_is_prerelease_version() {
        assert!(is_prerelease_version("19.3.0-canary-52684925-20251110"));
        assert!(is_prerelease_version("6.0.0-beta.1"));
        assert!(!is_prerelease_version("5.9.0"));
        assert!(!is_prerelease_version("v5.9.0"));
    }

    #[test]
    fn test_serde_round_trip_shape() {
        let info = PackageVersions::new("lodash", ["4.17.21"]).with_latest("4.17.21");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["latest"], "4.17.21");
        assert_eq!(json["versions"][0], "4.17.21");
    }
}
