//! Generic TTL cache and the named cache handles
//!
//! This module provides:
//! - `Cache<T>`: keyed, TTL-expiring, size-bounded store with optional disk persistence
//! - `Clock` abstraction so expiry can be driven deterministically
//! - `DiskStore`: per-namespace file layout (`index.json` + one file per key)
//! - `Caches`: the registry, workspace and analysis namespaces, constructed
//!   explicitly and passed to the services that need them

mod clock;
mod disk;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use disk::{CacheIndex, DiskStore, INDEX_FILE};
pub use store::{Cache, CacheConfig, CacheEntry, CacheStats, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};

use crate::analysis::AnalysisResult;
use crate::config::CacheSettings;
use crate::domain::WorkspaceInfo;
use crate::update::PackageVersions;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Namespace for registry version lookups
pub const REGISTRY_NAMESPACE: &str = "registry";
/// Namespace for workspace snapshots
pub const WORKSPACE_NAMESPACE: &str = "workspace";
/// Namespace for analysis verdicts
pub const ANALYSIS_NAMESPACE: &str = "analysis";

/// The three cache namespaces used by a run
#[derive(Debug, Clone)]
pub struct Caches {
    /// Registry version lists, keyed by package name
    pub registry: Arc<Cache<PackageVersions>>,
    /// Workspace metadata, keyed by workspace path
    pub workspace: Arc<Cache<WorkspaceInfo>>,
    /// Analysis verdicts, keyed by context fingerprint
    pub analysis: Arc<Cache<AnalysisResult>>,
}

/// Stats of all namespaces, for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachesStats {
    pub registry: CacheStats,
    pub workspace: CacheStats,
    pub analysis: CacheStats,
}

impl Caches {
    /// Build caches from settings. When caching is disabled the caches still
    /// work for the lifetime of the process, but nothing is read from or
    /// written to disk.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Build caches from settings on a custom clock
    pub fn with_clock(settings: &CacheSettings, clock: Arc<dyn Clock>) -> Self {
        let root = if settings.enabled {
            settings.resolved_dir()
        } else {
            None
        };

        let config = |namespace: &str, ttl_secs: u64| {
            let config = CacheConfig::new(namespace)
                .with_max_entries(settings.max_entries)
                .with_default_ttl(Duration::from_secs(ttl_secs));
            match &root {
                Some(root) => config.with_persist_dir(root.join(namespace)),
                None => config,
            }
        };

        Self {
            registry: Arc::new(Cache::with_clock(
                config(REGISTRY_NAMESPACE, settings.registry_ttl_secs),
                clock.clone(),
            )),
            workspace: Arc::new(Cache::with_clock(
                config(WORKSPACE_NAMESPACE, settings.workspace_ttl_secs),
                clock.clone(),
            )),
            analysis: Arc::new(Cache::with_clock(
                config(ANALYSIS_NAMESPACE, settings.default_ttl_secs),
                clock,
            )),
        }
    }

    /// Fresh memory-only caches with default capacity and TTLs
    pub fn in_memory() -> Self {
        let settings = CacheSettings {
            enabled: false,
            ..CacheSettings::default()
        };
        Self::from_settings(&settings)
    }

    /// Stats for every namespace
    pub fn stats(&self) -> CachesStats {
        CachesStats {
            registry: self.registry.stats(),
            workspace: self.workspace.stats(),
            analysis: self.analysis.stats(),
        }
    }

    /// Clear every namespace, on disk too
    pub fn clear_all(&self) {
        self.registry.clear();
        self.workspace.clear();
        self.analysis.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace_info(name: &str) -> WorkspaceInfo {
        WorkspaceInfo {
            name: name.to_string(),
            path: format!("/repo/{}", name),
            package_count: 3,
            catalog_count: 1,
        }
    }

    #[test]
    fn test_in_memory_caches_are_isolated() {
        let a = Caches::in_memory();
        let b = Caches::in_memory();
        a.workspace.set("/repo", workspace_info("repo"), None);
        assert!(a.workspace.has("/repo"));
        assert!(!b.workspace.has("/repo"));
    }

    #[test]
    fn test_namespaces_persist_in_separate_dirs() {
        let dir = TempDir::new().unwrap();
        let settings = CacheSettings {
            dir: Some(dir.path().to_path_buf()),
            ..CacheSettings::default()
        };
        let caches = Caches::from_settings(&settings);
        caches.workspace.set("/repo", workspace_info("repo"), None);

        assert!(dir.path().join(WORKSPACE_NAMESPACE).join(INDEX_FILE).exists());
        assert!(!dir.path().join(REGISTRY_NAMESPACE).join(INDEX_FILE).exists());

        let reopened = Caches::from_settings(&settings);
        assert_eq!(
            reopened.workspace.get("/repo").map(|info| info.name),
            Some("repo".to_string())
        );
    }

    #[test]
    fn test_disabled_cache_does_not_touch_disk() {
        let dir = TempDir::new().unwrap();
        let settings = CacheSettings {
            enabled: false,
            dir: Some(dir.path().to_path_buf()),
            ..CacheSettings::default()
        };
        let caches = Caches::from_settings(&settings);
        caches.workspace.set("/repo", workspace_info("repo"), None);
        assert!(!dir.path().join(WORKSPACE_NAMESPACE).exists());
    }

    #[test]
    fn test_clear_all_and_stats() {
        let caches = Caches::in_memory();
        caches.workspace.set("/repo", workspace_info("repo"), None);
        caches.workspace.get("/repo");
        caches.registry.get("lodash");

        let stats = caches.stats();
        assert_eq!(stats.workspace.hits, 1);
        assert_eq!(stats.registry.misses, 1);

        caches.clear_all();
        let stats = caches.stats();
        assert_eq!(stats.workspace.total_entries, 0);
        assert_eq!(stats.workspace.hits, 0);
    }
}
