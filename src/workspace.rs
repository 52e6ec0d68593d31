//! Workspace providers
//!
//! The core reads workspaces through [`WorkspaceProvider`]. The bundled
//! [`SnapshotProvider`] reads a JSON snapshot holding the catalogs, the
//! packages and, optionally, registry data and known security advisories, so
//! a run can be fully offline.
//!
//! ```json
//! {
//!   "name": "shop",
//!   "catalogs": {
//!     "default": { "dependencies": { "lodash": "^4.17.0" } },
//!     "legacy": { "mode": "strict", "dependencies": { "typescript": "~4.8.0" } }
//!   },
//!   "packages": [
//!     { "name": "web", "path": "packages/web", "dependencies": { "lodash": "catalog:" } }
//!   ],
//!   "registry": { "lodash": { "versions": ["4.17.21"], "latest": "4.17.21" } },
//!   "security": ["lodash"]
//! }
//! ```

use crate::cache::Cache;
use crate::domain::{Catalog, CatalogMode, DependencyType, Package, Workspace, WorkspaceInfo};
use crate::error::{AppError, IoError};
use crate::update::PackageVersions;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Source of workspace state
#[async_trait]
pub trait WorkspaceProvider: Send + Sync {
    /// Load and validate the workspace at `path`
    async fn load_workspace(&self, path: &Path) -> Result<LoadedWorkspace, AppError>;

    /// Summary metadata of the workspace at `path`
    async fn workspace_info(&self, path: &Path) -> Result<WorkspaceInfo, AppError>;
}

/// A validated workspace plus the extra data a snapshot may carry
#[derive(Debug, Clone)]
pub struct LoadedWorkspace {
    pub workspace: Workspace,
    /// Pre-fetched registry data; lookups for these packages stay offline
    pub registry: Vec<PackageVersions>,
    /// Packages with a known advisory against their current version
    pub security: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    catalogs: BTreeMap<String, SnapshotCatalog>,
    #[serde(default)]
    packages: Vec<SnapshotPackage>,
    #[serde(default)]
    registry: BTreeMap<String, SnapshotVersions>,
    #[serde(default)]
    security: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotCatalog {
    #[serde(default)]
    mode: CatalogMode,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotPackage {
    name: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    peer_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    optional_dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotVersions {
    versions: Vec<String>,
    #[serde(default)]
    latest: Option<String>,
}

impl SnapshotPackage {
    fn sections(&self) -> [(DependencyType, &BTreeMap<String, String>); 4] {
        [
            (DependencyType::Dependencies, &self.dependencies),
            (DependencyType::DevDependencies, &self.dev_dependencies),
            (DependencyType::PeerDependencies, &self.peer_dependencies),
            (DependencyType::OptionalDependencies, &self.optional_dependencies),
        ]
    }
}

impl Snapshot {
    fn into_loaded(self, default_path: &str) -> Result<LoadedWorkspace, AppError> {
        let catalogs = self
            .catalogs
            .into_iter()
            .map(|(name, catalog)| Catalog::new(name, catalog.mode, catalog.dependencies))
            .collect::<Result<Vec<_>, _>>()?;

        let mut packages = Vec::with_capacity(self.packages.len());
        for raw in &self.packages {
            let mut package = Package::new(&raw.name, &raw.path)?;
            for (dependency_type, deps) in raw.sections() {
                for (name, version) in deps {
                    package.add_dependency(dependency_type, name, version)?;
                }
            }
            packages.push(package);
        }

        let path = self.path.unwrap_or_else(|| default_path.to_string());
        let workspace = Workspace::new(self.name, path, catalogs, packages)?;
        let registry = self
            .registry
            .into_iter()
            .map(|(name, data)| {
                let versions = PackageVersions::new(name, data.versions);
                match data.latest {
                    Some(latest) => versions.with_latest(latest),
                    None => versions,
                }
            })
            .collect();

        Ok(LoadedWorkspace {
            workspace,
            registry,
            security: self.security,
        })
    }
}

/// Reads JSON workspace snapshots and memoizes their metadata
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    cache: Arc<Cache<WorkspaceInfo>>,
}

impl SnapshotProvider {
    pub fn new(cache: Arc<Cache<WorkspaceInfo>>) -> Self {
        Self { cache }
    }

    fn cache_key(path: &Path) -> String {
        path.display().to_string()
    }

    async fn read(&self, path: &Path) -> Result<LoadedWorkspace, AppError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                IoError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                IoError::Generic {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|e| IoError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let default_path = path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default()
            .display()
            .to_string();
        snapshot.into_loaded(&default_path)
    }
}

#[async_trait]
impl WorkspaceProvider for SnapshotProvider {
    async fn load_workspace(&self, path: &Path) -> Result<LoadedWorkspace, AppError> {
        let loaded = self.read(path).await?;
        self.cache
            .set(Self::cache_key(path), loaded.workspace.info(), None);
        Ok(loaded)
    }

    async fn workspace_info(&self, path: &Path) -> Result<WorkspaceInfo, AppError> {
        let key = Self::cache_key(path);
        if let Some(info) = self.cache.get(&key) {
            debug!(path = %key, "workspace info cache hit");
            return Ok(info);
        }
        Ok(self.load_workspace(path).await?.workspace.info())
    }
}
