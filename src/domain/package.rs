//! Workspace packages and their references into catalogs

use super::catalog::{validate_package_name, DEFAULT_CATALOG};
use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Version prefix marking a dependency as pinned by a catalog
pub const CATALOG_PROTOCOL: &str = "catalog:";

/// Dependency section of a package manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DependencyType {
    Dependencies,
    DevDependencies,
    PeerDependencies,
    OptionalDependencies,
}

impl DependencyType {
    /// All sections in manifest order
    pub const ALL: [DependencyType; 4] = [
        DependencyType::Dependencies,
        DependencyType::DevDependencies,
        DependencyType::PeerDependencies,
        DependencyType::OptionalDependencies,
    ];

    /// Manifest key of the section
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::Dependencies => "dependencies",
            DependencyType::DevDependencies => "devDependencies",
            DependencyType::PeerDependencies => "peerDependencies",
            DependencyType::OptionalDependencies => "optionalDependencies",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Catalog name a declared version points at, if it is a catalog pointer.
///
/// `catalog:` and `catalog:default` both resolve to the default catalog.
pub fn catalog_pointer(version: &str) -> Option<&str> {
    let name = version.trim().strip_prefix(CATALOG_PROTOCOL)?.trim();
    if name.is_empty() {
        Some(DEFAULT_CATALOG)
    } else {
        Some(name)
    }
}

/// A dependency whose version is taken from a catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogReference {
    /// Catalog the version comes from
    pub catalog: String,
    /// Dependency package name
    pub package: String,
    /// Section the dependency is declared in
    pub dependency_type: DependencyType,
}

/// A workspace package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    id: String,
    name: String,
    path: String,
    dependencies: BTreeMap<DependencyType, BTreeMap<String, String>>,
}

impl Package {
    /// Create a package without dependencies; the id defaults to the name
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Result<Self, CatalogError> {
        let name = name.into();
        validate_package_name(&name)?;
        Ok(Self {
            id: name.clone(),
            name,
            path: path.into(),
            dependencies: BTreeMap::new(),
        })
    }

    /// Replace the identity
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Declare a dependency (builder pattern)
    pub fn with_dependency(
        mut self,
        dependency_type: DependencyType,
        name: &str,
        version: &str,
    ) -> Result<Self, CatalogError> {
        self.add_dependency(dependency_type, name, version)?;
        Ok(self)
    }

    /// Declare a dependency
    pub fn add_dependency(
        &mut self,
        dependency_type: DependencyType,
        name: &str,
        version: &str,
    ) -> Result<(), CatalogError> {
        validate_package_name(name)?;
        self.dependencies
            .entry(dependency_type)
            .or_default()
            .insert(name.to_string(), version.trim().to_string());
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory of the package inside the workspace
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Dependencies declared in one section
    pub fn dependencies_of(
        &self,
        dependency_type: DependencyType,
    ) -> impl Iterator<Item = (&str, &str)> {
        self.dependencies
            .get(&dependency_type)
            .into_iter()
            .flat_map(|deps| deps.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Total number of declared dependencies
    pub fn dependency_count(&self) -> usize {
        self.dependencies.values().map(BTreeMap::len).sum()
    }

    /// Every dependency whose version is a catalog pointer
    pub fn catalog_references(&self) -> Vec<CatalogReference> {
        DependencyType::ALL
            .iter()
            .flat_map(|&dependency_type| {
                self.dependencies_of(dependency_type)
                    .filter_map(move |(package, version)| {
                        catalog_pointer(version).map(|catalog| CatalogReference {
                            catalog: catalog.to_string(),
                            package: package.to_string(),
                            dependency_type,
                        })
                    })
            })
            .collect()
    }
}
