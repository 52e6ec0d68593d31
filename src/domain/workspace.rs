//! A validated workspace snapshot: catalogs plus the packages that use them

use super::{Catalog, Package};
use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Workspace metadata exchanged with providers and analysis backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceInfo {
    /// Workspace name
    pub name: String,
    /// Workspace root path
    pub path: String,
    /// Number of packages in the workspace
    pub package_count: usize,
    /// Number of catalogs in the workspace
    pub catalog_count: usize,
}

/// Catalogs and packages of one workspace.
///
/// Construction guarantees catalog names are unique and every catalog
/// reference in a package resolves to a known catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    name: String,
    path: String,
    catalogs: BTreeMap<String, Catalog>,
    packages: Vec<Package>,
}

impl Workspace {
    /// Validate and assemble a workspace
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        catalogs: Vec<Catalog>,
        packages: Vec<Package>,
    ) -> Result<Self, CatalogError> {
        let mut by_name = BTreeMap::new();
        for catalog in catalogs {
            let name = catalog.name().to_string();
            if by_name.insert(name.clone(), catalog).is_some() {
                return Err(CatalogError::DuplicateCatalog { name });
            }
        }

        for package in &packages {
            for reference in package.catalog_references() {
                if !by_name.contains_key(&reference.catalog) {
                    return Err(CatalogError::UnknownCatalog {
                        package: package.name().to_string(),
                        catalog: reference.catalog,
                    });
                }
            }
        }

        Ok(Self {
            name: name.into(),
            path: path.into(),
            catalogs: by_name,
            packages,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Summary metadata
    pub fn info(&self) -> WorkspaceInfo {
        WorkspaceInfo {
            name: self.name.clone(),
            path: self.path.clone(),
            package_count: self.packages.len(),
            catalog_count: self.catalogs.len(),
        }
    }

    /// Catalogs in name order
    pub fn catalogs(&self) -> impl Iterator<Item = &Catalog> {
        self.catalogs.values()
    }

    /// Catalog by name
    pub fn catalog(&self, name: &str) -> Option<&Catalog> {
        self.catalogs.get(name)
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Names of the packages that take `package` from `catalog`
    pub fn packages_using(&self, catalog: &str, package: &str) -> Vec<String> {
        let mut users: Vec<String> = self
            .packages
            .iter()
            .filter(|p| {
                p.catalog_references()
                    .iter()
                    .any(|r| r.catalog == catalog && r.package == package)
            })
            .map(|p| p.name().to_string())
            .collect();
        users.sort();
        users.dedup();
        users
    }

    /// Every catalog warning, prefixed with the catalog name
    pub fn warnings(&self) -> Vec<String> {
        self.catalogs
            .values()
            .flat_map(|catalog| {
                catalog
                    .warnings()
                    .into_iter()
                    .map(move |w| format!("[{}] {}", catalog.name(), w))
            })
            .collect()
    }
}
