//! Catalogs: named sets of shared dependency version pins

use super::VersionRange;
use crate::error::CatalogError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Name of the catalog a bare `catalog:` pointer resolves to
pub const DEFAULT_CATALOG: &str = "default";

/// Longest package name the npm registry accepts
const MAX_PACKAGE_NAME_LENGTH: usize = 214;

static PACKAGE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:@[a-z0-9\-*~][a-z0-9\-*._~]*/)?[a-z0-9\-~][a-z0-9\-._~]*$").unwrap()
});

/// How a catalog is meant to be applied when dependencies are added
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogMode {
    /// Catalog versions are used only when referenced explicitly
    #[default]
    Manual,
    /// Only catalog versions are allowed
    Strict,
    /// Catalog versions are preferred when compatible
    Prefer,
}

impl fmt::Display for CatalogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogMode::Manual => write!(f, "manual"),
            CatalogMode::Strict => write!(f, "strict"),
            CatalogMode::Prefer => write!(f, "prefer"),
        }
    }
}

/// Result of checking catalog entries without constructing a catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogValidation {
    /// Entries that make the catalog invalid
    pub errors: Vec<CatalogError>,
    /// Legal but risky entries
    pub warnings: Vec<String>,
}

impl CatalogValidation {
    /// True when there are no errors
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check that `name` is a syntactically valid npm package name
pub fn validate_package_name(name: &str) -> Result<(), CatalogError> {
    if name.is_empty() {
        return Err(CatalogError::invalid_package_name(name, "name is empty"));
    }
    if name.len() > MAX_PACKAGE_NAME_LENGTH {
        return Err(CatalogError::invalid_package_name(
            name,
            format!("name is longer than {} characters", MAX_PACKAGE_NAME_LENGTH),
        ));
    }
    if name.trim() != name {
        return Err(CatalogError::invalid_package_name(
            name,
            "name has leading or trailing whitespace",
        ));
    }
    if name.starts_with('.') || name.starts_with('_') {
        return Err(CatalogError::invalid_package_name(
            name,
            "name cannot start with '.' or '_'",
        ));
    }
    if name.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(CatalogError::invalid_package_name(
            name,
            "name cannot contain uppercase letters",
        ));
    }
    if !PACKAGE_NAME_RE.is_match(name) {
        return Err(CatalogError::invalid_package_name(
            name,
            "name contains characters that are not URL-safe",
        ));
    }
    Ok(())
}

/// A named set of package → version range pins.
///
/// Every stored range has been parsed; a `Catalog` cannot hold an invalid
/// package name or range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    id: String,
    name: String,
    mode: CatalogMode,
    dependencies: BTreeMap<String, VersionRange>,
}

impl Catalog {
    /// Build a catalog, failing on the first invalid name or range
    pub fn new<I, K, V>(
        name: impl Into<String>,
        mode: CatalogMode,
        dependencies: I,
    ) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let name = name.into();
        let mut parsed = BTreeMap::new();
        for (package, range) in dependencies {
            let package = package.into();
            validate_package_name(&package)?;
            let range = VersionRange::parse(range.as_ref())?;
            parsed.insert(package, range);
        }

        Ok(Self {
            id: name.clone(),
            name,
            mode,
            dependencies: parsed,
        })
    }

    /// Build the default catalog
    pub fn default_catalog<I, K, V>(dependencies: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        Self::new(DEFAULT_CATALOG, CatalogMode::default(), dependencies)
    }

    /// Replace the identity (defaults to the name)
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Check entries, collecting every error and warning
    pub fn check<'a, I>(dependencies: I) -> CatalogValidation
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut validation = CatalogValidation::default();
        let mut count = 0;
        for (package, range) in dependencies {
            count += 1;
            if let Err(e) = validate_package_name(package) {
                validation.errors.push(e);
            }
            match VersionRange::parse(range) {
                Ok(parsed) if parsed.is_wildcard() => validation
                    .warnings
                    .push(wildcard_warning(package, parsed.raw())),
                Ok(_) => {}
                Err(e) => validation.errors.push(e),
            }
        }
        if count == 0 {
            validation.warnings.push("catalog has no dependencies".to_string());
        }
        validation
    }

    /// Identity
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Catalog name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Catalog mode
    pub fn mode(&self) -> CatalogMode {
        self.mode
    }

    /// True for the catalog a bare `catalog:` pointer resolves to
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_CATALOG
    }

    /// Pinned dependencies in name order
    pub fn dependencies(&self) -> impl Iterator<Item = (&str, &VersionRange)> {
        self.dependencies.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of pinned dependencies
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// True when nothing is pinned
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Range pinned for `package`
    pub fn get_dependency_version(&self, package: &str) -> Option<&VersionRange> {
        self.dependencies.get(package)
    }

    /// Add a new pin
    pub fn add_dependency(&mut self, package: &str, range: &str) -> Result<(), CatalogError> {
        validate_package_name(package)?;
        let range = VersionRange::parse(range)?;
        self.dependencies.insert(package.to_string(), range);
        Ok(())
    }

    /// Replace the range of an existing pin
    pub fn update_dependency_version(
        &mut self,
        package: &str,
        range: &str,
    ) -> Result<(), CatalogError> {
        let range = VersionRange::parse(range)?;
        match self.dependencies.get_mut(package) {
            Some(slot) => {
                *slot = range;
                Ok(())
            }
            None => Err(CatalogError::dependency_not_found(&self.name, package)),
        }
    }

    /// Remove a pin, returning its range
    pub fn remove_dependency(&mut self, package: &str) -> Result<VersionRange, CatalogError> {
        self.dependencies
            .remove(package)
            .ok_or_else(|| CatalogError::dependency_not_found(&self.name, package))
    }

    /// True when `version` satisfies the range pinned for `package`;
    /// false when the package is not pinned here
    pub fn is_compatible(&self, package: &str, version: &str) -> bool {
        self.dependencies
            .get(package)
            .is_some_and(|range| range.matches(version))
    }

    /// Legal but risky contents
    pub fn warnings(&self) -> Vec<String> {
        if self.dependencies.is_empty() {
            return vec![format!("catalog '{}' has no dependencies", self.name)];
        }
        self.dependencies
            .iter()
            .filter(|(_, range)| range.is_wildcard())
            .map(|(package, range)| wildcard_warning(package, range.raw()))
            .collect()
    }
}

fn wildcard_warning(package: &str, range: &str) -> String {
    format!("'{}' accepts any version ('{}')", package, range)
}
