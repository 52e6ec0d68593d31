//! Update plan: proposed catalog updates and cross-catalog conflicts

use super::version_range::parse_version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Size of a version change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Major,
    Minor,
    Patch,
    /// Either version is not a semantic version
    Unknown,
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateType::Major => write!(f, "major"),
            UpdateType::Minor => write!(f, "minor"),
            UpdateType::Patch => write!(f, "patch"),
            UpdateType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify the change from `current` to `candidate` by the first differing
/// semver component
pub fn classify_update(current: &str, candidate: &str) -> UpdateType {
    match (parse_version(current), parse_version(candidate)) {
        (Some(current), Some(candidate)) => {
            if current.major != candidate.major {
                UpdateType::Major
            } else if current.minor != candidate.minor {
                UpdateType::Minor
            } else {
                UpdateType::Patch
            }
        }
        _ => UpdateType::Unknown,
    }
}

/// Reason why a catalog entry is not part of the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Already at the newest acceptable version
    AlreadyLatest,
    /// Package was excluded via --exclude
    Excluded,
    /// Package not in --only list
    NotInOnlyList,
    /// No version satisfies the update target
    NoSuitableVersion,
    /// Registry lookup failed
    FetchFailed(String),
    /// The pinned range has no usable lower bound
    Unparseable(String),
    /// The range accepts any version
    Wildcard,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyLatest => write!(f, "already at latest"),
            SkipReason::Excluded => write!(f, "excluded by --exclude"),
            SkipReason::NotInOnlyList => write!(f, "not in --only list"),
            SkipReason::NoSuitableVersion => write!(f, "no suitable version"),
            SkipReason::FetchFailed(msg) => write!(f, "fetch failed: {}", msg),
            SkipReason::Unparseable(msg) => write!(f, "unparseable range: {}", msg),
            SkipReason::Wildcard => write!(f, "accepts any version"),
        }
    }
}

/// One proposed catalog update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedUpdate {
    /// Dependency package name
    pub package: String,
    /// Catalog holding the pin
    pub catalog: String,
    /// Lower bound of the current range
    pub current_version: String,
    /// Current range as written
    pub current_range: String,
    /// Proposed version
    pub new_version: String,
    /// Proposed range, in the style of the current one
    pub new_range: String,
    /// Size of the change
    pub update_type: UpdateType,
    /// Workspace packages that take this pin from the catalog
    #[serde(default)]
    pub affected_packages: Vec<String>,
    /// A security advisory is known for the current version
    #[serde(default)]
    pub is_security_update: bool,
}

impl PlannedUpdate {
    /// Create an update, classifying it from the two versions
    pub fn new(
        package: impl Into<String>,
        catalog: impl Into<String>,
        current_version: impl Into<String>,
        new_version: impl Into<String>,
    ) -> Self {
        let current_version = current_version.into();
        let new_version = new_version.into();
        Self {
            package: package.into(),
            catalog: catalog.into(),
            update_type: classify_update(&current_version, &new_version),
            current_range: current_version.clone(),
            new_range: new_version.clone(),
            current_version,
            new_version,
            affected_packages: Vec::new(),
            is_security_update: false,
        }
    }

    /// Set the current and proposed ranges
    pub fn with_ranges(mut self, current: impl Into<String>, new: impl Into<String>) -> Self {
        self.current_range = current.into();
        self.new_range = new.into();
        self
    }

    /// Set the packages that use this pin
    pub fn with_affected_packages(mut self, packages: Vec<String>) -> Self {
        self.affected_packages = packages;
        self
    }

    /// Flag as a security update
    pub fn with_security(mut self, is_security_update: bool) -> Self {
        self.is_security_update = is_security_update;
        self
    }
}

/// A catalog entry left out of the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedUpdate {
    pub package: String,
    pub catalog: String,
    pub current_range: String,
    pub reason: SkipReason,
}

/// One catalog's proposal in a conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictingVersion {
    pub catalog: String,
    pub version: String,
}

/// A package proposed at different versions in different catalogs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionConflict {
    pub package_name: String,
    /// Competing proposals in catalog order
    pub versions: Vec<ConflictingVersion>,
    pub recommendation: String,
}

/// Proposed updates for one run. Built once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlan {
    updates: Vec<PlannedUpdate>,
    skipped: Vec<SkippedUpdate>,
    conflicts: Vec<VersionConflict>,
    has_security_updates: bool,
    has_major_updates: bool,
    has_conflicts: bool,
}

impl UpdatePlan {
    /// Build a plan and detect conflicts between catalogs
    pub fn new(updates: Vec<PlannedUpdate>, skipped: Vec<SkippedUpdate>) -> Self {
        let conflicts = detect_conflicts(&updates);
        Self {
            has_security_updates: updates.iter().any(|u| u.is_security_update),
            has_major_updates: updates.iter().any(|u| u.update_type == UpdateType::Major),
            has_conflicts: !conflicts.is_empty(),
            updates,
            skipped,
            conflicts,
        }
    }

    /// Proposed updates in catalog/package order
    pub fn updates(&self) -> &[PlannedUpdate] {
        &self.updates
    }

    pub fn skipped(&self) -> &[SkippedUpdate] {
        &self.skipped
    }

    pub fn conflicts(&self) -> &[VersionConflict] {
        &self.conflicts
    }

    pub fn has_security_updates(&self) -> bool {
        self.has_security_updates
    }

    pub fn has_major_updates(&self) -> bool {
        self.has_major_updates
    }

    pub fn has_conflicts(&self) -> bool {
        self.has_conflicts
    }

    /// True when nothing is proposed
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Number of proposed updates of one type
    pub fn count_by_type(&self, update_type: UpdateType) -> usize {
        self.updates
            .iter()
            .filter(|u| u.update_type == update_type)
            .count()
    }
}

fn detect_conflicts(updates: &[PlannedUpdate]) -> Vec<VersionConflict> {
    let mut by_package: BTreeMap<&str, BTreeMap<&str, &str>> = BTreeMap::new();
    for update in updates {
        by_package
            .entry(update.package.as_str())
            .or_default()
            .insert(update.catalog.as_str(), update.new_version.as_str());
    }

    by_package
        .into_iter()
        .filter_map(|(package, proposals)| {
            let mut distinct: Vec<&str> = proposals.values().copied().collect();
            distinct.sort_unstable();
            distinct.dedup();
            if distinct.len() < 2 {
                return None;
            }

            let highest = distinct
                .iter()
                .copied()
                .max_by(|a, b| match (parse_version(a), parse_version(b)) {
                    (Some(a), Some(b)) => a.cmp(&b),
                    _ => a.cmp(b),
                })
                .unwrap_or_default();
            let catalogs: Vec<&str> = proposals.keys().copied().collect();

            Some(VersionConflict {
                package_name: package.to_string(),
                versions: proposals
                    .iter()
                    .map(|(catalog, version)| ConflictingVersion {
                        catalog: catalog.to_string(),
                        version: version.to_string(),
                    })
                    .collect(),
                recommendation: format!(
                    "align '{}' on a single version across catalogs {} (highest proposed: {})",
                    package,
                    catalogs.join(", "),
                    highest
                ),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_update() {
        assert_eq!(classify_update("4.17.0", "4.17.21"), UpdateType::Patch);
        assert_eq!(classify_update("4.17.0", "4.18.0"), UpdateType::Minor);
        assert_eq!(classify_update("4.17.0", "5.0.0"), UpdateType::Major);
        assert_eq!(classify_update("v1.0.0", "1.0.1"), UpdateType::Patch);
        assert_eq!(classify_update("1.0.0-beta.1", "1.0.0"), UpdateType::Patch);
        assert_eq!(classify_update("latest", "1.0.0"), UpdateType::Unknown);
        assert_eq!(classify_update("1.0", "2.0.0"), UpdateType::Unknown);
    }

    #[test]
    fn test_planned_update_defaults() {
        let update = PlannedUpdate::new("lodash", "default", "4.17.0", "5.0.0");
        assert_eq!(update.update_type, UpdateType::Major);
        assert_eq!(update.new_range, "5.0.0");
        assert!(!update.is_security_update);

        let update = update.with_ranges("^4.17.0", "^5.0.0").with_security(true);
        assert_eq!(update.current_range, "^4.17.0");
        assert_eq!(update.new_range, "^5.0.0");
        assert!(update.is_security_update);
    }

    #[test]
    fn test_plan_flags() {
        let plan = UpdatePlan::new(
            vec![
                PlannedUpdate::new("lodash", "default", "4.17.0", "4.17.21"),
                PlannedUpdate::new("react", "default", "17.0.2", "18.2.0").with_security(true),
            ],
            vec![],
        );
        assert!(plan.has_major_updates());
        assert!(plan.has_security_updates());
        assert!(!plan.has_conflicts());
        assert_eq!(plan.count_by_type(UpdateType::Patch), 1);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_conflict_between_catalogs() {
        let plan = UpdatePlan::new(
            vec![
                PlannedUpdate::new("typescript", "default", "4.8.0", "5.0.0"),
                PlannedUpdate::new("typescript", "legacy", "4.8.0", "4.9.0"),
                PlannedUpdate::new("lodash", "default", "4.17.0", "4.17.21"),
            ],
            vec![],
        );

        assert!(plan.has_conflicts());
        assert_eq!(plan.conflicts().len(), 1);
        let conflict = &plan.conflicts()[0];
        assert_eq!(conflict.package_name, "typescript");
        let versions: Vec<&str> = conflict.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(versions, vec!["5.0.0", "4.9.0"]);
        assert!(conflict.recommendation.contains("5.0.0"));
    }

    #[test]
    fn test_same_version_in_two_catalogs_is_not_a_conflict() {
        let plan = UpdatePlan::new(
            vec![
                PlannedUpdate::new("react", "default", "18.0.0", "18.2.0"),
                PlannedUpdate::new("react", "web", "18.1.0", "18.2.0"),
            ],
            vec![],
        );
        assert!(!plan.has_conflicts());
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::AlreadyLatest.to_string(), "already at latest");
        assert_eq!(
            SkipReason::FetchFailed("timeout".to_string()).to_string(),
            "fetch failed: timeout"
        );
    }
}
