//! Update planning for catalog pins
//!
//! This module provides:
//! - Update filter configuration from CLI args and config
//! - Published version lists from the registry
//! - The planner that turns catalogs + version lists into an UpdatePlan

mod filter;
mod version_info;

pub use filter::{UpdateFilter, UpdateTarget};
pub use version_info::{compare_versions, is_prerelease_version, PackageVersions};

use crate::domain::{PlannedUpdate, SkipReason, SkippedUpdate, UpdatePlan, VersionRange, Workspace};
use crate::error::RegistryError;
use semver::Version;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Registry lookup outcome per package name
pub type VersionLookup = HashMap<String, Result<PackageVersions, RegistryError>>;

/// Decides, per catalog pin, whether to propose an update and to what
pub struct UpdatePlanner {
    /// Filter configuration
    filter: UpdateFilter,
}

impl UpdatePlanner {
    /// Create a new UpdatePlanner with the given filter
    pub fn new(filter: UpdateFilter) -> Self {
        Self { filter }
    }

    /// Filter in use
    pub fn filter(&self) -> &UpdateFilter {
        &self.filter
    }

    /// Check if a pin should be considered at all.
    /// Returns Some(SkipReason) if it should be skipped, None otherwise.
    pub fn should_skip(&self, package: &str, range: &VersionRange) -> Option<SkipReason> {
        if let Some(reason) = self.filter.skip_reason(package) {
            return Some(reason);
        }
        if range.is_wildcard() {
            return Some(SkipReason::Wildcard);
        }
        None
    }

    /// Package names that need a registry lookup, sorted and deduplicated
    pub fn packages_to_fetch(&self, workspace: &Workspace) -> Vec<String> {
        let names: BTreeSet<String> = workspace
            .catalogs()
            .flat_map(|catalog| catalog.dependencies())
            .filter(|(package, range)| self.should_skip(package, range).is_none())
            .map(|(package, _)| package.to_string())
            .collect();
        names.into_iter().collect()
    }

    /// Pick the version to move a pin to
    pub fn judge(
        &self,
        package: &str,
        range: &VersionRange,
        available: &PackageVersions,
    ) -> Result<Version, SkipReason> {
        if let Some(reason) = self.should_skip(package, range) {
            return Err(reason);
        }

        let current = range
            .base_version()
            .ok_or_else(|| SkipReason::Unparseable(range.raw().to_string()))?;

        let versions = available.sorted_versions();
        if versions.is_empty() {
            return Err(SkipReason::FetchFailed("no versions available".to_string()));
        }

        // Prereleases only when the pin is already on one or they were asked for
        let allow_prerelease = !current.pre.is_empty() || self.filter.include_prerelease;
        // Without prereleases, never go past the `latest` dist-tag
        let ceiling = if allow_prerelease {
            None
        } else {
            available.latest.as_deref().and_then(crate::domain::parse_version)
        };

        let best = versions
            .into_iter()
            .filter(|v| allow_prerelease || v.pre.is_empty())
            .filter(|v| ceiling.as_ref().map_or(true, |c| v <= c))
            .filter(|v| self.filter.target.allows(&current, v))
            .max()
            .ok_or(SkipReason::NoSuitableVersion)?;

        // Equal or older means nothing to do; never downgrade
        if best <= current {
            return Err(SkipReason::AlreadyLatest);
        }
        Ok(best)
    }

    /// Build the plan for every pin of every catalog
    pub fn plan(&self, workspace: &Workspace, lookup: &VersionLookup) -> UpdatePlan {
        let mut updates = Vec::new();
        let mut skipped = Vec::new();

        for catalog in workspace.catalogs() {
            for (package, range) in catalog.dependencies() {
                let outcome = match self.should_skip(package, range) {
                    Some(reason) => Err(reason),
                    None => match lookup.get(package) {
                        Some(Ok(available)) => self.judge(package, range, available),
                        Some(Err(e)) => Err(SkipReason::FetchFailed(e.to_string())),
                        None => Err(SkipReason::FetchFailed("not looked up".to_string())),
                    },
                };

                match outcome {
                    Ok(new_version) => {
                        let current = range
                            .base_version()
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| range.raw().to_string());
                        let new_version = new_version.to_string();
                        updates.push(
                            PlannedUpdate::new(package, catalog.name(), current, new_version.clone())
                                .with_ranges(range.raw(), range.format_updated(&new_version))
                                .with_affected_packages(
                                    workspace.packages_using(catalog.name(), package),
                                )
                                .with_security(self.filter.is_security_flagged(package)),
                        );
                    }
                    Err(reason) => {
                        debug!(package, catalog = catalog.name(), %reason, "skipping catalog entry");
                        skipped.push(SkippedUpdate {
                            package: package.to_string(),
                            catalog: catalog.name().to_string(),
                            current_range: range.raw().to_string(),
                            reason,
                        });
                    }
                }
            }
        }

        UpdatePlan::new(updates, skipped)
    }
}
