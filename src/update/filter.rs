//! Update filter configuration
//!
//! This module provides the UpdateFilter struct that encapsulates
//! all filter options for planning catalog updates.

use crate::domain::SkipReason;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How far an update may move from the current version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateTarget {
    /// Any newer version
    #[default]
    Latest,
    /// Stay on the current major
    Minor,
    /// Stay on the current major.minor
    Patch,
}

impl UpdateTarget {
    /// True when moving from `current` to `candidate` stays within the target
    pub fn allows(&self, current: &Version, candidate: &Version) -> bool {
        match self {
            UpdateTarget::Latest => true,
            UpdateTarget::Minor => candidate.major == current.major,
            UpdateTarget::Patch => {
                candidate.major == current.major && candidate.minor == current.minor
            }
        }
    }
}

impl fmt::Display for UpdateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateTarget::Latest => write!(f, "latest"),
            UpdateTarget::Minor => write!(f, "minor"),
            UpdateTarget::Patch => write!(f, "patch"),
        }
    }
}

impl FromStr for UpdateTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "latest" => Ok(UpdateTarget::Latest),
            "minor" => Ok(UpdateTarget::Minor),
            "patch" => Ok(UpdateTarget::Patch),
            other => Err(format!(
                "unknown update target '{}' (expected latest, minor or patch)",
                other
            )),
        }
    }
}

/// Filter configuration for update planning
#[derive(Debug, Clone, Default)]
pub struct UpdateFilter {
    /// How far updates may go
    pub target: UpdateTarget,
    /// Packages to exclude from updates
    pub exclude: Vec<String>,
    /// If non-empty, only update these packages
    pub only: Vec<String>,
    /// Consider prerelease versions even when the current version is stable
    pub include_prerelease: bool,
    /// Packages with a known security advisory against the current version
    pub security: Vec<String>,
}

impl UpdateFilter {
    /// Create a new UpdateFilter with default settings (process all)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the update target
    pub fn with_target(mut self, target: UpdateTarget) -> Self {
        self.target = target;
        self
    }

    /// Set packages to exclude
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Set packages to include (only list)
    pub fn with_only(mut self, only: Vec<String>) -> Self {
        self.only = only;
        self
    }

    /// Set whether prereleases are considered
    pub fn with_include_prerelease(mut self, include: bool) -> Self {
        self.include_prerelease = include;
        self
    }

    /// Set packages flagged by a security advisory
    pub fn with_security(mut self, security: Vec<String>) -> Self {
        self.security = security;
        self
    }

    /// Check if a package should be processed based on filters
    pub fn should_process_package(&self, name: &str) -> bool {
        // If --only is specified, only process those packages
        if !self.only.is_empty() {
            return self.only.iter().any(|p| p == name);
        }
        !self.exclude.iter().any(|p| p == name)
    }

    /// Reason to leave a package out of the plan, if any
    pub fn skip_reason(&self, name: &str) -> Option<SkipReason> {
        if self.should_process_package(name) {
            None
        } else if !self.only.is_empty() {
            Some(SkipReason::NotInOnlyList)
        } else {
            Some(SkipReason::Excluded)
        }
    }

    /// True when the package carries a security advisory
    pub fn is_security_flagged(&self, name: &str) -> bool {
        self.security.iter().any(|p| p == name)
    }
}
