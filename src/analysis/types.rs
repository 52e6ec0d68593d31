//! Analysis request and verdict types

use crate::domain::{DependencyType, UpdateType, VersionConflict, WorkspaceInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of question asked about a batch of updates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    /// What breaks if these updates land
    #[default]
    Impact,
    /// Known vulnerabilities fixed or introduced
    Security,
    /// Compatibility with the rest of the workspace
    Compatibility,
    /// Which updates to take
    Recommend,
}

impl AnalysisType {
    /// Every analysis type
    pub const ALL: [AnalysisType; 4] = [
        AnalysisType::Impact,
        AnalysisType::Security,
        AnalysisType::Compatibility,
        AnalysisType::Recommend,
    ];

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Impact => "impact",
            AnalysisType::Security => "security",
            AnalysisType::Compatibility => "compatibility",
            AnalysisType::Recommend => "recommend",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unknown analysis type '{}' (expected impact, security, compatibility or recommend)",
                    s
                )
            })
    }
}

/// What to do with one proposed update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Update,
    Skip,
    Review,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Update => write!(f, "update"),
            Action::Skip => write!(f, "skip"),
            Action::Review => write!(f, "review"),
        }
    }
}

/// Risk of applying an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// One package in the batch under review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageUnderReview {
    pub name: String,
    pub current_version: String,
    pub target_version: String,
    pub dependency_type: DependencyType,
    pub catalog: String,
    /// Classification of the move from current to target
    #[serde(default = "unknown_update_type")]
    pub update_type: UpdateType,
    /// A security advisory is known against the current version
    #[serde(default)]
    pub security_flagged: bool,
}

fn unknown_update_type() -> UpdateType {
    UpdateType::Unknown
}

impl PackageUnderReview {
    /// Review entry for a catalog dependency
    pub fn new(
        name: impl Into<String>,
        current_version: impl Into<String>,
        target_version: impl Into<String>,
        catalog: impl Into<String>,
    ) -> Self {
        let current_version = current_version.into();
        let target_version = target_version.into();
        Self {
            name: name.into(),
            update_type: crate::domain::classify_update(&current_version, &target_version),
            current_version,
            target_version,
            dependency_type: DependencyType::Dependencies,
            catalog: catalog.into(),
            security_flagged: false,
        }
    }

    /// Set the dependency type (builder pattern)
    pub fn with_dependency_type(mut self, dependency_type: DependencyType) -> Self {
        self.dependency_type = dependency_type;
        self
    }

    /// Flag a known advisory (builder pattern)
    pub fn with_security_flag(mut self, flagged: bool) -> Self {
        self.security_flagged = flagged;
        self
    }

    /// `name@current→target`, the form used in cache keys and prompts
    pub fn fingerprint(&self) -> String {
        format!("{}@{}→{}", self.name, self.current_version, self.target_version)
    }
}

/// Input of one analysis call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    pub analysis_type: AnalysisType,
    pub packages: Vec<PackageUnderReview>,
    pub workspace: WorkspaceInfo,
    /// Free-form options passed through to the backend prompt
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Cross-catalog conflicts, as extra risk context
    #[serde(default)]
    pub conflicts: Vec<VersionConflict>,
}

impl AnalysisContext {
    /// Context with no options or conflicts
    pub fn new(
        analysis_type: AnalysisType,
        packages: Vec<PackageUnderReview>,
        workspace: WorkspaceInfo,
    ) -> Self {
        Self {
            analysis_type,
            packages,
            workspace,
            options: BTreeMap::new(),
            conflicts: Vec::new(),
        }
    }

    /// Add an option (builder pattern)
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Attach conflicts (builder pattern)
    pub fn with_conflicts(mut self, conflicts: Vec<VersionConflict>) -> Self {
        self.conflicts = conflicts;
        self
    }

    /// Same request restricted to `packages`
    pub fn with_packages(&self, packages: Vec<PackageUnderReview>) -> Self {
        Self {
            packages,
            ..self.clone()
        }
    }

    /// True when `package` is part of a known conflict
    pub fn is_conflicting(&self, package: &str) -> bool {
        self.conflicts.iter().any(|c| c.package_name == package)
    }
}

/// Verdict for one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub package: String,
    pub action: Action,
    pub risk_level: RiskLevel,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breaking_changes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_fixes: Vec<String>,
}

impl Recommendation {
    pub fn new(
        package: impl Into<String>,
        action: Action,
        risk_level: RiskLevel,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            action,
            risk_level,
            reason: reason.into(),
            breaking_changes: Vec::new(),
            security_fixes: Vec::new(),
        }
    }
}

/// Verdict of one backend call, or of a merge of chunk verdicts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub backend: String,
    pub analysis_type: AnalysisType,
    /// Trust in the verdict, in `[0, 1]`
    pub confidence: f64,
    pub summary: String,
    pub recommendations: Vec<Recommendation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
    /// Built from a response that could not be understood; never cached
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl AnalysisResult {
    /// True when any package is flagged critical
    pub fn has_critical(&self) -> bool {
        self.recommendations
            .iter()
            .any(|r| r.risk_level == RiskLevel::Critical)
    }

    /// Recommendation for `package`, if any
    pub fn recommendation_for(&self, package: &str) -> Option<&Recommendation> {
        self.recommendations.iter().find(|r| r.package == package)
    }

    /// True when any recommendation concerns one of `packages`
    pub fn mentions_any(&self, packages: &[String]) -> bool {
        self.recommendations
            .iter()
            .any(|r| packages.iter().any(|p| *p == r.package))
    }

    /// Merge chunk verdicts in submission order: recommendations
    /// concatenated, warnings unioned, confidence averaged, durations summed.
    pub fn merge(
        backend: impl Into<String>,
        analysis_type: AnalysisType,
        parts: Vec<AnalysisResult>,
        timestamp: DateTime<Utc>,
    ) -> AnalysisResult {
        let chunks = parts.len();
        let degraded = parts.iter().any(|p| p.degraded);
        let confidence = if chunks == 0 {
            0.0
        } else {
            parts.iter().map(|p| p.confidence).sum::<f64>() / chunks as f64
        };

        let mut recommendations = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut processing_time_ms = 0;
        let mut backends: Vec<String> = Vec::new();
        for part in parts {
            recommendations.extend(part.recommendations);
            for warning in part.warnings {
                if !warnings.contains(&warning) {
                    warnings.push(warning);
                }
            }
            if !backends.contains(&part.backend) {
                backends.push(part.backend);
            }
            processing_time_ms += part.processing_time_ms;
        }

        let updates = recommendations
            .iter()
            .filter(|r| r.action == Action::Update)
            .count();
        let reviews = recommendations
            .iter()
            .filter(|r| r.action == Action::Review)
            .count();
        let summary = format!(
            "{} analysis of {} packages in {} chunks: {} to update, {} to review, {} to skip",
            analysis_type,
            recommendations.len(),
            chunks,
            updates,
            reviews,
            recommendations.len() - updates - reviews,
        );

        let backend = backend.into();
        AnalysisResult {
            backend: if backends.len() > 1 {
                backends.join("+")
            } else {
                backends.pop().unwrap_or(backend)
            },
            analysis_type,
            confidence,
            summary,
            recommendations,
            warnings,
            timestamp,
            processing_time_ms,
            degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_result(backend: &str, confidence: f64, packages: &[&str], warning: &str) -> AnalysisResult {
        AnalysisResult {
            backend: backend.to_string(),
            analysis_type: AnalysisType::Impact,
            confidence,
            summary: String::new(),
            recommendations: packages
                .iter()
                .map(|p| Recommendation::new(*p, Action::Update, RiskLevel::Low, "ok"))
                .collect(),
            warnings: vec![warning.to_string()],
            timestamp: Utc::now(),
            processing_time_ms: 10,
            degraded: false,
        }
    }

    #[test]
    fn test_analysis_type_from_str() {
        assert_eq!("Security".parse::<AnalysisType>(), Ok(AnalysisType::Security));
        assert!("vibes".parse::<AnalysisType>().is_err());
        assert_eq!(AnalysisType::Compatibility.to_string(), "compatibility");
    }

    #[test]
    fn test_package_under_review_classifies() {
        let pkg = PackageUnderReview::new("lodash", "4.17.0", "5.0.0", "default");
        assert_eq!(pkg.update_type, UpdateType::Major);
        assert_eq!(pkg.fingerprint(), "lodash@4.17.0→5.0.0");
    }

    #[test]
    fn test_merge_concatenates_in_order() {
        let merged = AnalysisResult::merge(
            "claude",
            AnalysisType::Impact,
            vec![
                make_result("claude", 0.8, &["a", "b"], "w1"),
                make_result("claude", 0.4, &["c"], "w1"),
            ],
            Utc::now(),
        );
        let names: Vec<_> = merged.recommendations.iter().map(|r| r.package.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!((merged.confidence - 0.6).abs() < 1e-9);
        assert_eq!(merged.warnings, vec!["w1"]);
        assert_eq!(merged.processing_time_ms, 20);
        assert_eq!(merged.backend, "claude");
        assert!(merged.summary.contains("3 packages in 2 chunks"));
    }

    #[test]
    fn test_merge_names_mixed_backends() {
        let merged = AnalysisResult::merge(
            "claude",
            AnalysisType::Impact,
            vec![
                make_result("claude", 0.8, &["a"], "w1"),
                make_result("rules", 0.2, &["b"], "w2"),
            ],
            Utc::now(),
        );
        assert_eq!(merged.backend, "claude+rules");
        assert_eq!(merged.warnings.len(), 2);
    }

    #[test]
    fn test_result_json_shape() {
        let result = make_result("rules", 0.2, &["lodash"], "w");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["analysisType"], "impact");
        assert_eq!(json["recommendations"][0]["riskLevel"], "low");
        assert_eq!(json["processingTimeMs"], 10);
        assert!(json["recommendations"][0].get("breakingChanges").is_none());
    }
}
