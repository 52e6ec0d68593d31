//! Deterministic rule engine used when no backend can answer

use super::backend::{AnalysisBackend, BackendInfo};
use super::types::{
    Action, AnalysisContext, AnalysisResult, AnalysisType, PackageUnderReview, Recommendation,
    RiskLevel,
};
use crate::domain::UpdateType;
use crate::error::AnalysisError;
use async_trait::async_trait;
use chrono::Utc;

/// Name of the rule engine in results
pub const RULE_ENGINE_NAME: &str = "rules";

/// Confidence of every rule-engine verdict
pub const RULE_ENGINE_CONFIDENCE: f64 = 0.2;

/// Verdicts at or below this confidence are flagged as low trust
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.2;

/// True for verdicts that should not be trusted without review
pub fn is_low_confidence(confidence: f64) -> bool {
    confidence <= LOW_CONFIDENCE_THRESHOLD
}

/// Always-available backend deriving verdicts from update type and
/// security flags alone
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Verdict for one package
    pub fn recommend(&self, pkg: &PackageUnderReview, conflicting: bool) -> Recommendation {
        let (action, risk, reason) = if pkg.security_flagged {
            (
                Action::Update,
                RiskLevel::Critical,
                "known security advisory against the current version".to_string(),
            )
        } else {
            match pkg.update_type {
                UpdateType::Major => (
                    Action::Review,
                    RiskLevel::Medium,
                    format!(
                        "major update {} -> {} may contain breaking changes",
                        pkg.current_version, pkg.target_version
                    ),
                ),
                UpdateType::Minor => (
                    Action::Update,
                    RiskLevel::Low,
                    "minor update, backwards compatible by convention".to_string(),
                ),
                UpdateType::Patch => (
                    Action::Update,
                    RiskLevel::Low,
                    "patch update, bug fixes only by convention".to_string(),
                ),
                UpdateType::Unknown => (
                    Action::Review,
                    RiskLevel::High,
                    "version scheme not understood, change size unknown".to_string(),
                ),
            }
        };

        let mut recommendation = Recommendation::new(&pkg.name, action, risk, reason);
        if conflicting {
            recommendation.reason.push_str("; proposed at different versions across catalogs");
        }
        if pkg.update_type == UpdateType::Major {
            recommendation
                .breaking_changes
                .push(format!("major version bump to {}", pkg.target_version));
        }
        recommendation
    }

    /// Hold a backend verdict to the rules it must not break: security-flagged
    /// packages stay at high risk or above and are never skipped, and every
    /// package under review gets a recommendation. Each override adds a
    /// warning.
    pub fn reconcile(&self, result: &mut AnalysisResult, context: &AnalysisContext) {
        for pkg in &context.packages {
            let Some(index) = result
                .recommendations
                .iter()
                .position(|r| r.package == pkg.name)
            else {
                result
                    .recommendations
                    .push(self.recommend(pkg, context.is_conflicting(&pkg.name)));
                result.warnings.push(format!(
                    "{} gave no verdict for '{}'; using update-type rules",
                    result.backend, pkg.name
                ));
                continue;
            };

            if !pkg.security_flagged {
                continue;
            }
            let recommendation = &mut result.recommendations[index];
            let mut raised = false;
            if recommendation.risk_level < RiskLevel::High {
                recommendation.risk_level = RiskLevel::Critical;
                raised = true;
            }
            if recommendation.action == Action::Skip {
                recommendation.action = Action::Review;
                raised = true;
            }
            if raised {
                result.warnings.push(format!(
                    "{} underrated security-flagged '{}'; raised to {} risk, action {}",
                    result.backend, pkg.name, recommendation.risk_level, recommendation.action
                ));
            }
        }
    }

    /// Verdict for a whole context. Never fails.
    pub fn evaluate(&self, context: &AnalysisContext) -> AnalysisResult {
        let started = std::time::Instant::now();
        let recommendations: Vec<Recommendation> = context
            .packages
            .iter()
            .map(|pkg| self.recommend(pkg, context.is_conflicting(&pkg.name)))
            .collect();

        let mut warnings = vec![
            "no analysis backend answered; verdicts come from update-type rules".to_string(),
        ];
        for conflict in &context.conflicts {
            warnings.push(format!(
                "'{}' is proposed at different versions across catalogs",
                conflict.package_name
            ));
        }

        let reviews = recommendations
            .iter()
            .filter(|r| r.action == Action::Review)
            .count();
        AnalysisResult {
            backend: RULE_ENGINE_NAME.to_string(),
            analysis_type: context.analysis_type,
            confidence: RULE_ENGINE_CONFIDENCE,
            summary: format!(
                "rule-based {} analysis of {} packages: {} need review",
                context.analysis_type,
                recommendations.len(),
                reviews
            ),
            recommendations,
            warnings,
            timestamp: Utc::now(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            degraded: false,
        }
    }
}

#[async_trait]
impl AnalysisBackend for RuleEngine {
    fn name(&self) -> &str {
        RULE_ENGINE_NAME
    }

    fn priority(&self) -> u32 {
        0
    }

    fn capabilities(&self) -> &[AnalysisType] {
        &AnalysisType::ALL
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn info(&self) -> BackendInfo {
        BackendInfo {
            name: RULE_ENGINE_NAME.to_string(),
            available: true,
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            path: None,
            priority: 0,
        }
    }

    async fn analyze(&self, context: &AnalysisContext) -> Result<AnalysisResult, AnalysisError> {
        Ok(self.evaluate(context))
    }
}
