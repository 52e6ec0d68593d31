//! Prompt construction and response parsing for command-line backends
//!
//! The prompt always ends with the instruction to answer with one JSON object
//! in the `AnalysisResult` shape. Responses are parsed leniently: code fences
//! and chatter around the object are ignored, and anything that still does not
//! parse yields a degraded result instead of an error.

use super::fallback::RuleEngine;
use super::types::{
    Action, AnalysisContext, AnalysisResult, AnalysisType, Recommendation, RiskLevel,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt::Write as _;

/// Confidence of a result built from an unparseable response
pub const DEGRADED_CONFIDENCE: f64 = 0.1;

const RESPONSE_INSTRUCTION: &str = "Respond with a single JSON object and nothing else, \
matching this shape: {\"summary\": string, \"confidence\": number between 0 and 1, \
\"recommendations\": [{\"package\": string, \"action\": \"update\"|\"skip\"|\"review\", \
\"riskLevel\": \"low\"|\"medium\"|\"high\"|\"critical\", \"reason\": string, \
\"breakingChanges\": [string], \"securityFixes\": [string]}], \"warnings\": [string]}";

fn instructions(analysis_type: AnalysisType) -> &'static str {
    match analysis_type {
        AnalysisType::Impact => {
            "Assess the impact of each update on the workspace: breaking API changes, \
             migration effort and which packages are affected."
        }
        AnalysisType::Security => {
            "Assess each update for security: vulnerabilities fixed by the target version, \
             advisories still open against it, and how urgent the update is."
        }
        AnalysisType::Compatibility => {
            "Assess whether each target version is compatible with the rest of the workspace: \
             peer dependency ranges, runtime requirements and known incompatibilities."
        }
        AnalysisType::Recommend => {
            "Recommend, for each update, whether to take it now, review it first or skip it, \
             with the main reason."
        }
    }
}

/// Natural-language request for one analysis call
pub fn build_prompt(context: &AnalysisContext) -> String {
    let workspace = &context.workspace;
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are reviewing dependency updates for the workspace '{}' ({} packages, {} catalogs).",
        workspace.name, workspace.package_count, workspace.catalog_count
    );
    let _ = writeln!(prompt, "{}", instructions(context.analysis_type));
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Updates under review:");
    for pkg in &context.packages {
        let _ = write!(
            prompt,
            "- {} {} -> {} ({} update, {}, catalog '{}')",
            pkg.name,
            pkg.current_version,
            pkg.target_version,
            pkg.update_type,
            pkg.dependency_type,
            pkg.catalog
        );
        if pkg.security_flagged {
            let _ = write!(prompt, " [known security advisory]");
        }
        let _ = writeln!(prompt);
    }

    if !context.conflicts.is_empty() {
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Conflicting proposals across catalogs:");
        for conflict in &context.conflicts {
            let versions: Vec<String> = conflict
                .versions
                .iter()
                .map(|v| format!("{} in '{}'", v.version, v.catalog))
                .collect();
            let _ = writeln!(prompt, "- {}: {}", conflict.package_name, versions.join(", "));
        }
    }

    if !context.options.is_empty() {
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Options:");
        for (key, value) in &context.options {
            let _ = writeln!(prompt, "- {}: {}", key, value);
        }
    }

    let _ = writeln!(prompt);
    prompt.push_str(RESPONSE_INSTRUCTION);
    prompt
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponse {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    recommendations: Vec<RawRecommendation>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecommendation {
    package: String,
    action: Action,
    risk_level: RiskLevel,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    breaking_changes: Vec<String>,
    #[serde(default)]
    security_fixes: Vec<String>,
}

/// Slice from the first `{` to the last `}`, after dropping code fences
fn extract_json(output: &str) -> Option<&str> {
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    (start < end).then(|| &output[start..=end])
}

/// Turn backend output into a result. Never fails: unparseable output gives
/// a degraded result asking for review of every package. Parsed verdicts are
/// reconciled against the request so flagged packages keep their risk and
/// omitted packages still get a recommendation.
pub fn parse_response(
    backend: &str,
    context: &AnalysisContext,
    output: &str,
    processing_time_ms: u64,
    timestamp: DateTime<Utc>,
) -> AnalysisResult {
    let parsed = extract_json(output)
        .ok_or_else(|| "no JSON object in output".to_string())
        .and_then(|json| serde_json::from_str::<RawResponse>(json).map_err(|e| e.to_string()));

    match parsed {
        Ok(raw) => {
            let mut result = AnalysisResult {
                backend: backend.to_string(),
                analysis_type: context.analysis_type,
                confidence: raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
                summary: raw.summary,
                recommendations: raw
                    .recommendations
                    .into_iter()
                    .map(|r| Recommendation {
                        package: r.package,
                        action: r.action,
                        risk_level: r.risk_level,
                        reason: r.reason,
                        breaking_changes: r.breaking_changes,
                        security_fixes: r.security_fixes,
                    })
                    .collect(),
                warnings: raw.warnings,
                timestamp,
                processing_time_ms,
                degraded: false,
            };
            RuleEngine::new().reconcile(&mut result, context);
            result
        }
        Err(message) => degraded_result(backend, context, &message, processing_time_ms, timestamp),
    }
}

/// Low-confidence result used when a response cannot be understood
pub fn degraded_result(
    backend: &str,
    context: &AnalysisContext,
    message: &str,
    processing_time_ms: u64,
    timestamp: DateTime<Utc>,
) -> AnalysisResult {
    let reason = format!("could not parse {} response: {}", backend, message);
    AnalysisResult {
        backend: backend.to_string(),
        analysis_type: context.analysis_type,
        confidence: DEGRADED_CONFIDENCE,
        summary: format!(
            "{} returned an unreadable response; {} packages need manual review",
            backend,
            context.packages.len()
        ),
        recommendations: context
            .packages
            .iter()
            .map(|pkg| {
                let risk = if pkg.security_flagged {
                    RiskLevel::Critical
                } else {
                    RiskLevel::Medium
                };
                Recommendation::new(&pkg.name, Action::Review, risk, reason.clone())
            })
            .collect(),
        warnings: vec![reason],
        timestamp,
        processing_time_ms,
        degraded: true,
    }
}
