//! JSON output formatter for machine processing
//!
//! The plan and the analysis are written in their own serialized form
//! (camelCase keys), wrapped in a summary envelope.

use crate::analysis::AnalysisResult;
use crate::cache::CachesStats;
use crate::domain::{
    PlannedUpdate, SkippedUpdate, UpdatePlan, UpdateType, VersionConflict, WorkspaceInfo,
};
use crate::orchestrator::OrchestratorResult;
use crate::output::{OutputFormatter, Verbosity};
use serde::Serialize;
use std::io::Write;

/// JSON formatter for machine-readable output
pub struct JsonFormatter {
    /// Skipped entries and cache stats are only written when verbose
    verbosity: Verbosity,
}

impl JsonFormatter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    fn write_json<T: Serialize>(&self, value: &T, writer: &mut dyn Write) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut *writer, value)?;
        writeln!(writer)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutput<'a> {
    workspace: &'a WorkspaceInfo,
    summary: JsonSummary,
    plan: JsonPlan<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<&'a AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<&'a CachesStats>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSummary {
    updates: usize,
    skipped: usize,
    conflicts: usize,
    major: usize,
    minor: usize,
    patch: usize,
    has_security_updates: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonPlan<'a> {
    updates: &'a [PlannedUpdate],
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped: Option<&'a [SkippedUpdate]>,
    conflicts: &'a [VersionConflict],
}

impl JsonSummary {
    fn of(plan: &UpdatePlan) -> Self {
        Self {
            updates: plan.updates().len(),
            skipped: plan.skipped().len(),
            conflicts: plan.conflicts().len(),
            major: plan.count_by_type(UpdateType::Major),
            minor: plan.count_by_type(UpdateType::Minor),
            patch: plan.count_by_type(UpdateType::Patch),
            has_security_updates: plan.has_security_updates(),
        }
    }
}

impl<'a> JsonPlan<'a> {
    fn of(plan: &'a UpdatePlan, verbose: bool) -> Self {
        Self {
            updates: plan.updates(),
            skipped: (verbose && !plan.skipped().is_empty()).then(|| plan.skipped()),
            conflicts: plan.conflicts(),
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, result: &OrchestratorResult, writer: &mut dyn Write) -> std::io::Result<()> {
        let output = JsonOutput {
            workspace: &result.workspace,
            summary: JsonSummary::of(&result.plan),
            plan: JsonPlan::of(&result.plan, self.is_verbose()),
            analysis: result.analysis.as_ref(),
            warnings: (!result.warnings.is_empty()).then_some(result.warnings.as_slice()),
            cache: self.is_verbose().then_some(&result.cache),
        };
        self.write_json(&output, writer)
    }

    fn format_plan(&self, plan: &UpdatePlan, writer: &mut dyn Write) -> std::io::Result<()> {
        self.write_json(&JsonPlan::of(plan, self.is_verbose()), writer)
    }

    fn format_analysis(
        &self,
        analysis: &AnalysisResult,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        self.write_json(analysis, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Caches;
    use crate::domain::SkipReason;

    fn make_result() -> OrchestratorResult {
        let plan = UpdatePlan::new(
            vec![
                PlannedUpdate::new("lodash", "default", "4.17.0", "5.0.0")
                    .with_ranges("^4.17.0", "^5.0.0")
                    .with_security(true),
            ],
            vec![SkippedUpdate {
                package: "react".to_string(),
                catalog: "default".to_string(),
                current_range: "^18.2.0".to_string(),
                reason: SkipReason::AlreadyLatest,
            }],
        );
        OrchestratorResult {
            workspace: WorkspaceInfo {
                name: "shop".to_string(),
                path: "/repo".to_string(),
                package_count: 1,
                catalog_count: 1,
            },
            plan,
            analysis: None,
            warnings: Vec::new(),
            cache: Caches::in_memory().stats(),
        }
    }

    fn render(formatter: &JsonFormatter, result: &OrchestratorResult) -> serde_json::Value {
        let mut out = Vec::new();
        formatter.format(result, &mut out).unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn test_format_result() {
        let json = render(&JsonFormatter::new(Verbosity::Normal), &make_result());

        assert_eq!(json["workspace"]["name"], "shop");
        assert_eq!(json["summary"]["updates"], 1);
        assert_eq!(json["summary"]["major"], 1);
        assert_eq!(json["summary"]["hasSecurityUpdates"], true);
        assert_eq!(json["plan"]["updates"][0]["newRange"], "^5.0.0");
        assert_eq!(json["plan"]["updates"][0]["updateType"], "major");
        assert!(json["plan"].get("skipped").is_none());
        assert!(json.get("analysis").is_none());
        assert!(json.get("cache").is_none());
    }

    #[test]
    fn test_verbose_includes_skips_and_cache() {
        let json = render(&JsonFormatter::new(Verbosity::Verbose), &make_result());

        assert_eq!(json["plan"]["skipped"][0]["reason"], "already_latest");
        assert!(json["cache"]["registry"].is_object());
    }
}
