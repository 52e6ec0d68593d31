//! Text output formatter for human-readable display
//!
//! This module provides:
//! - Planned updates with their change size and the packages they affect
//! - Cross-catalog conflicts with the recommended alignment
//! - Per-package verdicts of the analysis, colored by risk
//! - Skipped entries, warnings and cache statistics in verbose mode

use crate::analysis::{is_low_confidence, Action, AnalysisResult, RiskLevel};
use crate::cache::CachesStats;
use crate::domain::{PlannedUpdate, SkippedUpdate, UpdatePlan, UpdateType, VersionConflict};
use crate::orchestrator::OrchestratorResult;
use crate::output::{OutputFormatter, Verbosity};
use colored::Colorize;
use std::io::Write;

/// Minimum width of the package column
const MIN_NAME_WIDTH: usize = 20;

/// Text formatter for human-readable output
pub struct TextFormatter {
    verbosity: Verbosity,
    color: bool,
}

impl TextFormatter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self::with_color(verbosity, true)
    }

    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    fn update_label(&self, update_type: UpdateType) -> String {
        let label = update_type.to_string();
        if !self.color {
            return label;
        }
        match update_type {
            UpdateType::Major => label.red().bold().to_string(),
            UpdateType::Minor => label.yellow().to_string(),
            UpdateType::Patch => label.green().to_string(),
            UpdateType::Unknown => label.dimmed().to_string(),
        }
    }

    fn risk_label(&self, risk: RiskLevel) -> String {
        let label = risk.to_string();
        if !self.color {
            return label;
        }
        match risk {
            RiskLevel::Low => label.green().to_string(),
            RiskLevel::Medium => label.yellow().to_string(),
            RiskLevel::High => label.red().to_string(),
            RiskLevel::Critical => label.red().bold().to_string(),
        }
    }

    fn heading(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }

    fn format_update_line(
        &self,
        update: &PlannedUpdate,
        width: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let arrow = if self.color { "→" } else { "->" };
        let security = match (update.is_security_update, self.color) {
            (false, _) => String::new(),
            (true, true) => format!(" {}", "security".red()),
            (true, false) => " security".to_string(),
        };
        writeln!(
            writer,
            "  {:width$} {} {} {} [{}] {}{}",
            update.package,
            self.dim(&update.current_range),
            arrow,
            update.new_range,
            self.update_label(update.update_type),
            self.dim(&format!("({})", update.catalog)),
            security,
            width = width
        )?;
        if self.verbosity == Verbosity::Verbose && !update.affected_packages.is_empty() {
            writeln!(
                writer,
                "  {:width$} {}",
                "",
                self.dim(&format!("used by {}", update.affected_packages.join(", "))),
                width = width
            )?;
        }
        Ok(())
    }

    fn format_skip_line(
        &self,
        skip: &SkippedUpdate,
        width: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        writeln!(
            writer,
            "  {:width$} {}",
            skip.package,
            self.dim(&format!("{} ({}): {}", skip.current_range, skip.catalog, skip.reason)),
            width = width
        )
    }

    fn format_conflict(
        &self,
        conflict: &VersionConflict,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let versions: Vec<String> = conflict
            .versions
            .iter()
            .map(|v| format!("{}@{}", v.catalog, v.version))
            .collect();
        let name = if self.color {
            conflict.package_name.yellow().bold().to_string()
        } else {
            conflict.package_name.clone()
        };
        writeln!(writer, "  {}: {}", name, versions.join(", "))?;
        writeln!(writer, "    {}", self.dim(&conflict.recommendation))
    }

    fn format_cache_stats(&self, stats: &CachesStats, writer: &mut dyn Write) -> std::io::Result<()> {
        writeln!(writer, "{}", self.heading("Cache"))?;
        for (name, stats) in [
            ("registry", &stats.registry),
            ("workspace", &stats.workspace),
            ("analysis", &stats.analysis),
        ] {
            writeln!(
                writer,
                "  {:10} {} entries, {} hits, {} misses ({:.0}% hit rate)",
                name,
                stats.total_entries,
                stats.hits,
                stats.misses,
                stats.hit_rate * 100.0
            )?;
        }
        Ok(())
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, result: &OrchestratorResult, writer: &mut dyn Write) -> std::io::Result<()> {
        if self.verbosity != Verbosity::Quiet {
            writeln!(
                writer,
                "{} {}",
                self.heading(&result.workspace.name),
                self.dim(&format!(
                    "({} catalogs, {} packages)",
                    result.workspace.catalog_count, result.workspace.package_count
                ))
            )?;
            writeln!(writer)?;
        }

        self.format_plan(&result.plan, writer)?;

        if let Some(analysis) = &result.analysis {
            writeln!(writer)?;
            self.format_analysis(analysis, writer)?;
        }

        if self.verbosity == Verbosity::Verbose {
            if !result.warnings.is_empty() {
                writeln!(writer)?;
                writeln!(writer, "{}", self.heading("Warnings"))?;
                for warning in &result.warnings {
                    writeln!(writer, "  - {}", warning)?;
                }
            }
            writeln!(writer)?;
            self.format_cache_stats(&result.cache, writer)?;
        }
        Ok(())
    }

    fn format_plan(&self, plan: &UpdatePlan, writer: &mut dyn Write) -> std::io::Result<()> {
        let width = plan
            .updates()
            .iter()
            .map(|u| u.package.len())
            .chain(plan.skipped().iter().map(|s| s.package.len()))
            .max()
            .unwrap_or(0)
            .max(MIN_NAME_WIDTH);

        if plan.updates().is_empty() {
            writeln!(writer, "All catalog pins are up to date")?;
        } else {
            let count = plan.updates().len();
            writeln!(
                writer,
                "{}",
                self.heading(&format!(
                    "{} {}",
                    count,
                    if count == 1 { "update" } else { "updates" }
                ))
            )?;
            for update in plan.updates() {
                self.format_update_line(update, width, writer)?;
            }
        }

        if plan.has_conflicts() {
            writeln!(writer)?;
            let heading = format!("{} conflicts", plan.conflicts().len());
            if self.color {
                writeln!(writer, "{}", heading.yellow().bold())?;
            } else {
                writeln!(writer, "{}", heading)?;
            }
            for conflict in plan.conflicts() {
                self.format_conflict(conflict, writer)?;
            }
        }

        if self.verbosity == Verbosity::Verbose && !plan.skipped().is_empty() {
            writeln!(writer)?;
            writeln!(writer, "{}", self.heading("Skipped"))?;
            for skip in plan.skipped() {
                self.format_skip_line(skip, width, writer)?;
            }
        }
        Ok(())
    }

    fn format_analysis(
        &self,
        analysis: &AnalysisResult,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let confidence = format!("confidence {:.0}%", analysis.confidence * 100.0);
        let confidence = if self.color && is_low_confidence(analysis.confidence) {
            confidence.yellow().to_string()
        } else {
            self.dim(&confidence)
        };
        writeln!(
            writer,
            "{} {}",
            self.heading(&format!("{} analysis by {}", analysis.analysis_type, analysis.backend)),
            confidence
        )?;

        if self.verbosity != Verbosity::Quiet {
            writeln!(writer, "  {}", analysis.summary)?;
        }

        let width = analysis
            .recommendations
            .iter()
            .map(|r| r.package.len())
            .max()
            .unwrap_or(0)
            .max(MIN_NAME_WIDTH);
        for rec in &analysis.recommendations {
            let action = match (rec.action, self.color) {
                (Action::Update, true) => rec.action.to_string().green().to_string(),
                (Action::Review, true) => rec.action.to_string().yellow().to_string(),
                _ => rec.action.to_string(),
            };
            writeln!(
                writer,
                "  {:width$} {:6} [{}] {}",
                rec.package,
                action,
                self.risk_label(rec.risk_level),
                self.dim(&rec.reason),
                width = width
            )?;
            if self.verbosity == Verbosity::Verbose {
                for change in &rec.breaking_changes {
                    writeln!(writer, "  {:width$} breaking: {}", "", change, width = width)?;
                }
                for fix in &rec.security_fixes {
                    writeln!(writer, "  {:width$} fixes: {}", "", fix, width = width)?;
                }
            }
        }

        if self.verbosity != Verbosity::Quiet {
            for warning in &analysis.warnings {
                writeln!(writer, "  {} {}", self.dim("warning:"), warning)?;
            }
        }
        Ok(())
    }
}
