//! CLI argument parsing module for catup

use crate::analysis::AnalysisType;
use crate::config::Config;
use crate::update::UpdateTarget;
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};

/// Catalog version pin updater with update analysis
#[derive(Parser, Debug, Clone)]
#[command(
    name = "catup",
    version,
    about = "Plan catalog version updates and analyze their risk"
)]
pub struct CliArgs {
    /// Workspace snapshot (JSON)
    #[arg(default_value = "catup.json")]
    pub snapshot: PathBuf,

    // Analysis options
    /// Kind of analysis to run
    #[arg(long, default_value = "impact")]
    pub analysis: AnalysisType,

    /// Preferred analysis backend (claude, gemini, codex)
    #[arg(long)]
    pub backend: Option<String>,

    /// Skip analysis backends and use the built-in rules only
    #[arg(long)]
    pub no_ai: bool,

    // Update options
    /// How far updates may move: latest, minor or patch
    #[arg(long)]
    pub target: Option<UpdateTarget>,

    /// Exclude specific packages from update (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub exclude: Vec<String>,

    /// Update only specific packages (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub only: Vec<String>,

    /// Allow prerelease versions
    #[arg(long)]
    pub prerelease: bool,

    /// Package with a known security advisory (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub security: Vec<String>,

    // Cache options
    /// Keep caches in memory only
    #[arg(long)]
    pub no_cache: bool,

    /// Cache directory
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Configuration file (default: .catup.toml next to the snapshot)
    #[arg(long)]
    pub config: Option<PathBuf>,

    // Output options
    /// Output results in JSON format
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable quiet mode - minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

impl CliArgs {
    /// Directory searched for `.catup.toml`
    pub fn workspace_dir(&self) -> &Path {
        match self.snapshot.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Override configuration values with the flags that were given
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(backend) = &self.backend {
            config.analysis.backend = Some(backend.clone());
        }
        if let Some(target) = self.target {
            config.update.target = target;
        }
        if self.prerelease {
            config.update.include_prerelease = true;
        }
        if !self.exclude.is_empty() {
            config.update.exclude = self.exclude.clone();
        }
        if !self.only.is_empty() {
            config.update.only = self.only.clone();
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.dir = Some(dir.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_args() {
        let args = CliArgs::parse_from(["catup"]);
        assert_eq!(args.snapshot, PathBuf::from("catup.json"));
        assert_eq!(args.analysis, AnalysisType::Impact);
        assert!(args.backend.is_none());
        assert!(!args.no_ai);
        assert!(args.target.is_none());
        assert!(args.exclude.is_empty());
        assert!(args.only.is_empty());
        assert!(!args.prerelease);
        assert!(!args.no_cache);
        assert!(!args.json);
        assert!(!args.verbose);
        assert!(!args.quiet);
    }

    #[test]
    fn test_analysis_type() {
        let args = CliArgs::parse_from(["catup", "--analysis", "security"]);
        assert_eq!(args.analysis, AnalysisType::Security);

        assert!(CliArgs::try_parse_from(["catup", "--analysis", "vibes"]).is_err());
    }

    #[test]
    fn test_target() {
        let args = CliArgs::parse_from(["catup", "--target", "minor"]);
        assert_eq!(args.target, Some(UpdateTarget::Minor));
    }

    #[test]
    fn test_repeated_flags() {
        let args = CliArgs::parse_from([
            "catup", "--exclude", "foo", "--exclude", "bar", "--security", "lodash",
        ]);
        assert_eq!(args.exclude, vec!["foo", "bar"]);
        assert_eq!(args.security, vec!["lodash"]);
    }

    #[test]
    fn test_quiet_flags() {
        assert!(CliArgs::parse_from(["catup", "-q"]).quiet);
        assert!(CliArgs::parse_from(["catup", "--quiet"]).quiet);
    }

    #[test]
    fn test_workspace_dir() {
        let args = CliArgs::parse_from(["catup", "/repo/catup.json"]);
        assert_eq!(args.workspace_dir(), Path::new("/repo"));

        let args = CliArgs::parse_from(["catup", "snapshot.json"]);
        assert_eq!(args.workspace_dir(), Path::new("."));
    }

    #[test]
    fn test_apply_to_overrides_config() {
        let args = CliArgs::parse_from([
            "catup",
            "--backend",
            "gemini",
            "--target",
            "patch",
            "--only",
            "react",
            "--prerelease",
            "--no-cache",
            "--cache-dir",
            "/tmp/c",
        ]);
        let mut config = Config::default();
        config.update.exclude = vec!["lodash".to_string()];
        args.apply_to(&mut config);

        assert_eq!(config.analysis.backend.as_deref(), Some("gemini"));
        assert_eq!(config.update.target, UpdateTarget::Patch);
        assert_eq!(config.update.only, vec!["react"]);
        assert_eq!(config.update.exclude, vec!["lodash"]);
        assert!(config.update.include_prerelease);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.dir, Some(PathBuf::from("/tmp/c")));
    }

    #[test]
    fn test_apply_to_keeps_config_without_flags() {
        let args = CliArgs::parse_from(["catup"]);
        let mut config = Config::default();
        config.update.target = UpdateTarget::Minor;
        args.apply_to(&mut config);
        assert_eq!(config.update.target, UpdateTarget::Minor);
        assert!(config.cache.enabled);
    }
}
