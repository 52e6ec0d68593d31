//! Configuration from `.catup.toml`
//!
//! Every section and key is optional; missing values take their defaults.
//! Command-line flags are applied on top by the caller.

use crate::error::ConfigError;
use crate::update::{UpdateFilter, UpdateTarget};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the workspace directory
pub const CONFIG_FILE: &str = ".catup.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub analysis: AnalysisSettings,
    pub cache: CacheSettings,
    pub registry: RegistrySettings,
    pub update: UpdateSettings,
}

/// `[analysis]`: backend invocation and batching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSettings {
    /// Preferred backend name
    pub backend: Option<String>,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub chunk_threshold: usize,
    pub chunk_size: usize,
    pub concurrency: usize,
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
    pub requests_per_second: f64,
    pub max_burst: u32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            backend: None,
            timeout_secs: 120,
            max_attempts: 2,
            chunk_threshold: 15,
            chunk_size: 10,
            concurrency: 2,
            failure_threshold: 3,
            recovery_timeout_secs: 60,
            requests_per_second: 1.0,
            max_burst: 2,
        }
    }
}

/// `[cache]`: namespaces, capacity and lifetimes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Persist caches to disk between runs
    pub enabled: bool,
    /// Cache root; the platform cache directory when unset
    pub dir: Option<PathBuf>,
    pub max_entries: usize,
    pub registry_ttl_secs: u64,
    pub workspace_ttl_secs: u64,
    pub security_ttl_secs: u64,
    pub default_ttl_secs: u64,
    pub compatibility_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            max_entries: 1000,
            registry_ttl_secs: 3600,
            workspace_ttl_secs: 300,
            security_ttl_secs: 900,
            default_ttl_secs: 3600,
            compatibility_ttl_secs: 86400,
        }
    }
}

impl CacheSettings {
    /// Cache root directory, if one can be determined
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        self.dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("catup")))
    }
}

/// `[registry]`: npm registry access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySettings {
    pub url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub concurrency: usize,
    pub requests_per_second: f64,
    pub max_burst: u32,
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            url: crate::registry::NPM_REGISTRY_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            concurrency: 10,
            requests_per_second: 10.0,
            max_burst: 10,
            failure_threshold: 5,
            recovery_timeout_secs: 30,
        }
    }
}

/// `[update]`: which versions to propose
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateSettings {
    pub target: UpdateTarget,
    pub include_prerelease: bool,
    pub exclude: Vec<String>,
    pub only: Vec<String>,
}

impl UpdateSettings {
    /// Planner filter for these settings plus security-flagged packages
    pub fn to_filter(&self, security: Vec<String>) -> UpdateFilter {
        UpdateFilter::new()
            .with_target(self.target)
            .with_include_prerelease(self.include_prerelease)
            .with_exclude(self.exclude.clone())
            .with_only(self.only.clone())
            .with_security(security)
    }
}

impl Config {
    /// Parse configuration text; `path` only labels errors
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, which must exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load `.catup.toml` from `dir`, or defaults when there is none
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("analysis.timeout_secs", self.analysis.timeout_secs as f64),
            ("analysis.max_attempts", self.analysis.max_attempts as f64),
            ("analysis.chunk_size", self.analysis.chunk_size as f64),
            ("analysis.concurrency", self.analysis.concurrency as f64),
            ("analysis.failure_threshold", self.analysis.failure_threshold as f64),
            ("analysis.requests_per_second", self.analysis.requests_per_second),
            ("analysis.max_burst", self.analysis.max_burst as f64),
            ("cache.max_entries", self.cache.max_entries as f64),
            ("registry.timeout_secs", self.registry.timeout_secs as f64),
            ("registry.concurrency", self.registry.concurrency as f64),
            ("registry.requests_per_second", self.registry.requests_per_second),
            ("registry.max_burst", self.registry.max_burst as f64),
            ("registry.failure_threshold", self.registry.failure_threshold as f64),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, value)| *value <= 0.0) {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if let Some(package) = self
            .update
            .only
            .iter()
            .find(|p| self.update.exclude.contains(*p))
        {
            return Err(ConfigError::ConflictingOptions {
                message: format!("'{}' is listed in both update.only and update.exclude", package),
            });
        }

        if !self.registry.url.starts_with("http://") && !self.registry.url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "registry.url".to_string(),
                message: format!("'{}' is not an http(s) URL", self.registry.url),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(content: &str) -> Result<Config, ConfigError> {
        Config::parse(content, Path::new(CONFIG_FILE))
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.analysis.chunk_threshold, 15);
        assert_eq!(config.analysis.chunk_size, 10);
        assert_eq!(config.cache.security_ttl_secs, 900);
        assert_eq!(config.registry.url, "https://registry.npmjs.org");
        assert_eq!(config.update.target, UpdateTarget::Latest);
    }

    #[test]
    fn test_partial_sections() {
        let config = parse(
            r#"
[analysis]
backend = "gemini"
chunk_size = 5

[update]
target = "minor"
exclude = ["react"]
"#,
        )
        .unwrap();
        assert_eq!(config.analysis.backend.as_deref(), Some("gemini"));
        assert_eq!(config.analysis.chunk_size, 5);
        assert_eq!(config.analysis.timeout_secs, 120);
        assert_eq!(config.update.target, UpdateTarget::Minor);
        assert_eq!(config.update.exclude, vec!["react"]);
    }

    #[test]
    fn test_unknown_key_is_parse_error() {
        let err = parse("[cache]\nttl = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_zero_chunk_size_is_invalid() {
        let err = parse("[analysis]\nchunk_size = 0\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "analysis.chunk_size"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_only_and_exclude_overlap() {
        let err = parse("[update]\nonly = [\"a\"]\nexclude = [\"a\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingOptions { .. }));
    }

    #[test]
    fn test_discover() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap(), Config::default());

        std::fs::write(dir.path().join(CONFIG_FILE), "[cache]\nenabled = false\n").unwrap();
        assert!(!Config::discover(dir.path()).unwrap().cache.enabled);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/definitely/missing/.catup.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_resolved_dir_prefers_explicit() {
        let settings = CacheSettings {
            dir: Some(PathBuf::from("/tmp/catup-cache")),
            ..CacheSettings::default()
        };
        assert_eq!(settings.resolved_dir(), Some(PathBuf::from("/tmp/catup-cache")));
    }

    #[test]
    fn test_to_filter() {
        let settings = UpdateSettings {
            target: UpdateTarget::Patch,
            only: vec!["lodash".to_string()],
            ..UpdateSettings::default()
        };
        let filter = settings.to_filter(vec!["lodash".to_string()]);
        assert_eq!(filter.target, UpdateTarget::Patch);
        assert!(filter.is_security_flagged("lodash"));
        assert!(!filter.should_process_package("react"));
    }
}
