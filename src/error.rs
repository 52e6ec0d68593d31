//! Application error types using thiserror
//!
//! Error hierarchy:
//! - CatalogError: Invalid catalog, package, or version range data
//! - RegistryError: Issues with package registry communication
//! - AnalysisError: Failures invoking an analysis backend
//! - ConfigError: Issues with configuration files and CLI options
//! - IoError: File system operation failures

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Catalog / domain validation errors
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Package registry related errors
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Analysis backend errors
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Configuration related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO related errors
    #[error(transparent)]
    Io(#[from] IoError),
}

/// Errors raised when constructing or mutating catalogs and packages
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Package name is not a valid npm package name
    #[error("invalid package name '{name}': {reason}")]
    InvalidPackageName { name: String, reason: String },

    /// Version range cannot be parsed
    #[error("invalid version range '{range}': {message}")]
    InvalidVersionRange { range: String, message: String },

    /// Concrete version cannot be parsed
    #[error("invalid version '{version}': {message}")]
    InvalidVersion { version: String, message: String },

    /// Dependency is not present in the catalog
    #[error("dependency '{package}' not found in catalog '{catalog}'")]
    DependencyNotFound { catalog: String, package: String },

    /// A package references a catalog that does not exist
    #[error("package '{package}' references unknown catalog '{catalog}'")]
    UnknownCatalog { package: String, catalog: String },

    /// Two catalogs share the same name
    #[error("duplicate catalog '{name}'")]
    DuplicateCatalog { name: String },
}

/// Errors related to package registry communication
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    /// Package not found in registry
    #[error("package '{package}' not found in {registry} registry")]
    PackageNotFound { package: String, registry: String },

    /// Network request failed
    #[error("failed to fetch package '{package}' from {registry}: {message}")]
    NetworkError {
        package: String,
        registry: String,
        message: String,
    },

    /// Rate limit exceeded
    #[error("rate limit exceeded for {registry} registry")]
    RateLimitExceeded { registry: String },

    /// Invalid response from registry
    #[error("invalid response from {registry} for '{package}': {message}")]
    InvalidResponse {
        package: String,
        registry: String,
        message: String,
    },

    /// Timeout
    #[error("timeout while fetching '{package}' from {registry}")]
    Timeout { package: String, registry: String },

    /// Calls to the registry are being shed after repeated failures
    #[error("{registry} registry temporarily disabled after repeated failures (retry in {}s)", .retry_after.as_secs())]
    CircuitOpen {
        registry: String,
        retry_after: Duration,
    },
}

/// Errors related to analysis backend invocation
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    /// Backend is not installed or not reachable
    #[error("analysis backend '{backend}' is not available")]
    Unavailable { backend: String },

    /// Backend does not support the requested analysis type
    #[error("analysis backend '{backend}' does not support {analysis_type} analysis")]
    Unsupported {
        backend: String,
        analysis_type: String,
    },

    /// Command could not be started
    #[error("failed to start '{command}': {message}")]
    Spawn { command: String, message: String },

    /// Command ran past its wall-clock limit and was killed
    #[error("analysis backend '{backend}' timed out after {}s", .timeout.as_secs())]
    Timeout { backend: String, timeout: Duration },

    /// Command exited unsuccessfully
    #[error("analysis backend '{backend}' exited with {}: {stderr}", exit_label(.code))]
    CommandFailed {
        backend: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Backend calls are being shed after repeated failures
    #[error("analysis backend '{backend}' temporarily disabled (retry in {}s)", .retry_after.as_secs())]
    CircuitOpen {
        backend: String,
        retry_after: Duration,
    },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML or has unexpected keys
    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    /// A value is out of its accepted range
    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Conflicting options
    #[error("conflicting options: {message}")]
    ConflictingOptions { message: String },
}

/// Errors related to IO operations
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    /// Snapshot file is not valid JSON
    #[error("failed to parse {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    /// Generic IO error
    #[error("IO error at {path}: {source}")]
    Generic {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

impl CatalogError {
    /// Creates a new InvalidPackageName error
    pub fn invalid_package_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        CatalogError::InvalidPackageName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new InvalidVersionRange error
    pub fn invalid_range(range: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::InvalidVersionRange {
            range: range.into(),
            message: message.into(),
        }
    }

    /// Creates a new DependencyNotFound error
    pub fn dependency_not_found(catalog: impl Into<String>, package: impl Into<String>) -> Self {
        CatalogError::DependencyNotFound {
            catalog: catalog.into(),
            package: package.into(),
        }
    }
}

impl RegistryError {
    /// Creates a new PackageNotFound error
    pub fn package_not_found(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::PackageNotFound {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Creates a new NetworkError
    pub fn network_error(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::NetworkError {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new RateLimitExceeded error
    pub fn rate_limit_exceeded(registry: impl Into<String>) -> Self {
        RegistryError::RateLimitExceeded {
            registry: registry.into(),
        }
    }

    /// Creates a new Timeout error
    pub fn timeout(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::Timeout {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistryError::NetworkError { .. }
                | RegistryError::RateLimitExceeded { .. }
                | RegistryError::Timeout { .. }
        )
    }
}

impl AnalysisError {
    /// Creates a new Unavailable error
    pub fn unavailable(backend: impl Into<String>) -> Self {
        AnalysisError::Unavailable {
            backend: backend.into(),
        }
    }

    /// Creates a new Timeout error
    pub fn timeout(backend: impl Into<String>, timeout: Duration) -> Self {
        AnalysisError::Timeout {
            backend: backend.into(),
            timeout,
        }
    }

    /// Only failed runs are retried; a timeout means the backend is already
    /// overloaded and retrying just repeats the symptom.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::CommandFailed { .. })
    }
}
