//! Analysis backends backed by AI command-line tools
//!
//! Each backend wraps one external program. Availability is probed once and
//! cached: `<command> --version` first, then a search path lookup of the
//! primary command, then of the known alternate command names.
//!
//! An invocation acquires a rate-limiter token, runs through the circuit
//! breaker, and is retried when the program exits unsuccessfully. Timeouts
//! kill the program and are not retried.

use super::backend::{AnalysisBackend, BackendInfo};
use super::command::{CommandOutput, CommandRunner};
use super::prompt::{build_prompt, parse_response};
use super::types::{AnalysisContext, AnalysisResult, AnalysisType};
use crate::config::AnalysisSettings;
use crate::error::AnalysisError;
use crate::resilience::{
    retry, BreakerError, CircuitBreaker, CircuitBreakerConfig, RateLimiter, RetryPolicy,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Wall-clock limit of the `--version` probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Known command-line tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Claude,
    Gemini,
    Codex,
}

impl BackendKind {
    /// Every known tool, highest priority first
    pub const ALL: [BackendKind; 3] = [BackendKind::Claude, BackendKind::Gemini, BackendKind::Codex];

    /// Backend name
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Claude => "claude",
            BackendKind::Gemini => "gemini",
            BackendKind::Codex => "codex",
        }
    }

    /// Primary program name
    pub fn command(&self) -> &'static str {
        self.name()
    }

    /// Other names the program is installed under
    pub fn alternates(&self) -> &'static [&'static str] {
        match self {
            BackendKind::Claude => &["claude-code"],
            BackendKind::Gemini => &["gemini-cli"],
            BackendKind::Codex => &[],
        }
    }

    pub fn priority(&self) -> u32 {
        match self {
            BackendKind::Claude => 100,
            BackendKind::Gemini => 80,
            BackendKind::Codex => 60,
        }
    }

    /// Arguments for a non-interactive run answering `prompt`
    pub fn prompt_args(&self, prompt: String) -> Vec<String> {
        let flag = match self {
            BackendKind::Claude => "--print",
            BackendKind::Gemini => "-p",
            BackendKind::Codex => "exec",
        };
        vec![flag.to_string(), prompt]
    }

    /// Look up a tool by name
    pub fn from_name(name: &str) -> Option<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .find(|k| k.name() == name || k.alternates().iter().any(|a| *a == name))
    }
}

/// Limits applied to every invocation of one backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendLimits {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub breaker: CircuitBreakerConfig,
    pub requests_per_second: f64,
    pub max_burst: u32,
}

impl Default for BackendLimits {
    fn default() -> Self {
        Self::from(&AnalysisSettings::default())
    }
}

impl From<&AnalysisSettings> for BackendLimits {
    fn from(settings: &AnalysisSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            max_attempts: settings.max_attempts,
            breaker: CircuitBreakerConfig {
                failure_threshold: settings.failure_threshold,
                recovery_timeout: Duration::from_secs(settings.recovery_timeout_secs),
            },
            requests_per_second: settings.requests_per_second,
            max_burst: settings.max_burst,
        }
    }
}

/// Outcome of the availability probe
#[derive(Debug, Clone, PartialEq, Eq)]
struct Probe {
    /// Program to invoke, when available
    program: Option<String>,
    version: Option<String>,
    path: Option<PathBuf>,
}

/// Backend invoking one command-line tool
pub struct CliBackend {
    kind: BackendKind,
    runner: Arc<dyn CommandRunner>,
    limits: BackendLimits,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
    probe: Mutex<Option<Probe>>,
}

impl CliBackend {
    pub fn new(kind: BackendKind, runner: Arc<dyn CommandRunner>, limits: BackendLimits) -> Self {
        Self {
            kind,
            runner,
            breaker: CircuitBreaker::new(format!("backend:{}", kind.name()), limits.breaker),
            limiter: RateLimiter::new(limits.requests_per_second, limits.max_burst),
            limits,
            probe: Mutex::new(None),
        }
    }

    /// Every known tool sharing one runner
    pub fn all(runner: Arc<dyn CommandRunner>, limits: BackendLimits) -> Vec<CliBackend> {
        BackendKind::ALL
            .into_iter()
            .map(|kind| CliBackend::new(kind, runner.clone(), limits))
            .collect()
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Forget the cached availability probe
    pub fn clear_cache(&self) {
        *self.probe.lock() = None;
    }

    async fn probe(&self) -> Probe {
        if let Some(probe) = self.probe.lock().clone() {
            return probe;
        }

        let probe = self.detect().await;
        debug!(
            backend = self.kind.name(),
            available = probe.program.is_some(),
            "probed analysis backend"
        );
        *self.probe.lock() = Some(probe.clone());
        probe
    }

    async fn detect(&self) -> Probe {
        let command = self.kind.command();
        let version_args = ["--version".to_string()];

        if let Ok(output) = self
            .runner
            .run(self.kind.name(), command, &version_args, PROBE_TIMEOUT)
            .await
        {
            if output.success() {
                let version = output.stdout.lines().next().map(|l| l.trim().to_string());
                return Probe {
                    program: Some(command.to_string()),
                    version: version.filter(|v| !v.is_empty()),
                    path: self.runner.find_program(command),
                };
            }
        }

        std::iter::once(command)
            .chain(self.kind.alternates().iter().copied())
            .find_map(|name| self.runner.find_program(name))
            .map(|path| Probe {
                program: Some(path.to_string_lossy().into_owned()),
                version: None,
                path: Some(path),
            })
            .unwrap_or(Probe {
                program: None,
                version: None,
                path: None,
            })
    }

    async fn invoke(&self, program: &str, prompt: String) -> Result<CommandOutput, AnalysisError> {
        let name = self.kind.name();
        let args = self.kind.prompt_args(prompt);
        let policy = RetryPolicy::new(self.limits.max_attempts).with_base_delay(Duration::from_secs(1));

        retry(
            &policy,
            || {
                let args = &args;
                async move {
                    self.breaker
                        .call(|| async {
                            self.limiter.acquire().await;
                            let output = self
                                .runner
                                .run(name, program, args, self.limits.timeout)
                                .await?;
                            if output.success() {
                                Ok::<_, AnalysisError>(output)
                            } else {
                                Err(AnalysisError::CommandFailed {
                                    backend: name.to_string(),
                                    code: output.code,
                                    stderr: output.stderr.trim().to_string(),
                                })
                            }
                        })
                        .await
                        .map_err(|e| match e {
                            BreakerError::Open { retry_after } => AnalysisError::CircuitOpen {
                                backend: name.to_string(),
                                retry_after,
                            },
                            BreakerError::Inner(e) => e,
                        })
                }
            },
            AnalysisError::is_retryable,
        )
        .await
    }
}

#[async_trait]
impl AnalysisBackend for CliBackend {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn priority(&self) -> u32 {
        self.kind.priority()
    }

    fn capabilities(&self) -> &[AnalysisType] {
        &AnalysisType::ALL
    }

    async fn is_available(&self) -> bool {
        self.probe().await.program.is_some()
    }

    async fn info(&self) -> BackendInfo {
        let probe = self.probe().await;
        BackendInfo {
            name: self.kind.name().to_string(),
            available: probe.program.is_some(),
            version: probe.version,
            path: probe.path,
            priority: self.kind.priority(),
        }
    }

    async fn analyze(&self, context: &AnalysisContext) -> Result<AnalysisResult, AnalysisError> {
        let name = self.kind.name();
        if !self.supports(context.analysis_type) {
            return Err(AnalysisError::Unsupported {
                backend: name.to_string(),
                analysis_type: context.analysis_type.to_string(),
            });
        }
        let program = self
            .probe()
            .await
            .program
            .ok_or_else(|| AnalysisError::unavailable(name))?;

        let started = Instant::now();
        info!(
            backend = name,
            analysis = %context.analysis_type,
            packages = context.packages.len(),
            "running analysis backend"
        );
        let output = self.invoke(&program, build_prompt(context)).await.map_err(|e| {
            warn!(backend = name, error = %e, "analysis backend failed");
            e
        })?;

        Ok(parse_response(
            name,
            context,
            &output.stdout,
            started.elapsed().as_millis() as u64,
            Utc::now(),
        ))
    }
}
