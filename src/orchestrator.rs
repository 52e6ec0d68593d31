//! Run orchestrator
//!
//! Coordinates one run: load workspace → fetch versions → plan → analyze.
//! Registry failures become skipped entries and analysis never fails, so
//! only workspace, configuration and client setup errors abort a run.

use crate::analysis::{
    build_context, AnalysisResult, AnalysisService, AnalysisTtls, AnalysisType, BackendDetector,
    BackendLimits, ChunkProgress, SystemRunner,
};
use crate::cache::{Cache, CacheConfig, Caches, CachesStats, REGISTRY_NAMESPACE};
use crate::cli::CliArgs;
use crate::config::Config;
use crate::domain::{UpdatePlan, WorkspaceInfo};
use crate::error::AppError;
use crate::progress::Progress;
use crate::registry::{
    CachedRegistry, FixedRegistry, HttpClient, NpmRegistry, RegistryProvider, DEFAULT_USER_AGENT,
};
use crate::resilience::CircuitBreakerConfig;
use crate::update::UpdatePlanner;
use crate::workspace::{LoadedWorkspace, SnapshotProvider, WorkspaceProvider};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of one run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorResult {
    pub workspace: WorkspaceInfo,
    pub plan: UpdatePlan,
    /// Absent when there is nothing to update
    pub analysis: Option<AnalysisResult>,
    /// Workspace and catalog warnings
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub cache: CachesStats,
}

impl OrchestratorResult {
    pub fn has_conflicts(&self) -> bool {
        self.plan.has_conflicts()
    }
}

/// Coordinates a run over injectable collaborators
pub struct Orchestrator {
    config: Config,
    caches: Caches,
    workspaces: Arc<dyn WorkspaceProvider>,
    registry: Option<Arc<dyn RegistryProvider>>,
    detector: BackendDetector,
    analysis_type: AnalysisType,
    ai_enabled: bool,
    security: Vec<String>,
    show_progress: bool,
}

impl Orchestrator {
    /// Orchestrator with the snapshot provider, the npm registry and the
    /// command-line analysis backends
    pub fn new(config: Config, caches: Caches) -> Self {
        let workspaces = Arc::new(SnapshotProvider::new(caches.workspace.clone()));
        let detector = BackendDetector::with_cli_backends(
            Arc::new(SystemRunner::new()),
            BackendLimits::from(&config.analysis),
        );
        Self {
            config,
            caches,
            workspaces,
            registry: None,
            detector,
            analysis_type: AnalysisType::default(),
            ai_enabled: true,
            security: Vec::new(),
            show_progress: false,
        }
    }

    /// Build from command-line arguments: load configuration, apply the
    /// flags on top and open the caches
    pub fn from_cli(args: &CliArgs) -> Result<Self, AppError> {
        let mut config = match &args.config {
            Some(path) => Config::load(path)?,
            None => Config::discover(args.workspace_dir())?,
        };
        args.apply_to(&mut config);
        config.validate()?;

        let caches = Caches::from_settings(&config.cache);
        Ok(Self::new(config, caches)
            .with_analysis_type(args.analysis)
            .with_ai(!args.no_ai)
            .with_security(args.security.clone())
            .with_progress(!args.quiet && !args.json))
    }

    pub fn with_workspace_provider(mut self, provider: Arc<dyn WorkspaceProvider>) -> Self {
        self.workspaces = provider;
        self
    }

    /// Use `registry` for every lookup instead of the configured one
    pub fn with_registry(mut self, registry: Arc<dyn RegistryProvider>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_detector(mut self, detector: BackendDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_analysis_type(mut self, analysis_type: AnalysisType) -> Self {
        self.analysis_type = analysis_type;
        self
    }

    pub fn with_ai(mut self, enabled: bool) -> Self {
        self.ai_enabled = enabled;
        self
    }

    /// Packages with a known advisory, added to those in the snapshot
    pub fn with_security(mut self, packages: Vec<String>) -> Self {
        self.security = packages;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    /// Run the workflow for the workspace at `path`
    pub async fn run(&self, path: &Path) -> Result<OrchestratorResult, AppError> {
        let mut progress = Progress::new(self.show_progress);

        progress.spinner("Loading workspace...");
        let loaded = self.workspaces.load_workspace(path).await;
        progress.finish_and_clear();
        let loaded = loaded?;

        let mut security = self.security.clone();
        for package in &loaded.security {
            if !security.contains(package) {
                security.push(package.clone());
            }
        }
        let planner = UpdatePlanner::new(self.config.update.to_filter(security));
        let workspace = &loaded.workspace;

        let packages = planner.packages_to_fetch(workspace);
        let registry = self.registry_for(&loaded)?;
        info!(
            workspace = workspace.name(),
            packages = packages.len(),
            "fetching versions"
        );

        progress.start(packages.len() as u64, "Fetching versions");
        let report = |done: usize, total: usize| progress.update(done, total);
        let lookup = registry.fetch_all(&packages, Some(&report)).await;
        progress.finish_and_clear();

        let plan = planner.plan(workspace, &lookup);
        debug!(
            updates = plan.updates().len(),
            skipped = plan.skipped().len(),
            conflicts = plan.conflicts().len(),
            "update plan built"
        );

        let analysis = if plan.updates().is_empty() {
            None
        } else {
            let context = build_context(self.analysis_type, &plan, workspace);
            let service = AnalysisService::new(self.detector.clone(), self.caches.analysis.clone())
                .with_settings(&self.config.analysis)
                .with_ttls(AnalysisTtls::from(&self.config.cache))
                .with_ai(self.ai_enabled);

            progress.start(1, "Analyzing updates");
            let report = |chunk: ChunkProgress| progress.chunk(chunk);
            let result = service.analyze(&context, Some(&report)).await;
            progress.finish_and_clear();
            Some(result)
        };

        Ok(OrchestratorResult {
            workspace: workspace.info(),
            warnings: workspace.warnings(),
            plan,
            analysis,
            cache: self.caches.stats(),
        })
    }

    /// Registry for this run: the injected one, the data embedded in the
    /// snapshot, or the configured npm registry
    fn registry_for(&self, loaded: &LoadedWorkspace) -> Result<CachedRegistry, AppError> {
        let settings = &self.config.registry;

        let (inner, cache): (Arc<dyn RegistryProvider>, _) = match &self.registry {
            Some(registry) => (registry.clone(), self.caches.registry.clone()),
            None if !loaded.registry.is_empty() => {
                debug!(
                    packages = loaded.registry.len(),
                    "using registry data from snapshot"
                );
                // Snapshot data must not leak into the shared registry cache
                let cache = Arc::new(Cache::new(CacheConfig::new(REGISTRY_NAMESPACE)));
                (Arc::new(FixedRegistry::new(loaded.registry.clone())), cache)
            }
            None => {
                let client = HttpClient::with_config(
                    Duration::from_secs(settings.timeout_secs),
                    DEFAULT_USER_AGENT,
                )?
                .with_max_retries(settings.max_retries);
                (
                    Arc::new(NpmRegistry::with_base_url(client, &settings.url)),
                    self.caches.registry.clone(),
                )
            }
        };

        let breaker = CircuitBreakerConfig {
            failure_threshold: settings.failure_threshold,
            recovery_timeout: Duration::from_secs(settings.recovery_timeout_secs),
        };
        Ok(CachedRegistry::new(inner, cache)
            .with_rate_limit(settings.requests_per_second, settings.max_burst)
            .with_breaker(breaker)
            .with_concurrency(settings.concurrency)
            .with_ttl(Duration::from_secs(self.config.cache.registry_ttl_secs)))
    }
}
