//! Analysis orchestration
//!
//! Turns an update plan into backend calls and always returns a verdict:
//! - backend selection through the detector, with the rule engine as last resort
//! - analysis cache keyed by backend, type, package moves and workspace, with
//!   a context hash guarding against reuse for a different request
//! - chunking of large batches, merged in submission order
//! - per-key single flight so identical concurrent requests hit the backend once
//! - backend verdicts reconciled with the rule engine; unreadable replies are
//!   returned but never cached

use super::backend::{AnalysisBackend, BackendInfo};
use super::detector::BackendDetector;
use super::fallback::RuleEngine;
use super::types::{AnalysisContext, AnalysisResult, AnalysisType, PackageUnderReview};
use crate::cache::{Cache, CacheStats};
use crate::config::{AnalysisSettings, CacheSettings};
use crate::domain::{DependencyType, UpdatePlan, Workspace};
use crate::resilience::{parallel_map, TaskQueue};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default package count above which a batch is chunked
pub const DEFAULT_CHUNK_THRESHOLD: usize = 15;

/// Default packages per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Progress of a chunked analysis, reported after each chunk completes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkProgress {
    pub current: usize,
    pub total: usize,
    pub percent: f64,
}

/// Chunk progress callback
pub type ChunkProgressFn<'a> = dyn Fn(ChunkProgress) + Send + Sync + 'a;

/// Cache lifetime per analysis type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisTtls {
    pub security: Duration,
    pub compatibility: Duration,
    pub default: Duration,
}

impl AnalysisTtls {
    /// Security verdicts go stale fastest, compatibility verdicts slowest
    pub fn ttl_for(&self, analysis_type: AnalysisType) -> Duration {
        match analysis_type {
            AnalysisType::Security => self.security,
            AnalysisType::Compatibility => self.compatibility,
            AnalysisType::Impact | AnalysisType::Recommend => self.default,
        }
    }
}

impl Default for AnalysisTtls {
    fn default() -> Self {
        Self::from(&CacheSettings::default())
    }
}

impl From<&CacheSettings> for AnalysisTtls {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            security: Duration::from_secs(settings.security_ttl_secs),
            compatibility: Duration::from_secs(settings.compatibility_ttl_secs),
            default: Duration::from_secs(settings.default_ttl_secs),
        }
    }
}

/// Cache key: backend, analysis type, sorted `name@current→target` moves and
/// workspace name
pub fn cache_key(backend: &str, context: &AnalysisContext) -> String {
    let mut moves: Vec<String> = context.packages.iter().map(|p| p.fingerprint()).collect();
    moves.sort();

    let mut hasher = Sha256::new();
    hasher.update(backend.as_bytes());
    hasher.update([0]);
    hasher.update(context.analysis_type.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(moves.join(",").as_bytes());
    hasher.update([0]);
    hasher.update(context.workspace.name.as_bytes());
    hex(&hasher.finalize())
}

/// Fingerprint of the full request
pub fn context_hash(context: &AnalysisContext) -> String {
    let bytes = serde_json::to_vec(context).unwrap_or_default();
    hex(&Sha256::digest(&bytes))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Analysis request for every update of `plan`
pub fn build_context(
    analysis_type: AnalysisType,
    plan: &UpdatePlan,
    workspace: &Workspace,
) -> AnalysisContext {
    let mut dependency_types: HashMap<(String, String), DependencyType> = HashMap::new();
    for reference in workspace.packages().iter().flat_map(|p| p.catalog_references()) {
        let ty = reference.dependency_type;
        dependency_types
            .entry((reference.catalog, reference.package))
            .and_modify(|existing| *existing = (*existing).min(ty))
            .or_insert(ty);
    }

    let packages = plan
        .updates()
        .iter()
        .map(|update| {
            let dependency_type = dependency_types
                .get(&(update.catalog.clone(), update.package.clone()))
                .copied()
                .unwrap_or(DependencyType::Dependencies);
            PackageUnderReview::new(
                &update.package,
                &update.current_version,
                &update.new_version,
                &update.catalog,
            )
            .with_dependency_type(dependency_type)
            .with_security_flag(update.is_security_update)
        })
        .collect();

    AnalysisContext::new(analysis_type, packages, workspace.info())
        .with_conflicts(plan.conflicts().to_vec())
}

/// Runs analyses against the best available backend
pub struct AnalysisService {
    detector: BackendDetector,
    fallback: RuleEngine,
    cache: Arc<Cache<AnalysisResult>>,
    ttls: AnalysisTtls,
    chunk_threshold: usize,
    chunk_size: usize,
    queue: TaskQueue,
    preferred: Option<String>,
    ai_enabled: bool,
    in_flight: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AnalysisService {
    /// Service with default chunking, TTLs and a concurrency of 2
    pub fn new(detector: BackendDetector, cache: Arc<Cache<AnalysisResult>>) -> Self {
        Self {
            detector,
            fallback: RuleEngine::new(),
            cache,
            ttls: AnalysisTtls::default(),
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            queue: TaskQueue::new(2),
            preferred: None,
            ai_enabled: true,
            in_flight: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Apply chunking, concurrency and backend preference from settings
    pub fn with_settings(self, settings: &AnalysisSettings) -> Self {
        self.with_chunking(settings.chunk_threshold, settings.chunk_size)
            .with_concurrency(settings.concurrency)
            .with_preferred_backend(settings.backend.clone())
    }

    pub fn with_ttls(mut self, ttls: AnalysisTtls) -> Self {
        self.ttls = ttls;
        self
    }

    /// Chunk batches larger than `threshold` into chunks of `size`
    pub fn with_chunking(mut self, threshold: usize, size: usize) -> Self {
        self.chunk_threshold = threshold;
        self.chunk_size = size.max(1);
        self
    }

    /// Cap on backend calls in flight across all analyses of this service
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.queue = TaskQueue::new(concurrency);
        self
    }

    pub fn with_preferred_backend(mut self, backend: Option<String>) -> Self {
        self.preferred = backend;
        self
    }

    /// With AI disabled every verdict comes from the rule engine
    pub fn with_ai(mut self, enabled: bool) -> Self {
        self.ai_enabled = enabled;
        self
    }

    pub fn detector(&self) -> &BackendDetector {
        &self.detector
    }

    /// Info of every registered backend
    pub async fn backend_info(&self) -> Vec<BackendInfo> {
        self.detector.detect_all().await
    }

    /// Backend calls completed so far
    pub fn completed_calls(&self) -> usize {
        self.queue.completed()
    }

    /// Analyze `context`. Never fails: backend failures and missing backends
    /// degrade to the rule engine.
    pub async fn analyze(
        &self,
        context: &AnalysisContext,
        on_progress: Option<&ChunkProgressFn<'_>>,
    ) -> AnalysisResult {
        let backend = if self.ai_enabled {
            self.detector
                .select(self.preferred.as_deref(), context.analysis_type)
                .await
        } else {
            None
        };
        let backend = backend.as_ref();

        if context.packages.len() <= self.chunk_threshold {
            let result = self.analyze_chunk(backend, context).await;
            if let Some(callback) = on_progress {
                callback(ChunkProgress {
                    current: 1,
                    total: 1,
                    percent: 100.0,
                });
            }
            return result;
        }

        let chunks: Vec<AnalysisContext> = context
            .packages
            .chunks(self.chunk_size)
            .map(|chunk| context.with_packages(chunk.to_vec()))
            .collect();
        info!(
            packages = context.packages.len(),
            chunks = chunks.len(),
            "analyzing in chunks"
        );

        let report = |current: usize, total: usize| {
            if let Some(callback) = on_progress {
                callback(ChunkProgress {
                    current,
                    total,
                    percent: current as f64 * 100.0 / total as f64,
                });
            }
        };
        let parts = parallel_map(
            chunks,
            self.queue.limit(),
            |chunk| async move { self.analyze_chunk(backend, &chunk).await },
            Some(&report),
        )
        .await;

        let name = backend.map_or(self.fallback_name(), |b| b.name().to_string());
        AnalysisResult::merge(name, context.analysis_type, parts, Utc::now())
    }

    /// Drop cached verdicts that mention any of `packages`
    pub fn invalidate_packages(&self, packages: &[String]) -> usize {
        let removed = self
            .cache
            .remove_where(|_, result| result.mentions_any(packages));
        debug!(removed, "invalidated cached analyses");
        removed
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn fallback_name(&self) -> String {
        self.fallback.name().to_string()
    }

    async fn analyze_chunk(
        &self,
        backend: Option<&Arc<dyn AnalysisBackend>>,
        context: &AnalysisContext,
    ) -> AnalysisResult {
        let Some(backend) = backend else {
            return self.fallback.evaluate(context);
        };

        let key = cache_key(backend.name(), context);
        let hash = context_hash(context);
        let flight = self.flight(&key);
        let result = {
            let _turn = flight.lock().await;
            self.analyze_uncoordinated(backend, context, &key, hash).await
        };
        drop(flight);
        self.release_flight(&key);
        result
    }

    async fn analyze_uncoordinated(
        &self,
        backend: &Arc<dyn AnalysisBackend>,
        context: &AnalysisContext,
        key: &str,
        hash: String,
    ) -> AnalysisResult {
        if let Some(hit) = self
            .cache
            .get_if(key, |entry| entry.context_hash.as_deref() == Some(hash.as_str()))
        {
            debug!(backend = backend.name(), key, "analysis cache hit");
            return hit;
        }

        match self.queue.run(backend.analyze(context)).await {
            Ok(mut result) => {
                self.fallback.reconcile(&mut result, context);
                if result.degraded {
                    warn!(
                        backend = backend.name(),
                        "unreadable analysis response, not caching"
                    );
                    return result;
                }
                self.cache.set_with_context(
                    key,
                    result.clone(),
                    Some(self.ttls.ttl_for(context.analysis_type)),
                    Some(hash),
                );
                result
            }
            Err(e) => {
                warn!(
                    backend = backend.name(),
                    error = %e,
                    "analysis backend failed, using rule engine"
                );
                let mut result = self.fallback.evaluate(context);
                result
                    .warnings
                    .insert(0, format!("{} analysis failed: {}", backend.name(), e));
                result
            }
        }
    }

    fn flight(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.in_flight
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    fn release_flight(&self, key: &str) {
        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            in_flight.remove(key);
        }
    }
}
