//! Backend detection and selection

use super::backend::{AnalysisBackend, BackendInfo};
use super::cli_backend::{BackendLimits, CliBackend};
use super::command::CommandRunner;
use super::types::AnalysisType;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fixed set of known backends, probed together
#[derive(Clone, Default)]
pub struct BackendDetector {
    backends: Vec<Arc<dyn AnalysisBackend>>,
}

impl BackendDetector {
    /// Detector over an explicit backend list
    pub fn new(backends: Vec<Arc<dyn AnalysisBackend>>) -> Self {
        Self { backends }
    }

    /// Detector over every known command-line tool
    pub fn with_cli_backends(runner: Arc<dyn CommandRunner>, limits: BackendLimits) -> Self {
        Self::new(
            CliBackend::all(runner, limits)
                .into_iter()
                .map(|b| Arc::new(b) as Arc<dyn AnalysisBackend>)
                .collect(),
        )
    }

    pub fn backends(&self) -> &[Arc<dyn AnalysisBackend>] {
        &self.backends
    }

    /// Info of every backend, probed concurrently, in registration order
    pub async fn detect_all(&self) -> Vec<BackendInfo> {
        join_all(self.backends.iter().map(|b| b.info())).await
    }

    /// Available backends supporting `analysis_type`, highest priority first
    pub async fn available(&self, analysis_type: AnalysisType) -> Vec<Arc<dyn AnalysisBackend>> {
        let probes = join_all(self.backends.iter().map(|b| b.is_available())).await;
        let mut available: Vec<Arc<dyn AnalysisBackend>> = self
            .backends
            .iter()
            .zip(probes)
            .filter(|(backend, ok)| *ok && backend.supports(analysis_type))
            .map(|(backend, _)| backend.clone())
            .collect();
        available.sort_by(|a, b| b.priority().cmp(&a.priority()));
        available
    }

    /// Highest priority available backend, if any
    pub async fn best_available(
        &self,
        analysis_type: AnalysisType,
    ) -> Option<Arc<dyn AnalysisBackend>> {
        self.available(analysis_type).await.into_iter().next()
    }

    /// Pick the backend for one run: `preferred` when it is available and
    /// supports the analysis, otherwise the best available one. `None` means
    /// the rule engine has to answer.
    pub async fn select(
        &self,
        preferred: Option<&str>,
        analysis_type: AnalysisType,
    ) -> Option<Arc<dyn AnalysisBackend>> {
        let available = self.available(analysis_type).await;

        if let Some(preferred) = preferred {
            if let Some(backend) = available.iter().find(|b| b.name() == preferred) {
                debug!(backend = preferred, "using preferred analysis backend");
                return Some(backend.clone());
            }
            warn!(
                backend = preferred,
                "preferred analysis backend is not available, choosing another"
            );
        }

        match available.into_iter().next() {
            Some(backend) => {
                debug!(backend = backend.name(), "selected analysis backend");
                Some(backend)
            }
            None => {
                info!(analysis = %analysis_type, "no analysis backend available");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{AnalysisContext, AnalysisResult};
    use crate::error::AnalysisError;
    use async_trait::async_trait;

    struct StubBackend {
        name: &'static str,
        priority: u32,
        available: bool,
        capabilities: Vec<AnalysisType>,
    }

    fn make_stub(name: &'static str, priority: u32, available: bool) -> Arc<dyn AnalysisBackend> {
        Arc::new(StubBackend {
            name,
            priority,
            available,
            capabilities: AnalysisType::ALL.to_vec(),
        })
    }

    #[async_trait]
    impl AnalysisBackend for StubBackend {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn capabilities(&self) -> &[AnalysisType] {
            &self.capabilities
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn info(&self) -> BackendInfo {
            BackendInfo {
                name: self.name.to_string(),
                available: self.available,
                version: None,
                path: None,
                priority: self.priority,
            }
        }

        async fn analyze(&self, _context: &AnalysisContext) -> Result<AnalysisResult, AnalysisError> {
            Err(AnalysisError::unavailable(self.name))
        }
    }

    #[tokio::test]
    async fn test_best_available_by_priority() {
        let detector = BackendDetector::new(vec![
            make_stub("low", 10, true),
            make_stub("high", 90, true),
            make_stub("offline", 100, false),
        ]);
        let best = detector.best_available(AnalysisType::Impact).await.unwrap();
        assert_eq!(best.name(), "high");
    }

    #[tokio::test]
    async fn test_select_prefers_requested_backend() {
        let detector = BackendDetector::new(vec![make_stub("low", 10, true), make_stub("high", 90, true)]);
        let chosen = detector.select(Some("low"), AnalysisType::Impact).await.unwrap();
        assert_eq!(chosen.name(), "low");

        let chosen = detector.select(Some("missing"), AnalysisType::Impact).await.unwrap();
        assert_eq!(chosen.name(), "high");
    }

    #[tokio::test]
    async fn test_capabilities_filter() {
        let security_only: Arc<dyn AnalysisBackend> = Arc::new(StubBackend {
            name: "sec",
            priority: 50,
            available: true,
            capabilities: vec![AnalysisType::Security],
        });
        let detector = BackendDetector::new(vec![security_only]);
        assert!(detector.best_available(AnalysisType::Impact).await.is_none());
        assert!(detector.best_available(AnalysisType::Security).await.is_some());
    }

    #[tokio::test]
    async fn test_none_available() {
        let detector = BackendDetector::new(vec![make_stub("offline", 100, false)]);
        assert!(detector.select(None, AnalysisType::Recommend).await.is_none());

        let infos = detector.detect_all().await;
        assert_eq!(infos.len(), 1);
        assert!(!infos[0].available);
    }
}
