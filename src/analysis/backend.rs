//! Analysis backend interface

use super::types::{AnalysisContext, AnalysisResult, AnalysisType};
use crate::error::AnalysisError;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

/// What a backend reports about itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendInfo {
    pub name: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub priority: u32,
}

/// An interchangeable analysis oracle
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Name used in results, cache keys and log records
    fn name(&self) -> &str;

    /// Higher wins when several backends are available
    fn priority(&self) -> u32;

    /// Analysis types this backend answers
    fn capabilities(&self) -> &[AnalysisType];

    /// True when `analysis_type` is in [`capabilities`](Self::capabilities)
    fn supports(&self, analysis_type: AnalysisType) -> bool {
        self.capabilities().contains(&analysis_type)
    }

    /// Whether the backend can be invoked right now
    async fn is_available(&self) -> bool;

    /// Version, path and availability
    async fn info(&self) -> BackendInfo;

    /// Produce a verdict for `context`
    async fn analyze(&self, context: &AnalysisContext) -> Result<AnalysisResult, AnalysisError>;
}
