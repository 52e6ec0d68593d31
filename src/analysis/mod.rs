//! Update analysis through interchangeable backends
//!
//! This module provides:
//! - Request and verdict types shared by every backend
//! - Command-line backends (claude, gemini, codex) run as subprocesses
//! - A deterministic rule engine that answers when nothing else can
//! - Detection of available backends by priority
//! - The analysis service: caching, chunking and graceful degradation

mod backend;
mod cli_backend;
mod command;
mod detector;
mod fallback;
mod prompt;
mod service;
mod types;

pub use backend::{AnalysisBackend, BackendInfo};
pub use cli_backend::{BackendKind, BackendLimits, CliBackend};
pub use command::{find_in_path, CommandOutput, CommandRunner, SystemRunner};
pub use detector::BackendDetector;
pub use fallback::{
    is_low_confidence, RuleEngine, LOW_CONFIDENCE_THRESHOLD, RULE_ENGINE_CONFIDENCE,
    RULE_ENGINE_NAME,
};
pub use prompt::{build_prompt, degraded_result, parse_response, DEGRADED_CONFIDENCE};
pub use service::{
    build_context, cache_key, context_hash, AnalysisService, AnalysisTtls, ChunkProgress,
    ChunkProgressFn, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_THRESHOLD,
};
pub use types::{
    Action, AnalysisContext, AnalysisResult, AnalysisType, PackageUnderReview, Recommendation,
    RiskLevel,
};
