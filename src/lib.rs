//! catup - catalog version pin updater library
//!
//! This library provides the core functionality for keeping shared catalog
//! version pins current in a JavaScript monorepo:
//! - Version ranges, catalogs, workspace packages and update plans
//! - Registry lookups behind caching, rate limiting and a circuit breaker
//! - Update analysis through command-line AI backends with a rule-based fallback
//! - A generic TTL cache with optional disk persistence

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod registry;
pub mod resilience;
pub mod update;
pub mod workspace;
