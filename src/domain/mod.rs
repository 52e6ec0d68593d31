//! Core domain models for catup
//!
//! This module contains the fundamental types used throughout the application:
//! - Version ranges and their npm semantics
//! - Catalogs of shared version pins and their validation rules
//! - Workspace packages and their catalog references
//! - The update plan with cross-catalog conflict detection

mod catalog;
mod package;
mod update_plan;
mod version_range;
mod workspace;

pub use catalog::{validate_package_name, Catalog, CatalogMode, CatalogValidation, DEFAULT_CATALOG};
pub use package::{catalog_pointer, CatalogReference, DependencyType, Package, CATALOG_PROTOCOL};
pub use update_plan::{
    classify_update, ConflictingVersion, PlannedUpdate, SkipReason, SkippedUpdate, UpdatePlan,
    UpdateType, VersionConflict,
};
pub use version_range::{parse_version, RangeKind, VersionRange};
pub use workspace::{Workspace, WorkspaceInfo};
