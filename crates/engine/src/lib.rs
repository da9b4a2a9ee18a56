//! # Modlink Engine
//!
//! Configuration expansion and migration engine for modlink.
//!
//! This crate turns a typed [`modlink_config::Config`] into concrete, validated
//! path pairs and migrates them:
//!
//! - **Variables & Expansion**: `{name}` placeholder expansion with a bounded cache,
//!   step-by-step traces and usage analysis
//! - **Validation**: Path normalization, existence, drive and cycle checks
//! - **System Abstraction**: Filesystem mutations abstracted for dry runs and testing
//! - **Migration**: Concurrent content moves, symlink creation and best-effort rollback
//! - **Reports**: Documentation and status summaries

pub mod expand;
pub mod expander;
pub mod migrate;
pub mod mover;
pub mod report;
pub mod rollback;
pub mod system;
pub mod validate;
pub mod variables;

// Re-export error types from core
pub use modlink_core::{Error, Result};

// Re-export commonly used types
pub use expand::{CacheStats, Expander, TraceStep, VariableUsage};
pub use expander::{ApplicationPaths, ConfigExpander, PairRole};
pub use migrate::{ApplicationReport, MigrationReport, Migrator, PairOutcome, PairState};
pub use mover::{ContentMover, MoveReport};
pub use report::{Documentation, StatusReport};
pub use rollback::{RollbackManager, RollbackRecord};
pub use system::{DryRunSystem, RealSystem, System};
pub use validate::{PathPair, PathValidator, ValidationIssue};
pub use variables::VariableStore;
