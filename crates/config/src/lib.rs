//! Configuration management for modlink
//!
//! This crate handles:
//! - Configuration loading and section parsing
//! - Path validation rules
//! - XDG directory management
//! - Logging initialization

pub mod config;
pub mod dirs;
pub mod logging;
pub mod rules;

// Re-export error types from core
pub use modlink_core::{Error, PathStyle, Result};

// Re-export main types
pub use config::{
    ApplicationSection, Config, ExpansionConfig, InstallerKind, PathTemplatePair, RESERVED_KEYS,
};
pub use dirs::{data_dir, default_config_file, log_dir, rollback_dir, state_dir};
pub use rules::ValidationRules;
