//! Core types and utilities for modlink
//!
//! This is the foundation crate (Layer 0) that all other modlink crates depend on.
//! It provides:
//! - Base error types
//! - Lexical path normalization and path styles
//! - Platform detection (including drive letter probes)
//! - Core behavioral traits (progress reporting)
//!
//! This crate has no dependencies on other modlink crates.

pub mod error;
pub mod path;
pub mod platform;
pub mod traits;

pub use error::{Error, Result};
pub use path::PathStyle;
pub use traits::{NoProgress, ProgressReporter};
