//! Base error types for modlink
//!
//! This module provides the foundation error types that all crates can use.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Base error type for shared functionality
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Filesystem operation failed on a specific path
    #[error("Failed to {operation} {}: {source}", path.display())]
    FileSystem {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The operating system refused an operation
    #[error("Permission denied: cannot {operation} {}", path.display())]
    PermissionDenied {
        operation: &'static str,
        path: PathBuf,
    },

    /// A path template could not be expanded
    #[error(
        "Error expanding variables in {context}: {reason}\n\
         Original value: {template}\n\
         Available variables: {}",
        available.join(", ")
    )]
    VariableExpansion {
        /// Where the template came from (e.g. `App1.base_path.source`)
        context: String,
        /// The template as written in the configuration
        template: String,
        /// What went wrong
        reason: String,
        /// The offending variable, when one can be named
        variable: Option<String>,
        /// Every variable name defined at the time of expansion, sorted
        available: Vec<String>,
    },

    /// A path failed validation
    #[error("Path validation failed for {}: {message}", path.display())]
    PathValidation { path: PathBuf, message: String },

    /// Unknown installer tag in an application section
    #[error(
        "Invalid installer type '{value}' in section {section}. Valid types are: {}",
        valid.join(", ")
    )]
    InstallerKind {
        section: String,
        value: String,
        valid: Vec<&'static str>,
    },

    /// Required field missing from an application section
    #[error("Missing {field} field in section {section}")]
    MissingField {
        section: String,
        field: &'static str,
    },

    /// Application section could not be parsed
    #[error("Invalid section {section}: {message}")]
    InvalidSection { section: String, message: String },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error message
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Wrap an I/O error with the operation and path it happened on
    ///
    /// Permission failures get their own variant so callers can treat them
    /// as soft failures.
    pub fn io_at(operation: &'static str, path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            Error::PermissionDenied {
                operation,
                path: path.to_path_buf(),
            }
        } else {
            Error::FileSystem {
                operation,
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Whether this error came from the operating system refusing access
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Error::PermissionDenied { .. } => true,
            Error::Io(e) | Error::FileSystem { source: e, .. } => {
                e.kind() == io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }

    /// Whether the error is scoped to a single application section
    ///
    /// Section errors skip the section; everything else aborts the run.
    pub fn is_section_error(&self) -> bool {
        matches!(
            self,
            Error::InstallerKind { .. } | Error::MissingField { .. } | Error::InvalidSection { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
