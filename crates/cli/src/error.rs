//! Error types for CLI commands
//!
//! This module defines structured error types using thiserror, providing better
//! type safety and error handling compared to using `anyhow::Error` everywhere.

use thiserror::Error;

/// Errors that can occur during command execution
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CommandError {
    /// Requested application is not in the configuration
    #[error("Unknown application '{name}'. Available applications: {}", available.join(", "))]
    UnknownApplication {
        /// The requested name
        name: String,
        /// Every application section
        available: Vec<String>,
    },

    /// Migration finished with failures
    #[error("Migration failed: {failed} out of {total} applications")]
    MigrationFailed {
        /// Number of applications with a failed pair
        failed: usize,
        /// Total number of applications processed
        total: usize,
    },

    /// User input could not be read
    #[error("Prompt failed: {0}")]
    PromptError(#[from] dialoguer::Error),

    /// Generic error (for migration from anyhow)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<modlink_core::Error> for CommandError {
    fn from(err: modlink_core::Error) -> Self {
        Self::Other(err.into())
    }
}

/// Result type alias for command operations
pub type Result<T> = std::result::Result<T, CommandError>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_migration_failed_message() {
        let error = CommandError::MigrationFailed {
            failed: 1,
            total: 3,
        };
        assert_eq!(error.to_string(), "Migration failed: 1 out of 3 applications");
    }

    #[test]
    fn test_unknown_application_lists_available() {
        let error = CommandError::UnknownApplication {
            name: "Foo".into(),
            available: vec!["App1".into(), "App2".into()],
        };
        let msg = error.to_string();
        assert!(msg.contains("'Foo'"));
        assert!(msg.contains("App1, App2"));
    }

    #[test]
    fn test_core_error_converts() {
        let core = modlink_core::Error::Config("bad".into());
        let error: CommandError = core.into();
        assert!(error.to_string().contains("bad"));
    }
}
