//! Common utilities and types shared across CLI commands

use anyhow::{Context, Result};
use modlink_config::Config;
use modlink_engine::ConfigExpander;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runtime context for CLI commands
///
/// Holds the loaded configuration so every command works from the same
/// snapshot of the file.
///
/// # Examples
///
/// ```no_run
/// use modlink::common::RuntimeContext;
/// use std::path::Path;
///
/// let context = RuntimeContext::load(Path::new("/etc/modlink/config.toml"))?;
/// let mut expander = context.expander();
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    /// Shared configuration (uses Arc to avoid cloning)
    pub config: Arc<Config>,
    /// File the configuration was loaded from
    pub config_file: PathBuf,
}

impl RuntimeContext {
    /// Load the configuration at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let config = Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        Ok(Self::from_parts(config, path.to_path_buf()))
    }

    /// Create a context from an already-loaded configuration
    pub fn from_parts(config: Config, config_file: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_file,
        }
    }

    /// A fresh expander over the configuration
    pub fn expander(&self) -> ConfigExpander {
        ConfigExpander::new((*self.config).clone())
    }

    /// Directory for rollback and move logs
    ///
    /// Falls back to a `logs` directory next to the configuration file when
    /// no per-user state directory is available.
    pub fn log_dir(&self) -> PathBuf {
        modlink_config::log_dir().unwrap_or_else(|| {
            self.config_file
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("logs")
        })
    }

    /// Root of rollback backups
    pub fn rollback_root(&self, expander: &ConfigExpander) -> PathBuf {
        expander
            .rollback_root()
            .unwrap_or_else(|| self.log_dir().join("rollbacks"))
    }
}

/// Resolve which configuration file to use
///
/// An explicit path wins, then the per-user default location.
///
/// # Errors
///
/// Returns an error if no path was given and no default location exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(modlink_config::default_config_file)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Could not determine configuration file. Please specify with --config or set MODLINK_CONFIG."
            )
        })
}
