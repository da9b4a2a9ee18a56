//! Directory utilities
//!
//! Follows the XDG Base Directory specification using the `xdg` crate and
//! falls back to the platform directories from `dirs` where XDG does not
//! apply:
//! - `XDG_CONFIG_HOME` defaults to ~/.config
//! - `XDG_DATA_HOME` defaults to ~/.local/share
//! - `XDG_STATE_HOME` defaults to ~/.local/state

use std::path::PathBuf;
use xdg::BaseDirectories;

const APP_NAME: &str = "modlink";

/// Get the modlink config directory
///
/// Returns `$XDG_CONFIG_HOME/modlink` or `~/.config/modlink`
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix(APP_NAME)
        .get_config_home()
        .or_else(|| dirs::config_dir().map(|d| d.join(APP_NAME)))
}

/// Get the modlink data directory
///
/// Returns `$XDG_DATA_HOME/modlink` or `~/.local/share/modlink`
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix(APP_NAME)
        .get_data_home()
        .or_else(|| dirs::data_dir().map(|d| d.join(APP_NAME)))
}

/// Get the modlink state directory
///
/// Returns `$XDG_STATE_HOME/modlink` or `~/.local/state/modlink`
#[must_use]
pub fn state_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix(APP_NAME)
        .get_state_home()
        .or_else(|| dirs::state_dir().map(|d| d.join(APP_NAME)))
        .or_else(data_dir)
}

/// Get the default config file path
#[must_use]
pub fn default_config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Directory holding rollback logs and move logs
#[must_use]
pub fn log_dir() -> Option<PathBuf> {
    state_dir().map(|d| d.join("logs"))
}

/// Default root for rollback backups when `base_path_rollbacks` is not set
#[must_use]
pub fn rollback_dir() -> Option<PathBuf> {
    data_dir().map(|d| d.join("rollbacks"))
}
