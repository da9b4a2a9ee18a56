//! modlink CLI library
//!
//! This library contains all the CLI logic for modlink, making it reusable
//! for testing and integration with other tools.

pub mod cmd;
pub mod command;
pub mod common;
pub mod error;
pub mod stats;
pub mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cmd::{
    DocsCommand, ExpandCommand, MigrateCommand, StatusCommand, TraceCommand, VariablesCommand,
};
use command::Command;
use common::RuntimeContext;

/// modlink - relocate AI model directories into a shared library
#[derive(Parser)]
#[command(name = "modlink")]
#[command(about = "Move model directories into a shared library and link them back")]
#[command(version)]
#[command(long_about = "Move model directories into a shared library and link them back

Each application section of the configuration lists source directories and
the library locations they belong in. modlink expands the path templates,
validates every pair, backs the sources up, moves their contents and leaves
a symlink behind.")]
pub struct Cli {
    /// Path to the config file
    #[arg(long, env = "MODLINK_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output (shows DEBUG level logs)
    #[arg(short, long)]
    pub verbose: bool,

    /// Write logs to a file (useful for debugging)
    #[arg(long, env = "MODLINK_LOG_FILE", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for modlink CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Move application directories into the library and symlink them
    Migrate(MigrateCommand),

    /// Show every application's expanded and validated paths
    Expand(ExpandCommand),

    /// Show defined variables and how sections use them
    Variables(VariablesCommand),

    /// Trace the expansion of a template step by step
    Trace(TraceCommand),

    /// Generate documentation of the configuration
    Docs(DocsCommand),

    /// Summarize validation, variable usage and cache statistics
    Status(StatusCommand),
}

/// Execute the command based on the command type
fn execute_command(command: Commands, context: &RuntimeContext) -> Result<()> {
    match command {
        Commands::Migrate(migrate_cmd) => {
            migrate_cmd.execute(context)?;
        }
        Commands::Expand(expand_cmd) => {
            expand_cmd.execute(context)?;
        }
        Commands::Variables(vars_cmd) => {
            vars_cmd.execute(context)?;
        }
        Commands::Trace(trace_cmd) => {
            trace_cmd.execute(context)?;
        }
        Commands::Docs(docs_cmd) => {
            docs_cmd.execute(context)?;
        }
        Commands::Status(status_cmd) => {
            status_cmd.execute(context)?;
        }
    }
    Ok(())
}

/// Main entry point for the CLI application
///
/// # Errors
///
/// Returns an error if logging cannot be initialized, the configuration
/// cannot be loaded, or the command fails.
pub fn run(cli: Cli) -> Result<()> {
    // Initialize logging based on verbosity
    modlink_config::logging::init(cli.verbose, cli.log_file.as_deref())?;

    let config_file = common::resolve_config_path(cli.config.as_deref())?;
    tracing::debug!(config = %config_file.display(), "Loading configuration");
    let context = RuntimeContext::load(&config_file)?;

    execute_command(cli.command, &context)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate_flags() {
        let cli = Cli::try_parse_from([
            "modlink", "--config", "/tmp/c.toml", "migrate", "App1", "-n", "-y", "--workers", "4",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        let Commands::Migrate(cmd) = cli.command else {
            panic!("expected migrate");
        };
        assert_eq!(cmd.app.as_deref(), Some("App1"));
        assert!(cmd.dry_run);
        assert!(cmd.yes);
        assert_eq!(cmd.workers, 4);
    }

    #[test]
    fn test_app_conflicts_with_all() {
        assert!(Cli::try_parse_from(["modlink", "migrate", "App1", "--all"]).is_err());
    }

    #[test]
    fn test_parse_docs_format() {
        let cli = Cli::try_parse_from(["modlink", "docs", "--format", "json"]).unwrap();
        let Commands::Docs(cmd) = cli.command else {
            panic!("expected docs");
        };
        assert_eq!(cmd.format, cmd::DocFormat::Json);
        assert!(cmd.output.is_none());
    }
}
