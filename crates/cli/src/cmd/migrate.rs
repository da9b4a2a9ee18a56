//! Migrate command implementation
//!
//! Move application model directories into the library and replace them
//! with symlinks.

use chrono::Local;
use clap::Args;
use modlink_config::Config;
use modlink_engine::system::Operation;
use modlink_engine::{
    ConfigExpander, ContentMover, DryRunSystem, MigrationReport, Migrator, PairState, RealSystem,
    RollbackManager, System,
};
use owo_colors::OwoColorize;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::{CommandError, Result};
use crate::stats::{MigrationStats, format_bytes};
use crate::ui::{ProgressBarReporter, create_spinner};

/// Label of the extra selection entry that migrates everything
const ALL_APPLICATIONS: &str = "Process all applications";

/// Migrate command arguments
#[derive(Debug, Args)]
pub struct MigrateCommand {
    /// Application section to migrate
    #[arg(value_name = "APP", conflicts_with = "all")]
    pub app: Option<String>,

    /// Migrate every application
    #[arg(long)]
    pub all: bool,

    /// Show what would be done without touching the filesystem
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip confirmation prompts
    #[arg(short, long)]
    pub yes: bool,

    /// Number of worker threads for moving files (0 = number of CPUs)
    #[arg(long, default_value_t = 0)]
    pub workers: usize,
}

impl MigrateCommand {
    /// Applications picked on the command line, or `None` when the user
    /// has to choose interactively
    fn selection(&self, available: &[&str]) -> Result<Option<Vec<String>>> {
        if self.all {
            return Ok(Some(available.iter().map(ToString::to_string).collect()));
        }
        match &self.app {
            Some(app) if available.contains(&app.as_str()) => Ok(Some(vec![app.clone()])),
            Some(app) => Err(CommandError::UnknownApplication {
                name: app.clone(),
                available: available.iter().map(ToString::to_string).collect(),
            }),
            None => Ok(None),
        }
    }
}

impl Command for MigrateCommand {
    type Output = MigrationStats;

    fn execute(&self, context: &RuntimeContext) -> Result<MigrationStats> {
        let available = context.config.application_names();
        if available.is_empty() {
            println!(
                "{} No application sections in {}",
                "Warning:".yellow(),
                context.config_file.display()
            );
            return Ok(MigrationStats::default());
        }

        let names = match self.selection(&available)? {
            Some(names) => names,
            None => prompt_selection(&available)?,
        };

        if !self.yes && !self.dry_run && !confirm(&names)? {
            println!("Cancelled.");
            return Ok(MigrationStats::default());
        }

        let mut expander = ConfigExpander::new(restrict_config(&context.config, &names));
        let dry_system = DryRunSystem::new();
        let system: &dyn System = if self.dry_run { &dry_system } else { &RealSystem };

        let started = Local::now();
        println!(
            "{} {}",
            "Migration started at".bright_cyan().bold(),
            started.format("%Y-%m-%d %H:%M:%S")
        );
        if self.dry_run {
            println!("{}", "Dry run: no files will be changed".yellow());
        }

        let spinner = create_spinner("Validating paths...");
        let applications = expander.process_configuration(system);
        spinner.finish_and_clear();
        let applications = applications?;

        for (section, error) in expander.section_errors() {
            println!("{} {section}: {error}", "Skipped".yellow());
        }

        let mover = ContentMover::new(self.workers)?;
        let rollback = RollbackManager::new(
            context.rollback_root(&expander),
            context.log_dir(),
            self.dry_run,
        );
        tracing::debug!(
            workers = mover.workers(),
            rollback_root = %rollback.root().display(),
            "Starting migration"
        );

        let progress = ProgressBarReporter::new();
        let report = Migrator::new(
            system,
            &mover,
            &rollback,
            expander.config().expansion.path_style,
        )
        .with_progress(&progress)
        .migrate(&applications);

        print_report(&report);
        if self.dry_run {
            print_planned(&dry_system.operations());
        }

        let stats = MigrationStats::from_report(&report);
        println!();
        stats.print_summary(self.dry_run);

        let finished = Local::now();
        println!(
            "{} {} ({}s)",
            "Migration finished at".bright_cyan().bold(),
            finished.format("%Y-%m-%d %H:%M:%S"),
            (finished - started).num_seconds()
        );

        if report.success() {
            println!("{}", "Migration completed successfully".bright_green());
            Ok(stats)
        } else {
            println!(
                "{} Check the logs for details: {}",
                "Some errors occurred during migration.".bright_red(),
                rollback.log_dir().display()
            );
            Err(CommandError::MigrationFailed {
                failed: report.failed_applications(),
                total: report.applications.len(),
            })
        }
    }
}

/// Ask which application to migrate
fn prompt_selection(available: &[&str]) -> Result<Vec<String>> {
    use dialoguer::{Select, theme::ColorfulTheme};

    let mut items: Vec<&str> = available.to_vec();
    items.push(ALL_APPLICATIONS);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select the application to migrate")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(selected_names(available, selection))
}

/// Names for a selection index where the last index means "all"
fn selected_names(available: &[&str], selection: usize) -> Vec<String> {
    match available.get(selection) {
        Some(name) => vec![(*name).to_string()],
        None => available.iter().map(ToString::to_string).collect(),
    }
}

/// Two confirmations before anything is moved
fn confirm(names: &[String]) -> Result<bool> {
    use dialoguer::{Confirm, theme::ColorfulTheme};

    let theme = ColorfulTheme::default();
    println!("Applications to migrate: {}", names.join(", ").cyan());

    let proceed = Confirm::with_theme(&theme)
        .with_prompt(
            "Model directories will be moved into the library and replaced with symlinks. Continue?",
        )
        .default(false)
        .interact()?;
    if !proceed {
        return Ok(false);
    }

    Ok(Confirm::with_theme(&theme)
        .with_prompt("Are all of these applications closed?")
        .default(false)
        .interact()?)
}

/// Copy of `config` holding only the selected application sections
fn restrict_config(config: &Config, names: &[String]) -> Config {
    let mut config = config.clone();
    config.sections.retain(|name, _| names.contains(name));
    config
}

fn print_report(report: &MigrationReport) {
    for (name, app) in &report.applications {
        let marker = if app.success() {
            "●".bright_green().to_string()
        } else {
            "●".bright_red().to_string()
        };
        println!("\n{marker} {}", name.bold());

        for outcome in &app.outcomes {
            let state = match outcome.state {
                PairState::SymlinkOk => outcome.state.to_string().green().to_string(),
                PairState::Failed => outcome.state.to_string().red().to_string(),
                _ => outcome.state.to_string().dimmed().to_string(),
            };
            println!(
                "  {} {} {} [{state}]",
                outcome.source,
                "→".dimmed(),
                outcome.target
            );
            if outcome.moved > 0 {
                println!(
                    "    {}",
                    format!("{} items, {}", outcome.moved, format_bytes(outcome.bytes)).dimmed()
                );
            }
            for error in &outcome.errors {
                println!("    {} {error}", "✗".red());
            }
            for warning in &outcome.warnings {
                println!("    {} {warning}", "!".yellow());
            }
            if let Some(folder) = &outcome.rollback_folder {
                println!("    Leftovers moved to {}", folder.display().cyan());
            }
        }
        if let Some(backup) = &app.backup {
            println!(
                "  Backup: {}",
                backup.backup_folder.display().to_string().dimmed()
            );
        }
    }
}

fn print_planned(operations: &[Operation]) {
    if operations.is_empty() {
        return;
    }
    println!("\n{}", "Planned operations:".bright_cyan().bold());
    println!("{}", "─".repeat(60).dimmed());
    for op in operations {
        println!("  {op}");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn command() -> MigrateCommand {
        MigrateCommand {
            app: None,
            all: false,
            dry_run: true,
            yes: true,
            workers: 1,
        }
    }

    #[test]
    fn test_selection_all() {
        let cmd = MigrateCommand {
            all: true,
            ..command()
        };
        assert_eq!(
            cmd.selection(&["App1", "App2"]).unwrap(),
            Some(vec!["App1".to_string(), "App2".to_string()])
        );
    }

    #[test]
    fn test_selection_unknown_app() {
        let cmd = MigrateCommand {
            app: Some("Nope".into()),
            ..command()
        };
        let err = cmd.selection(&["App1"]).unwrap_err();
        assert!(matches!(err, CommandError::UnknownApplication { .. }));
    }

    #[test]
    fn test_selection_requires_prompt() {
        assert_eq!(command().selection(&["App1"]).unwrap(), None);
    }

    #[test]
    fn test_last_entry_selects_everything() {
        let available = ["App1", "App2"];
        assert_eq!(selected_names(&available, 1), vec!["App2"]);
        assert_eq!(selected_names(&available, 2), vec!["App1", "App2"]);
    }

    #[test]
    fn test_restrict_config_keeps_selected_sections() {
        let config = Config::from_toml_str(
            r#"
[App1]
Installer = "General"
Package = "a"

[App2]
Installer = "General"
Package = "b"
"#,
        )
        .unwrap();
        let restricted = restrict_config(&config, &["App2".to_string()]);
        assert_eq!(restricted.application_names(), vec!["App2"]);
    }

    #[test]
    fn test_dry_run_execute_leaves_tree_alone() {
        let temp = TempDir::new().unwrap();
        let models = temp.path().join("apps/models");
        fs::create_dir_all(&models).unwrap();
        fs::write(models.join("m.bin"), "m").unwrap();

        let config = Config::from_toml_str(&format!(
            r"
[library_path]
lib = '{lib}'

[App1]
Installer = 'General'
Package = 'app1'
create_sym_links = true
base_path = [{{ source = '{models}', target = '{{lib}}' }}]
",
            lib = temp.path().join("lib").display(),
            models = models.display(),
        ))
        .unwrap();
        let context = RuntimeContext::from_parts(config, temp.path().join("config.toml"));

        let stats = MigrateCommand {
            app: Some("App1".into()),
            ..command()
        }
        .execute(&context)
        .unwrap();

        assert_eq!(stats.symlinked(), 1);
        assert!(!models.is_symlink());
        assert!(models.join("m.bin").is_file());
        assert!(!temp.path().join("lib").exists());
    }
}
