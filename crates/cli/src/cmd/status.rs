//! Status command implementation
//!
//! Summarize validation results, variable usage and cache counters.

use anyhow::Context;
use clap::Args;
use modlink_engine::{DryRunSystem, StatusReport};
use owo_colors::OwoColorize;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// Status command arguments
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

impl Command for StatusCommand {
    type Output = StatusReport;

    fn execute(&self, context: &RuntimeContext) -> Result<StatusReport> {
        let mut expander = context.expander();
        let report = StatusReport::generate(&mut expander, &DryRunSystem::new())?;

        if self.json {
            let json = serde_json::to_string_pretty(&report)
                .context("Failed to serialize status to JSON")?;
            println!("{json}");
        } else {
            print_status(&report);
        }
        Ok(report)
    }
}

fn print_status(report: &StatusReport) {
    if let Some(file) = &report.config_file {
        println!("Configuration: {}", file.cyan());
    }

    println!("\n{}", "Applications:".bright_cyan().bold());
    println!("{}", "─".repeat(60).dimmed());
    let width = report
        .validation_summary
        .keys()
        .map(String::len)
        .max()
        .unwrap_or(20);
    for (name, status) in &report.validation_summary {
        if status.status {
            println!(
                "  {} {:<width$}",
                "●".bright_green(),
                name.bright_white(),
                width = width
            );
        } else {
            println!(
                "  {} {:<width$} {}",
                "●".bright_red(),
                name.bright_white(),
                format!("{} issues", status.error_count).bright_red(),
                width = width
            );
        }
    }
    for (section, error) in &report.section_errors {
        println!("  {} {section}: {error}", "○".yellow());
    }

    let vars = report.variable_stats;
    println!("\n{}", "Variables:".bright_cyan().bold());
    println!("{}", "─".repeat(60).dimmed());
    println!(
        "  {} defined, {} used, {} unused, {} missing",
        vars.defined,
        vars.used,
        vars.unused,
        if vars.missing > 0 {
            vars.missing.to_string().bright_red().to_string()
        } else {
            vars.missing.to_string()
        }
    );

    let cache = report.cache_stats;
    println!("\n{}", "Expansion cache:".bright_cyan().bold());
    println!("{}", "─".repeat(60).dimmed());
    if cache.enabled {
        println!(
            "  {}/{} entries, {} hits, {} misses",
            cache.size, cache.capacity, cache.hits, cache.misses
        );
    } else {
        println!("  {}", "disabled (lazy expansion)".dimmed());
    }
    println!();
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use modlink_config::Config;
    use std::path::PathBuf;

    #[test]
    fn test_status_reports_skipped_section() {
        let config = Config::from_toml_str(
            r#"
[library_path]
base_path_library = "/nonexistent-modlink/lib"

[App1]
Installer = "General"
Package = "app1"
base_path = [{ source = "/nonexistent-modlink/apps/app1", target = "{base_path_library}" }]

[Broken]
Installer = "NotAnInstaller"
Package = "x"
"#,
        )
        .unwrap();
        let context = RuntimeContext::from_parts(config, PathBuf::from("config.toml"));

        let report = StatusCommand { json: false }.execute(&context).unwrap();
        assert!(report.validation_summary.contains_key("App1"));
        assert!(report.section_errors.contains_key("Broken"));
        assert!(!report.is_healthy());
        assert_eq!(report.variable_stats.defined, 1);
    }
}
