//! Expand command implementation
//!
//! Resolve every application's path templates and show the validation
//! results without touching the filesystem.

use anyhow::Context;
use clap::Args;
use indexmap::IndexMap;
use modlink_engine::{ApplicationPaths, DryRunSystem, PathPair};
use owo_colors::OwoColorize;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// Expand command arguments
#[derive(Debug, Args)]
pub struct ExpandCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

impl Command for ExpandCommand {
    type Output = IndexMap<String, ApplicationPaths>;

    fn execute(&self, context: &RuntimeContext) -> Result<Self::Output> {
        let mut expander = context.expander();
        let applications = expander.process_configuration(&DryRunSystem::new())?;

        if self.json {
            let json = serde_json::to_string_pretty(&applications)
                .context("Failed to serialize applications to JSON")?;
            println!("{json}");
        } else {
            for (name, paths) in &applications {
                print_application(name, paths);
            }
            for (section, error) in expander.section_errors() {
                println!("\n{} {section}: {error}", "Skipped".yellow());
            }
            println!();
        }
        Ok(applications)
    }
}

fn print_application(name: &str, paths: &ApplicationPaths) {
    println!(
        "\n{} {}",
        format!("{name}:").bright_cyan().bold(),
        format!("({}, package {})", paths.installer, paths.package).dimmed()
    );
    println!("{}", "─".repeat(60).dimmed());

    print_pairs("Base paths", &paths.base_paths);
    print_pairs("Outputs", &paths.output_paths);
    if !paths.special_paths.is_empty() {
        println!("  {}", "Special folders".bold());
        for (folder, pair) in &paths.special_paths {
            println!("    {}", folder.bright_yellow());
            print_pair(pair, "      ");
        }
    }

    let marker = if paths.validation_status {
        "✓".bright_green().to_string()
    } else {
        "✗".bright_red().to_string()
    };
    for message in &paths.validation_messages {
        println!("  {marker} {message}");
    }
}

fn print_pairs(title: &str, pairs: &[PathPair]) {
    if pairs.is_empty() {
        return;
    }
    println!("  {}", title.bold());
    for pair in pairs {
        print_pair(pair, "    ");
    }
}

fn print_pair(pair: &PathPair, indent: &str) {
    println!("{indent}{} {}", "source:".dimmed(), pair.source);
    println!("{indent}{} {}", "target:".dimmed(), pair.target);
    if let Some(relative) = &pair.relative_path {
        println!("{indent}{} {relative}", "relative:".dimmed());
    }
    for note in &pair.notes {
        println!("{indent}{}", note.dimmed());
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use modlink_config::Config;
    use std::path::PathBuf;

    #[test]
    fn test_expand_resolves_templates_without_creating() {
        let config = Config::from_toml_str(
            r#"
[library_path]
base_path_library = "/nonexistent-modlink/lib"

[App1]
Installer = "General"
Package = "app1"
base_path = [{ source = "/nonexistent-modlink/apps/{Package}/models", target = "{base_path_library}" }]
"#,
        )
        .unwrap();
        let context = RuntimeContext::from_parts(config, PathBuf::from("config.toml"));

        let applications = ExpandCommand { json: true }.execute(&context).unwrap();
        let pair = &applications["App1"].base_paths[0];
        assert!(pair.source.ends_with("models"));
        assert!(pair.source.contains("app1"));
        assert!(!std::path::Path::new("/nonexistent-modlink").exists());
    }
}
