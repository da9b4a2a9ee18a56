//! Variables command implementation
//!
//! Show every defined variable and how the application sections use them.

use anyhow::Context;
use clap::Args;
use modlink_engine::VariableUsage;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// Variables command arguments
#[derive(Debug, Args)]
pub struct VariablesCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Data structure for variable output
#[derive(Debug, Serialize)]
struct VariableData<'a> {
    defined: Vec<(&'a str, &'a str)>,
    usage: &'a VariableUsage,
}

impl Command for VariablesCommand {
    type Output = VariableUsage;

    fn execute(&self, context: &RuntimeContext) -> Result<VariableUsage> {
        let expander = context.expander();
        let usage = expander.analyze_variable_usage();
        let mut defined: Vec<(&str, &str)> = expander.expander().variables().iter().collect();
        defined.sort_unstable_by_key(|(name, _)| *name);

        let data = VariableData {
            defined,
            usage: &usage,
        };
        if self.json {
            let json = serde_json::to_string_pretty(&data)
                .context("Failed to serialize variables to JSON")?;
            println!("{json}");
        } else {
            output_pretty(&data);
        }
        Ok(usage)
    }
}

/// Output in pretty/table format
fn output_pretty(data: &VariableData<'_>) {
    let usage = data.usage;
    let max_key_len = data
        .defined
        .iter()
        .map(|(k, _)| k.len())
        .chain(usage.missing.iter().map(String::len))
        .max()
        .unwrap_or(20);

    println!("\n{}", "Defined variables:".bright_cyan().bold());
    println!("{}", "─".repeat(60).dimmed());
    for (name, value) in &data.defined {
        let count = usage.usage_count.get(*name).copied().unwrap_or(0);
        println!(
            "  {:<width$} {} {}",
            name.bright_yellow(),
            value.bright_white(),
            format!("({count} uses)").dimmed(),
            width = max_key_len
        );
    }

    if !usage.unused.is_empty() {
        println!("\n{}", "Unused variables:".bright_cyan().bold());
        println!("{}", "─".repeat(60).dimmed());
        for name in &usage.unused {
            println!("  {}", name.yellow());
        }
    }

    if !usage.missing.is_empty() {
        println!("\n{}", "Missing variables:".bright_red().bold());
        println!("{}", "─".repeat(60).dimmed());
        for name in &usage.missing {
            let locations = usage
                .usage_locations
                .get(name)
                .map(|l| l.join(", "))
                .unwrap_or_default();
            println!(
                "  {:<width$} {}",
                name.bright_red(),
                locations.dimmed(),
                width = max_key_len
            );
        }
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
    fn test_usage_reports_missing_and_unused() {
        let config = Config::from_toml_str(
            r#"
[library_path]
base_path_library = "/lib"
unused_root = "/unused"

[App1]
Installer = "General"
Package = "app1"
base_path = [{ source = "/apps/{Package}", target = "{base_path_library}/{nope}" }]
"#,
        )
        .unwrap();
        let context = RuntimeContext::from_parts(config, PathBuf::from("config.toml"));

        let usage = VariablesCommand { json: false }.execute(&context).unwrap();
        assert_eq!(usage.missing, vec!["nope"]);
        assert!(usage.unused.contains(&"unused_root".to_string()));
        assert!(usage.used.contains(&"base_path_library".to_string()));
    }
}
