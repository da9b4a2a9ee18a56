//! Docs command implementation
//!
//! Generate documentation of the configuration: variables, usage, and
//! every application's resolved paths with expansion traces.

use anyhow::Context;
use clap::{Args, ValueEnum};
use modlink_engine::{Documentation, DryRunSystem};
use owo_colors::OwoColorize;
use std::path::PathBuf;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// Documentation output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DocFormat {
    /// Markdown document
    #[default]
    Markdown,
    /// Pretty-printed JSON
    Json,
}

/// Docs command arguments
#[derive(Debug, Args)]
pub struct DocsCommand {
    /// Output format
    #[arg(long, value_enum, default_value_t = DocFormat::Markdown)]
    pub format: DocFormat,

    /// Write to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl Command for DocsCommand {
    type Output = String;

    fn execute(&self, context: &RuntimeContext) -> Result<String> {
        let mut expander = context.expander();
        let docs = Documentation::generate(&mut expander, &DryRunSystem::new())?;

        let rendered = match self.format {
            DocFormat::Markdown => docs.to_markdown(),
            DocFormat::Json => docs.to_json()?,
        };

        match &self.output {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create directory {}", parent.display())
                    })?;
                }
                std::fs::write(path, &rendered)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!(
                    "{} Documentation written to {}",
                    "✓".bright_green(),
                    path.display().cyan()
                );
            }
            None => println!("{rendered}"),
        }
        Ok(rendered)
    }
}
