//! Trace command implementation
//!
//! Show how a template expands, one substitution pass per step.

use clap::Args;
use modlink_engine::TraceStep;
use owo_colors::OwoColorize;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// Trace command arguments
#[derive(Debug, Args)]
pub struct TraceCommand {
    /// Template to expand, e.g. "{base_path_library}/checkpoints"
    #[arg(value_name = "TEMPLATE")]
    pub template: String,

    /// Bind {Package} to this value while tracing
    #[arg(long, value_name = "NAME")]
    pub package: Option<String>,
}

impl Command for TraceCommand {
    type Output = Vec<TraceStep>;

    fn execute(&self, context: &RuntimeContext) -> Result<Vec<TraceStep>> {
        let mut expander = context.expander();
        let steps = match &self.package {
            Some(package) => expander.section_trace(package, &self.template),
            None => expander.expansion_trace(&self.template),
        };

        println!("\n{}", "Expansion trace:".bright_cyan().bold());
        println!("{}", "─".repeat(60).dimmed());
        for step in &steps {
            print_step(step);
        }
        println!();
        Ok(steps)
    }
}

fn print_step(step: &TraceStep) {
    println!("  {} {}", format!("Step {}:", step.step).bold(), step.input);
    if !step.variables_used.is_empty() {
        println!(
            "    {} {}",
            "variables:".dimmed(),
            step.variables_used.join(", ").bright_yellow()
        );
    }
    match &step.error {
        Some(error) => println!("    {} {error}", "✗".bright_red()),
        None => println!("    {} {}", "→".dimmed(), step.output.bright_white()),
    }
}
