//! Documentation and status reports
//!
//! Both reports run a full [`ConfigExpander::process_configuration`] and
//! summarize the result. Callers pass a [`DryRunSystem`](crate::system::DryRunSystem)
//! when nothing should be created on disk.

use crate::expand::{CacheStats, TraceStep, VariableUsage};
use crate::expander::{ApplicationPaths, ConfigExpander};
use crate::system::System;
use crate::{Error, Result};
use chrono::Local;
use indexmap::IndexMap;
use modlink_config::{ApplicationSection, ValidationRules};
use modlink_core::PathStyle;
use modlink_core::platform::CURRENT_PLATFORM;
use serde::Serialize;
use std::fmt::Write as _;

/// Where and when the documentation was generated
#[derive(Debug, Clone, Serialize)]
pub struct DocMetadata {
    /// RFC 3339 generation time
    pub generated_at: String,
    /// Configuration file, when loaded from disk
    pub config_file: Option<String>,
    /// `os/arch`
    pub platform: String,
    /// Path style in effect
    pub path_style: PathStyle,
    /// Validation rules in effect
    pub validation_rules: ValidationRules,
    /// Cache counters after processing
    pub cache_stats: CacheStats,
}

/// Defined variables and how they are used
#[derive(Debug, Clone, Serialize)]
pub struct VariableDoc {
    /// Every defined variable with its value
    pub defined: IndexMap<String, String>,
    /// Usage analysis
    pub usage: VariableUsage,
}

/// Expansion traces of one template pair
#[derive(Debug, Clone, Serialize)]
pub struct PairTrace {
    /// `section.key` the templates came from
    pub location: String,
    /// Source template as written
    pub source_template: String,
    /// Steps expanding the source
    pub source_trace: Vec<TraceStep>,
    /// Target template as written
    pub target_template: String,
    /// Steps expanding the target
    pub target_trace: Vec<TraceStep>,
}

/// One application in the documentation
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationDoc {
    /// Resolved and validated paths
    pub paths: ApplicationPaths,
    /// Template traces
    pub traces: Vec<PairTrace>,
}

/// Full documentation of a configuration
#[derive(Debug, Clone, Serialize)]
pub struct Documentation {
    /// Generation metadata
    pub metadata: DocMetadata,
    /// Variables
    pub variables: VariableDoc,
    /// Applications by section name
    pub applications: IndexMap<String, ApplicationDoc>,
    /// Sections that could not be processed
    pub section_errors: IndexMap<String, String>,
}

impl Documentation {
    /// Process the configuration and document the result
    ///
    /// # Errors
    ///
    /// Returns `VariableExpansion` if any template cannot be expanded.
    pub fn generate(expander: &mut ConfigExpander, system: &dyn System) -> Result<Self> {
        let results = expander.process_configuration(system)?;

        let sections: Vec<ApplicationSection> = expander
            .config()
            .applications()
            .filter_map(|(_, section)| section.ok())
            .collect();

        let mut applications = IndexMap::new();
        for (name, paths) in results {
            let traces = sections
                .iter()
                .find(|s| s.name == name)
                .map(|section| section_traces(expander, section))
                .unwrap_or_default();
            applications.insert(name, ApplicationDoc { paths, traces });
        }

        let config = expander.config();
        Ok(Self {
            metadata: DocMetadata {
                generated_at: Local::now().to_rfc3339(),
                config_file: config
                    .source_file
                    .as_ref()
                    .map(|p| p.display().to_string()),
                platform: format!("{}/{}", CURRENT_PLATFORM.os, CURRENT_PLATFORM.arch),
                path_style: config.expansion.path_style,
                validation_rules: config.validation,
                cache_stats: expander.cache_stats(),
            },
            variables: VariableDoc {
                defined: expander.expander().variables().as_map().clone(),
                usage: expander.analyze_variable_usage(),
            },
            applications,
            section_errors: expander.section_errors().clone(),
        })
    }

    /// Render as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Message(format!("Failed to serialize documentation: {e}")))
    }

    /// Render as Markdown
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let m = &self.metadata;

        let _ = writeln!(out, "# Model Path Configuration\n");
        let _ = writeln!(out, "- Generated: {}", m.generated_at);
        if let Some(file) = &m.config_file {
            let _ = writeln!(out, "- Configuration: `{file}`");
        }
        let _ = writeln!(out, "- Platform: {}", m.platform);
        let _ = writeln!(out, "- Path style: {}", m.path_style);
        let _ = writeln!(
            out,
            "- Cache: {} entries, {} hits, {} misses{}",
            m.cache_stats.size,
            m.cache_stats.hits,
            m.cache_stats.misses,
            if m.cache_stats.enabled { "" } else { " (lazy)" }
        );

        let r = &m.validation_rules;
        let _ = writeln!(out, "\n## Validation Rules\n");
        let _ = writeln!(out, "| Rule | Value |\n|---|---|");
        let _ = writeln!(out, "| check_existence | {} |", r.check_existence);
        let _ = writeln!(out, "| detect_cycles | {} |", r.detect_cycles);
        let _ = writeln!(out, "| validate_length | {} |", r.validate_length);
        let _ = writeln!(out, "| require_absolute | {} |", r.require_absolute);
        let _ = writeln!(out, "| max_path_length | {} |", r.max_path_length);
        let _ = writeln!(out, "| create_missing | {} |", r.create_missing);
        let _ = writeln!(out, "| create_missing_mode | {:#o} |", r.create_missing_mode);

        let _ = writeln!(out, "\n## Variables\n");
        let _ = writeln!(out, "| Name | Value | Uses |\n|---|---|---|");
        let usage = &self.variables.usage;
        for (name, value) in &self.variables.defined {
            let uses = usage.usage_count.get(name).copied().unwrap_or(0);
            let _ = writeln!(out, "| `{name}` | `{value}` | {uses} |");
        }
        if !usage.unused.is_empty() {
            let _ = writeln!(out, "\nUnused: {}", usage.unused.join(", "));
        }
        if !usage.missing.is_empty() {
            let _ = writeln!(out, "\nMissing:");
            for name in &usage.missing {
                let locations = usage
                    .usage_locations
                    .get(name)
                    .map(|l| l.join(", "))
                    .unwrap_or_default();
                let _ = writeln!(out, "- `{name}` ({locations})");
            }
        }

        let _ = writeln!(out, "\n## Applications");
        for (name, app) in &self.applications {
            let p = &app.paths;
            let _ = writeln!(out, "\n### {name}\n");
            let _ = writeln!(out, "- Installer: {}", p.installer);
            let _ = writeln!(out, "- Package: {}", p.package);
            let _ = writeln!(out, "- Create symlinks: {}", p.create_symlinks);
            let _ = writeln!(
                out,
                "- Validation: {}",
                if p.validation_status { "passed" } else { "failed" }
            );

            let _ = writeln!(out, "\n| Role | Source | Target | Exists |\n|---|---|---|---|");
            for (role, pair) in p.pairs() {
                let _ = writeln!(
                    out,
                    "| {role} | `{}` | `{}` | {} |",
                    pair.source, pair.target, pair.exists
                );
            }

            if !p.validation_status {
                let _ = writeln!(out, "\nIssues:");
                for message in &p.validation_messages {
                    let _ = writeln!(out, "- {message}");
                }
            }

            for trace in app.traces.iter().filter(|t| {
                t.source_trace.len() > 1 || t.target_trace.len() > 1
            }) {
                let _ = writeln!(out, "\nExpansion of `{}`:", trace.location);
                for step in trace.source_trace.iter().chain(&trace.target_trace) {
                    let _ = writeln!(out, "{}", render_step(step));
                }
            }
        }

        if !self.section_errors.is_empty() {
            let _ = writeln!(out, "\n## Skipped Sections\n");
            for (section, error) in &self.section_errors {
                let _ = writeln!(out, "- {section}: {error}");
            }
        }
        out
    }
}

fn render_step(step: &TraceStep) -> String {
    match &step.error {
        Some(error) => format!("{}. `{}` failed: {error}", step.step, step.input),
        None => format!("{}. `{}` -> `{}`", step.step, step.input, step.output),
    }
}

fn section_traces(expander: &mut ConfigExpander, section: &ApplicationSection) -> Vec<PairTrace> {
    let keyed = section
        .base_path
        .iter()
        .map(|p| ("base_path", p))
        .chain(section.outputs.iter().map(|p| ("outputs", p)));
    keyed
        .map(|(key, pair)| PairTrace {
            location: format!("{}.{key}", section.name),
            source_template: pair.source.clone(),
            source_trace: expander.section_trace(&section.package, &pair.source),
            target_template: pair.target.clone(),
            target_trace: expander.section_trace(&section.package, &pair.target),
        })
        .collect()
}

/// Validation outcome of one application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApplicationStatus {
    /// Whether every pair validated
    pub status: bool,
    /// Number of issues
    pub error_count: usize,
}

/// Variable counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VariableStats {
    /// Defined variables
    pub defined: usize,
    /// Referenced variables
    pub used: usize,
    /// Defined but unreferenced
    pub unused: usize,
    /// Referenced but undefined
    pub missing: usize,
}

/// Compact health summary of a configuration
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Configuration file, when loaded from disk
    pub config_file: Option<String>,
    /// Cache counters after processing
    pub cache_stats: CacheStats,
    /// Validation outcome by application
    pub validation_summary: IndexMap<String, ApplicationStatus>,
    /// Variable counts
    pub variable_stats: VariableStats,
    /// Sections that could not be processed
    pub section_errors: IndexMap<String, String>,
}

impl StatusReport {
    /// Process the configuration and summarize it
    ///
    /// # Errors
    ///
    /// Returns `VariableExpansion` if any template cannot be expanded.
    pub fn generate(expander: &mut ConfigExpander, system: &dyn System) -> Result<Self> {
        let results = expander.process_configuration(system)?;
        let usage = expander.analyze_variable_usage();

        let validation_summary = results
            .iter()
            .map(|(name, paths)| {
                let error_count = paths
                    .pairs()
                    .map(|(_, pair)| pair.validation_errors.len())
                    .sum();
                (
                    name.clone(),
                    ApplicationStatus {
                        status: paths.validation_status,
                        error_count,
                    },
                )
            })
            .collect();

        Ok(Self {
            config_file: expander
                .config()
                .source_file
                .as_ref()
                .map(|p| p.display().to_string()),
            cache_stats: expander.cache_stats(),
            validation_summary,
            variable_stats: VariableStats {
                defined: expander.expander().variables().len(),
                used: usage.used.len(),
                unused: usage.unused.len(),
                missing: usage.missing.len(),
            },
            section_errors: expander.section_errors().clone(),
        })
    }

    /// Whether every application validated and no section was skipped
    pub fn is_healthy(&self) -> bool {
        self.section_errors.is_empty() && self.validation_summary.values().all(|s| s.status)
    }
}
