//! Configuration expansion driver
//!
//! Turns every application section of a [`Config`] into validated
//! [`ApplicationPaths`].

use crate::expand::{CacheStats, Expander, TraceStep, VariableUsage};
use crate::system::System;
use crate::validate::{PathPair, PathValidator};
use crate::variables::{PACKAGE_VARIABLE, VariableStore};
use crate::Result;
use indexmap::IndexMap;
use modlink_config::{ApplicationSection, Config, InstallerKind, PathTemplatePair};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Variable naming the rollback root, when the configuration defines one
pub const ROLLBACK_VARIABLE: &str = "base_path_rollbacks";

/// Which list of an application a pair came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairRole {
    /// `base_path` entry
    Base,
    /// `outputs` entry
    Output,
    /// `special_folders` entry with its name
    Special(String),
}

impl fmt::Display for PairRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => f.write_str("base_path"),
            Self::Output => f.write_str("outputs"),
            Self::Special(name) => write!(f, "special_folders.{name}"),
        }
    }
}

/// Resolved and validated paths of one application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationPaths {
    /// Installer kind
    pub installer: InstallerKind,
    /// Package name
    pub package: String,
    /// Whether migration replaces sources with symlinks
    pub create_symlinks: bool,
    /// Resolved `base_path` pairs
    pub base_paths: Vec<PathPair>,
    /// Resolved `outputs` pairs
    pub output_paths: Vec<PathPair>,
    /// Resolved special folder pairs by name
    pub special_paths: IndexMap<String, PathPair>,
    /// False when any pair has issues
    pub validation_status: bool,
    /// Every issue prefixed by its role, or a single success message
    pub validation_messages: Vec<String>,
}

impl ApplicationPaths {
    /// Every pair in migration order: base, outputs, special folders
    pub fn pairs(&self) -> impl Iterator<Item = (PairRole, &PathPair)> {
        self.base_paths
            .iter()
            .map(|p| (PairRole::Base, p))
            .chain(self.output_paths.iter().map(|p| (PairRole::Output, p)))
            .chain(
                self.special_paths
                    .iter()
                    .map(|(name, p)| (PairRole::Special(name.clone()), p)),
            )
    }

    fn finish_validation(&mut self) {
        let messages: Vec<String> = self
            .pairs()
            .flat_map(|(role, pair)| {
                pair.validation_errors
                    .iter()
                    .map(move |issue| format!("{role}: {issue}"))
            })
            .collect();
        self.validation_status = messages.is_empty();
        self.validation_messages = if messages.is_empty() {
            vec!["All paths validated successfully".to_string()]
        } else {
            messages
        };
    }
}

/// Expands and validates a whole configuration
#[derive(Debug)]
pub struct ConfigExpander {
    config: Config,
    expander: Expander,
    validator: PathValidator,
    section_errors: IndexMap<String, String>,
}

impl ConfigExpander {
    /// Create an expander over `config`
    pub fn new(config: Config) -> Self {
        let expander = Expander::new(VariableStore::from_config(&config), &config.expansion);
        let validator = PathValidator::new(config.validation, &config.expansion);
        Self {
            config,
            expander,
            validator,
            section_errors: IndexMap::new(),
        }
    }

    /// The configuration being expanded
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying expansion engine
    pub fn expander(&self) -> &Expander {
        &self.expander
    }

    /// Sections skipped by the last [`process_configuration`](Self::process_configuration), with the reason
    pub fn section_errors(&self) -> &IndexMap<String, String> {
        &self.section_errors
    }

    /// Resolve and validate every application section
    ///
    /// Invalid sections are logged, recorded in [`section_errors`](Self::section_errors)
    /// and skipped. Directory creation for missing paths goes through `system`.
    ///
    /// # Errors
    ///
    /// Returns `VariableExpansion` as soon as any template fails to expand.
    pub fn process_configuration(
        &mut self,
        system: &dyn System,
    ) -> Result<IndexMap<String, ApplicationPaths>> {
        self.validator.reset();
        self.section_errors.clear();

        let sections: Vec<(String, Result<ApplicationSection>)> = self
            .config
            .applications()
            .map(|(name, section)| (name.to_string(), section))
            .collect();

        let mut results = IndexMap::new();
        for (name, section) in sections {
            let section = match section {
                Ok(section) => section,
                Err(e) if e.is_section_error() => {
                    tracing::error!(section = %name, "{e}");
                    self.section_errors.insert(name, e.to_string());
                    continue;
                }
                Err(e) => return Err(e),
            };

            tracing::debug!(section = %name, package = %section.package, "Processing section");
            let paths = self.with_package(&section.package, |this| {
                this.resolve_section(&section, system)
            })?;
            results.insert(name, paths);
        }
        Ok(results)
    }

    /// Bind `Package` for the duration of `f`, restoring the previous binding
    fn with_package<T>(&mut self, package: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = self.expander.define(PACKAGE_VARIABLE, package);
        let result = f(self);
        match previous {
            Some(value) => {
                self.expander.define(PACKAGE_VARIABLE, &value);
            }
            None => {
                self.expander.undefine(PACKAGE_VARIABLE);
            }
        }
        result
    }

    fn expand_pair(
        &mut self,
        section: &str,
        key: &str,
        pair: &PathTemplatePair,
    ) -> Result<PathPair> {
        let source = self
            .expander
            .expand(&pair.source, &format!("{section}.{key}.source"))?;
        let target = self
            .expander
            .expand(&pair.target, &format!("{section}.{key}.target"))?;
        Ok(PathPair::new(source, target))
    }

    fn resolve_section(
        &mut self,
        section: &ApplicationSection,
        system: &dyn System,
    ) -> Result<ApplicationPaths> {
        let name = section.name.as_str();
        let sep = self.validator.style().separator();

        let mut base_paths = section
            .base_path
            .iter()
            .map(|pair| self.expand_pair(name, "base_path", pair))
            .collect::<Result<Vec<_>>>()?;
        let mut output_paths = section
            .outputs
            .iter()
            .map(|pair| self.expand_pair(name, "outputs", pair))
            .collect::<Result<Vec<_>>>()?;

        let mut special_paths = IndexMap::new();
        if !section.special_folders.is_empty() {
            match base_paths.first().cloned() {
                Some(base) => {
                    for (folder, relative) in &section.special_folders {
                        let relative = self
                            .expander
                            .expand(relative, &format!("{name}.special_folders.{folder}"))?;
                        let pair = PathPair::new(
                            format!("{}{sep}{folder}", base.source),
                            format!("{}{sep}{relative}", base.target),
                        );
                        special_paths.insert(folder.clone(), pair);
                    }
                }
                None => tracing::warn!(
                    section = %name,
                    "special_folders ignored: section has no base_path"
                ),
            }
        }

        for pair in base_paths
            .iter_mut()
            .chain(output_paths.iter_mut())
            .chain(special_paths.values_mut())
        {
            self.validator.validate(pair, system);
        }

        let mut paths = ApplicationPaths {
            installer: section.installer,
            package: section.package.clone(),
            create_symlinks: section.create_sym_links,
            base_paths,
            output_paths,
            special_paths,
            validation_status: true,
            validation_messages: Vec::new(),
        };
        paths.finish_validation();
        if !paths.validation_status {
            tracing::warn!(
                section = %name,
                issues = paths.validation_messages.len(),
                "Validation found issues"
            );
        }
        Ok(paths)
    }

    /// Which variables are used, unused and missing
    pub fn analyze_variable_usage(&self) -> VariableUsage {
        self.expander.analyze_usage(&self.config)
    }

    /// Step-by-step expansion of `template` with the global variables
    pub fn expansion_trace(&self, template: &str) -> Vec<TraceStep> {
        self.expander.trace(template)
    }

    /// Step-by-step expansion of `template` with `Package` bound to `package`
    pub fn section_trace(&mut self, package: &str, template: &str) -> Vec<TraceStep> {
        self.with_package(package, |this| this.expander.trace(template))
    }

    /// Expansion cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.expander.cache_stats()
    }

    /// Drop every cached expansion
    pub fn clear_cache(&mut self) {
        self.expander.clear_cache();
    }

    /// Where rollback backups go
    ///
    /// `{base_path_rollbacks}` when the configuration defines it, otherwise
    /// the per-user data directory.
    pub fn rollback_root(&self) -> Option<PathBuf> {
        if self.expander.variables().contains(ROLLBACK_VARIABLE) {
            match self
                .expander
                .expand_once(&format!("{{{ROLLBACK_VARIABLE}}}"), "RollBacks")
            {
                Ok(root) => return Some(PathBuf::from(root)),
                Err(e) => tracing::warn!("{e}"),
            }
        }
        modlink_config::rollback_dir()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::system::DryRunSystem;
    use crate::Error;

    const CONFIG: &str = r#"
[library_path]
base_path_library = "/lib"
base_path_outputs = "/out"

[RollBacks]
base_path_rollbacks = "/rb"

[validation]
check_existence = false

[expansion]
path_style = "unix"

[App1]
Installer = "General"
Package = "app1"
create_sym_links = true
base_path = [{ source = "/apps/{Package}/models", target = "{base_path_library}" }]
outputs = [{ source = "/apps/{Package}/output", target = "{base_path_outputs}/{Package}" }]

[App1.special_folders]
embeddings = "textual_inversion"

[Broken]
Installer = "Flatpak"
Package = "broken"

[NoPackage]
Installer = "Pinokio"
"#;

    fn expander(toml: &str) -> ConfigExpander {
        ConfigExpander::new(Config::from_toml_str(toml).unwrap())
    }

    #[test]
    fn test_process_configuration_resolves_pairs() {
        let mut e = expander(CONFIG);
        let results = e.process_configuration(&DryRunSystem::new()).unwrap();

        assert_eq!(results.len(), 1);
        let app = &results["App1"];
        assert_eq!(app.installer, InstallerKind::General);
        assert!(app.create_symlinks);
        assert_eq!(app.base_paths[0].source, "/apps/app1/models");
        assert_eq!(app.base_paths[0].target, "/lib");
        assert_eq!(app.output_paths[0].target, "/out/app1");
        let special = &app.special_paths["embeddings"];
        assert_eq!(special.source, "/apps/app1/models/embeddings");
        assert_eq!(special.target, "/lib/textual_inversion");
        assert_eq!(app.pairs().count(), 3);
    }

    #[test]
    fn test_invalid_sections_are_skipped_and_recorded() {
        let mut e = expander(CONFIG);
        e.process_configuration(&DryRunSystem::new()).unwrap();
        let errors = e.section_errors();
        assert!(errors["Broken"].contains("Invalid installer type 'Flatpak'"));
        assert!(errors["NoPackage"].contains("Missing Package field"));
    }

    #[test]
    fn test_package_is_unbound_after_processing() {
        let mut e = expander(CONFIG);
        e.process_configuration(&DryRunSystem::new()).unwrap();
        assert!(!e.expander().variables().contains(PACKAGE_VARIABLE));
    }

    #[test]
    fn test_missing_variable_propagates_and_unbinds_package() {
        let mut e = expander(
            r#"
[library_path]
base_path_library = "/lib"

[App1]
Installer = "General"
Package = "app1"
base_path = [{ source = "/apps/app1/models", target = "{missing_var}" }]
"#,
        );
        let err = e.process_configuration(&DryRunSystem::new()).unwrap_err();
        match err {
            Error::VariableExpansion {
                variable, context, ..
            } => {
                assert_eq!(variable.as_deref(), Some("missing_var"));
                assert_eq!(context, "App1.base_path.target");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!e.expander().variables().contains(PACKAGE_VARIABLE));
    }

    #[test]
    fn test_validation_messages_are_prefixed_by_role() {
        let mut e = expander(
            r#"
[library_path]
lib = "/apps/a/models/lib"

[validation]
check_existence = false

[expansion]
path_style = "unix"

[A]
Installer = "General"
Package = "a"
base_path = { source = "/apps/a/models", target = "{lib}" }
"#,
        );
        let results = e.process_configuration(&DryRunSystem::new()).unwrap();
        let app = &results["A"];
        assert!(!app.validation_status);
        assert!(app.validation_messages[0].starts_with("base_path: "));
        assert!(app.validation_messages[0].contains("cycle"));
    }

    #[test]
    fn test_success_message_when_clean() {
        let mut e = expander(CONFIG);
        let results = e.process_configuration(&DryRunSystem::new()).unwrap();
        assert!(results["App1"].validation_status);
        assert_eq!(
            results["App1"].validation_messages,
            vec!["All paths validated successfully"]
        );
    }

    #[test]
    fn test_section_trace_binds_package() {
        let mut e = expander(CONFIG);
        let trace = e.section_trace("app1", "{base_path_outputs}/{Package}");
        assert_eq!(trace.last().unwrap().output, "/out/app1");
        assert!(!e.expander().variables().contains(PACKAGE_VARIABLE));
    }

    #[test]
    fn test_rollback_root_from_variable() {
        let e = expander(CONFIG);
        assert_eq!(e.rollback_root(), Some(PathBuf::from("/rb")));
    }

    #[test]
    fn test_repeat_processing_hits_cache() {
        let mut e = expander(CONFIG);
        e.process_configuration(&DryRunSystem::new()).unwrap();
        let first = e.cache_stats();
        e.process_configuration(&DryRunSystem::new()).unwrap();
        let second = e.cache_stats();
        assert!(second.hits > first.hits);
        e.clear_cache();
        assert_eq!(e.cache_stats().size, 0);
    }
}
