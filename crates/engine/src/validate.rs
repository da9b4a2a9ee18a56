//! Path pair validation
//!
//! Every resolved source/target pair goes through [`PathValidator::validate`]
//! before migration. All applicable issues are collected; nothing
//! short-circuits.

use crate::system::System;
use modlink_config::{ExpansionConfig, ValidationRules};
use modlink_core::path::{self, PathStyle};
use modlink_core::platform::{self, CURRENT_PLATFORM};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// A resolved source/target pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PathPair {
    /// Directory the application reads from (becomes the symlink)
    pub source: String,
    /// Directory in the library that receives the content
    pub target: String,
    /// Source exists and the target's parent exists
    pub exists: bool,
    /// Target relative to the source's parent, when `exists`
    pub relative_path: Option<String>,
    /// Issues found by the last validation
    pub validation_errors: Vec<ValidationIssue>,
    /// Informational messages (created directories)
    pub notes: Vec<String>,
}

impl PathPair {
    /// Create an unvalidated pair
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            ..Self::default()
        }
    }

    /// Whether any issue should stop migration of this pair
    pub fn has_blocking_issues(&self) -> bool {
        self.validation_errors.iter().any(ValidationIssue::is_blocking)
    }
}

/// A single validation problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Path longer than `max_path_length` characters
    PathTooLong {
        path: String,
        length: usize,
        max: usize,
    },
    /// Relative path while absolute paths are required
    NotAbsolute { path: String },
    /// Path does not exist and was not created
    Missing { path: String },
    /// Creating a missing path failed
    CreateFailed { path: String, reason: String },
    /// Drive letter does not refer to a mounted drive
    DriveMissing { path: String, drive: char },
    /// Source and target would form a symlink cycle
    Cycle {
        source: String,
        target: String,
        reason: String,
    },
}

impl ValidationIssue {
    /// Missing paths are recreated during migration; everything else blocks it
    pub fn is_blocking(&self) -> bool {
        !matches!(self, Self::Missing { .. })
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathTooLong { path, length, max } => {
                write!(f, "Path exceeds maximum length ({length} > {max}): {path}")
            }
            Self::NotAbsolute { path } => write!(f, "Path is not absolute: {path}"),
            Self::Missing { path } => write!(f, "Path does not exist: {path}"),
            Self::CreateFailed { path, reason } => {
                write!(f, "Failed to create directory {path}: {reason}")
            }
            Self::DriveMissing { path, drive } => {
                write!(f, "Drive {drive}: does not exist for path: {path}")
            }
            Self::Cycle {
                source,
                target,
                reason,
            } => write!(
                f,
                "Potential symlink cycle detected between {source} and {target}: {reason}"
            ),
        }
    }
}

/// Validates path pairs for one run
///
/// Remembers every source and target it has seen so that pairs from
/// different applications cannot chain into each other.
#[derive(Debug, Clone)]
pub struct PathValidator {
    rules: ValidationRules,
    style: PathStyle,
    check_drives: bool,
    seen_sources: HashSet<String>,
    seen_targets: HashSet<String>,
}

impl PathValidator {
    /// Create a validator
    pub fn new(rules: ValidationRules, expansion: &ExpansionConfig) -> Self {
        Self {
            rules,
            style: expansion.path_style,
            check_drives: expansion.validate_drive_letters,
            seen_sources: HashSet::new(),
            seen_targets: HashSet::new(),
        }
    }

    /// Rules in effect
    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Path style used for normalization
    pub fn style(&self) -> PathStyle {
        self.style
    }

    /// Forget every registered source and target
    pub fn reset(&mut self) {
        self.seen_sources.clear();
        self.seen_targets.clear();
    }

    /// Validate a pair in place
    ///
    /// Normalizes both paths, checks each one, then checks the pair for
    /// cycles. When relative paths are allowed they are resolved against the
    /// working directory first. Fills in `exists`, `relative_path` and
    /// `validation_errors`, and returns a copy of the issues.
    pub fn validate(&mut self, pair: &mut PathPair, system: &dyn System) -> Vec<ValidationIssue> {
        pair.source = self.resolve(&pair.source);
        pair.target = self.resolve(&pair.target);
        pair.validation_errors.clear();
        pair.notes.clear();

        let mut issues = Vec::new();
        for raw in [pair.source.clone(), pair.target.clone()] {
            self.check_path(&raw, system, &mut issues, &mut pair.notes);
        }
        if self.rules.detect_cycles {
            issues.extend(self.check_cycle(&pair.source, &pair.target));
        }

        let target_parent_exists = path::parent(&pair.target, self.style)
            .is_some_and(|p| system.exists(Path::new(&p)));
        pair.exists = system.exists(Path::new(&pair.source)) && target_parent_exists;
        pair.relative_path = if pair.exists {
            path::parent(&pair.source, self.style)
                .map(|base| path::relative_path(&pair.target, &base, self.style))
        } else {
            None
        };

        for issue in &issues {
            tracing::debug!(source = %pair.source, target = %pair.target, "{issue}");
        }
        pair.validation_errors.clone_from(&issues);
        issues
    }

    fn resolve(&self, raw: &str) -> String {
        let normalized = path::normalize(raw, self.style);
        if self.rules.require_absolute || path::is_absolute(&normalized) {
            return normalized;
        }
        match std::path::absolute(Path::new(&normalized)) {
            Ok(absolute) => path::normalize(&absolute.to_string_lossy(), self.style),
            Err(e) => {
                tracing::warn!(path = %normalized, "Cannot resolve relative path: {e}");
                normalized
            }
        }
    }

    fn check_path(
        &self,
        raw: &str,
        system: &dyn System,
        issues: &mut Vec<ValidationIssue>,
        notes: &mut Vec<String>,
    ) {
        let length = raw.chars().count();
        if self.rules.validate_length && length > self.rules.max_path_length {
            issues.push(ValidationIssue::PathTooLong {
                path: raw.to_string(),
                length,
                max: self.rules.max_path_length,
            });
        }

        let absolute = path::is_absolute(raw);
        if self.rules.require_absolute && !absolute {
            issues.push(ValidationIssue::NotAbsolute {
                path: raw.to_string(),
            });
        } else if self.rules.check_existence {
            self.check_existence(raw, system, issues, notes);
        }

        if self.check_drives
            && CURRENT_PLATFORM.has_drive_letters()
            && let Some(drive) = path::drive_letter(raw)
            && !platform::drive_exists(drive)
        {
            issues.push(ValidationIssue::DriveMissing {
                path: raw.to_string(),
                drive,
            });
        }
    }

    fn check_existence(
        &self,
        raw: &str,
        system: &dyn System,
        issues: &mut Vec<ValidationIssue>,
        notes: &mut Vec<String>,
    ) {
        let p = Path::new(raw);
        // A dangling symlink is still something the migration has to deal with
        if system.exists(p) || system.is_symlink(p) {
            return;
        }
        if !self.rules.create_missing {
            issues.push(ValidationIssue::Missing {
                path: raw.to_string(),
            });
            return;
        }

        match system.create_dir_all(p, Some(self.rules.create_missing_mode)) {
            Ok(()) => {
                let note = if system.is_dry_run() {
                    format!("Would create required directories for: {raw}")
                } else {
                    format!("Created required directories for: {raw}")
                };
                tracing::info!("{note}");
                notes.push(note);
            }
            Err(e) => issues.push(ValidationIssue::CreateFailed {
                path: raw.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn check_cycle(&mut self, source: &str, target: &str) -> Option<ValidationIssue> {
        let cycle = |reason: &str| ValidationIssue::Cycle {
            source: source.to_string(),
            target: target.to_string(),
            reason: reason.to_string(),
        };

        let issue = if target.starts_with(source) {
            Some(cycle("target lies inside the source"))
        } else if source.starts_with(target) {
            Some(cycle("source lies inside the target"))
        } else if self.seen_sources.contains(source) {
            Some(cycle("source is already used as a source by another pair"))
        } else if self.seen_targets.contains(source) {
            Some(cycle("source is already used as a target by another pair"))
        } else if self.seen_sources.contains(target) {
            Some(cycle("target is already used as a source by another pair"))
        } else {
            None
        };

        self.seen_sources.insert(source.to_string());
        self.seen_targets.insert(target.to_string());
        issue
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::system::{DryRunSystem, Operation, RealSystem};
    use tempfile::TempDir;

    fn validator(rules: ValidationRules) -> PathValidator {
        PathValidator::new(
            rules,
            &ExpansionConfig {
                path_style: PathStyle::Unix,
                ..ExpansionConfig::default()
            },
        )
    }

    fn no_fs_rules() -> ValidationRules {
        ValidationRules {
            check_existence: false,
            ..ValidationRules::default()
        }
    }

    #[test]
    fn test_descendant_target_is_cycle() {
        let mut v = validator(no_fs_rules());
        let mut pair = PathPair::new("/apps/app1/models", "/apps/app1/models/lib");
        let issues = v.validate(&mut pair, &RealSystem);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].to_string().contains("cycle"));
        assert!(pair.has_blocking_issues());
    }

    #[test]
    fn test_identical_paths_are_cycle() {
        let mut v = validator(no_fs_rules());
        let mut pair = PathPair::new("/data/x/", "/data/./x");
        let issues = v.validate(&mut pair, &RealSystem);
        assert!(matches!(issues.as_slice(), [ValidationIssue::Cycle { .. }]));
    }

    #[test]
    fn test_prefix_over_approximation() {
        let mut v = validator(no_fs_rules());
        let mut pair = PathPair::new("/apps/pkg", "/apps/pkg2");
        assert!(!v.validate(&mut pair, &RealSystem).is_empty());
    }

    #[test]
    fn test_registry_detects_chained_pairs() {
        let mut v = validator(no_fs_rules());
        let mut first = PathPair::new("/apps/a/models", "/lib/models");
        assert!(v.validate(&mut first, &RealSystem).is_empty());

        // Sharing a target is fine
        let mut second = PathPair::new("/apps/b/models", "/lib/models");
        assert!(v.validate(&mut second, &RealSystem).is_empty());

        // Another pair using that target as its source
        let mut third = PathPair::new("/lib/models", "/other");
        assert!(v.validate(&mut third, &RealSystem)[0]
            .to_string()
            .contains("cycle"));

        v.reset();
        let mut again = PathPair::new("/lib/models", "/other");
        assert!(v.validate(&mut again, &RealSystem).is_empty());
    }

    #[test]
    fn test_length_and_absolute_rules() {
        let mut v = validator(ValidationRules {
            check_existence: false,
            detect_cycles: false,
            max_path_length: 10,
            ..ValidationRules::default()
        });
        let mut pair = PathPair::new("relative/dir", "/short");
        let issues = v.validate(&mut pair, &RealSystem);
        assert!(issues.contains(&ValidationIssue::NotAbsolute {
            path: "relative/dir".into()
        }));
        assert!(issues.iter().any(|i| matches!(
            i,
            ValidationIssue::PathTooLong { length: 12, max: 10, .. }
        )));
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_create_missing_creates_full_chain() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("apps/app1/models");
        let target = temp.path().join("lib/deep/models");
        let mut v = validator(ValidationRules::default());
        let mut pair = PathPair::new(
            source.to_string_lossy(),
            target.to_string_lossy(),
        );

        let issues = v.validate(&mut pair, &RealSystem);
        assert!(issues.is_empty(), "{issues:?}");
        assert!(source.is_dir());
        assert!(target.is_dir());
        assert_eq!(pair.notes.len(), 2);
        assert!(pair.exists);
        assert_eq!(pair.relative_path.as_deref(), Some("../../lib/deep/models"));

        // A second check passes without creating anything
        v.reset();
        let issues = v.validate(&mut pair, &RealSystem);
        assert!(issues.is_empty());
        assert!(pair.notes.is_empty());
    }

    #[test]
    fn test_missing_without_create_is_not_blocking() {
        let temp = TempDir::new().unwrap();
        let mut v = validator(ValidationRules {
            create_missing: false,
            ..ValidationRules::default()
        });
        let mut pair = PathPair::new(
            temp.path().join("nope").to_string_lossy(),
            temp.path().join("lib").to_string_lossy(),
        );
        let issues = v.validate(&mut pair, &RealSystem);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| matches!(i, ValidationIssue::Missing { .. })));
        assert!(!pair.has_blocking_issues());
        assert!(!pair.exists);
        assert!(pair.relative_path.is_none());
    }

    #[test]
    fn test_dry_run_records_instead_of_creating() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        let target = temp.path().join("dst");
        let system = DryRunSystem::new();
        let mut v = validator(ValidationRules::default());
        let mut pair = PathPair::new(source.to_string_lossy(), target.to_string_lossy());

        assert!(v.validate(&mut pair, &system).is_empty());
        assert!(!source.exists());
        assert!(pair.notes[0].starts_with("Would create"));
        assert!(matches!(
            system.operations().as_slice(),
            [Operation::CreateDir { .. }, Operation::CreateDir { .. }]
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_create_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        std::fs::write(&file, "x").unwrap();
        let mut v = validator(ValidationRules::default());
        let mut pair = PathPair::new(
            file.join("sub").to_string_lossy(),
            temp.path().join("lib").to_string_lossy(),
        );
        let issues = v.validate(&mut pair, &RealSystem);
        assert!(matches!(issues.as_slice(), [ValidationIssue::CreateFailed { .. }]));
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_paths_are_resolved_before_cycle_check() {
        let mut v = validator(ValidationRules {
            require_absolute: false,
            ..no_fs_rules()
        });
        let mut pair = PathPair::new("models", "./models/lib");
        let issues = v.validate(&mut pair, &RealSystem);
        assert!(matches!(issues.as_slice(), [ValidationIssue::Cycle { .. }]));

        let cwd = std::env::current_dir().unwrap();
        assert!(path::is_absolute(&pair.source));
        assert_eq!(pair.source, cwd.join("models").to_string_lossy());
        assert_eq!(pair.target, cwd.join("models/lib").to_string_lossy());
    }

    #[test]
    fn test_normalizes_in_place() {
        let mut v = validator(no_fs_rules());
        let mut pair = PathPair::new("/apps//app1/./models", "\\lib\\models");
        v.validate(&mut pair, &RealSystem);
        assert_eq!(pair.source, "/apps/app1/models");
        assert_eq!(pair.target, "/lib/models");
    }
}
