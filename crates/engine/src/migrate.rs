//! Migration orchestration
//!
//! Moves each application's directories into the library and replaces them
//! with symlinks, one pair at a time. A failing pair never stops its
//! siblings; every filesystem mutation goes through [`System`].

use crate::expander::{ApplicationPaths, PairRole};
use crate::mover::ContentMover;
use crate::rollback::{RollbackManager, RollbackRecord};
use crate::system::System;
use indexmap::IndexMap;
use modlink_core::path::{self, PathStyle};
use modlink_core::{NoProgress, ProgressReporter};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle of a path pair during migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairState {
    /// Resolved but not yet validated
    Unvalidated,
    /// Validated, no link work done
    Validated,
    /// Source is a symlink to the target
    SymlinkOk,
    /// Nothing to migrate
    SourceMissingSkipped,
    /// Migration of this pair failed
    Failed,
}

impl PairState {
    /// Whether moving from `self` to `next` is allowed
    pub fn can_transition_to(self, next: Self) -> bool {
        use PairState::{Failed, SourceMissingSkipped, SymlinkOk, Unvalidated, Validated};
        matches!(
            (self, next),
            (_, Failed)
                | (Unvalidated, Validated)
                | (Validated, SymlinkOk | SourceMissingSkipped)
        )
    }

    /// Whether the pair ended without error
    pub fn is_ok(self) -> bool {
        self != Self::Failed
    }
}

impl fmt::Display for PairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unvalidated => "unvalidated",
            Self::Validated => "validated",
            Self::SymlinkOk => "symlink ok",
            Self::SourceMissingSkipped => "source missing, skipped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of migrating one pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairOutcome {
    /// Which list the pair came from
    pub role: PairRole,
    /// Source path
    pub source: String,
    /// Target path
    pub target: String,
    /// Final state
    pub state: PairState,
    /// Why the pair failed, if it did
    pub errors: Vec<String>,
    /// Problems that did not stop the pair
    pub warnings: Vec<String>,
    /// Number of entries moved
    pub moved: usize,
    /// Bytes moved
    pub bytes: u64,
    /// Folder holding leftovers after a failed move
    pub rollback_folder: Option<PathBuf>,
}

impl PairOutcome {
    fn new(role: PairRole, source: &str, target: &str) -> Self {
        Self {
            role,
            source: source.to_string(),
            target: target.to_string(),
            state: PairState::Unvalidated,
            errors: Vec::new(),
            warnings: Vec::new(),
            moved: 0,
            bytes: 0,
            rollback_folder: None,
        }
    }

    fn transition(&mut self, next: PairState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid pair transition {} -> {next}",
            self.state
        );
        self.state = next;
    }

    fn fail(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.transition(PairState::Failed);
    }
}

/// Result of migrating one application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationReport {
    /// Section name
    pub name: String,
    /// One outcome per pair, in migration order
    pub outcomes: Vec<PairOutcome>,
    /// Backup taken before migration, if any
    pub backup: Option<RollbackRecord>,
}

impl ApplicationReport {
    /// Whether every pair ended without error
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|o| o.state.is_ok())
    }
}

/// Result of a whole migration run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Reports by application, in processing order
    pub applications: IndexMap<String, ApplicationReport>,
}

impl MigrationReport {
    /// Whether every pair of every application succeeded
    pub fn success(&self) -> bool {
        self.applications.values().all(ApplicationReport::success)
    }

    /// Number of applications with at least one failed pair
    pub fn failed_applications(&self) -> usize {
        self.applications.values().filter(|a| !a.success()).count()
    }
}

/// Drives migration of resolved applications
pub struct Migrator<'a> {
    system: &'a dyn System,
    mover: &'a ContentMover,
    rollback: &'a RollbackManager,
    progress: &'a dyn ProgressReporter,
    style: PathStyle,
}

impl<'a> Migrator<'a> {
    /// Create a migrator
    pub fn new(
        system: &'a dyn System,
        mover: &'a ContentMover,
        rollback: &'a RollbackManager,
        style: PathStyle,
    ) -> Self {
        Self {
            system,
            mover,
            rollback,
            progress: &NoProgress,
            style,
        }
    }

    /// Report bytes moved through `progress`
    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Migrate every application in order
    pub fn migrate(&self, applications: &IndexMap<String, ApplicationPaths>) -> MigrationReport {
        let mut report = MigrationReport::default();
        for (name, paths) in applications {
            let app = self.migrate_application(name, paths);
            report.applications.insert(name.clone(), app);
        }
        report
    }

    /// Migrate every pair of one application
    pub fn migrate_application(&self, name: &str, paths: &ApplicationPaths) -> ApplicationReport {
        tracing::info!(app = name, "Processing application");
        let mut outcomes: Vec<PairOutcome> = paths
            .pairs()
            .map(|(role, pair)| {
                let mut outcome = PairOutcome::new(role, &pair.source, &pair.target);
                if pair.has_blocking_issues() {
                    for issue in pair.validation_errors.iter().filter(|i| i.is_blocking()) {
                        outcome.fail(issue.to_string());
                    }
                } else {
                    outcome.transition(PairState::Validated);
                }
                outcome
            })
            .collect();

        if !paths.create_symlinks {
            tracing::info!(app = name, "Symlink creation is disabled, nothing to migrate");
            self.rollback.log(name, "Symlink creation is disabled");
            return ApplicationReport {
                name: name.to_string(),
                outcomes,
                backup: None,
            };
        }

        let live_paths: Vec<PathBuf> = outcomes
            .iter()
            .filter(|o| o.state == PairState::Validated)
            .map(|o| PathBuf::from(&o.source))
            .collect();

        let backup = match self.rollback.prepare(self.system, name, &live_paths) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(app = name, "Failed to prepare rollback: {e}");
                self.rollback.log(name, &format!("Error occurred: {e}"));
                for outcome in outcomes.iter_mut().filter(|o| o.state.is_ok()) {
                    outcome.fail(format!("Backup failed: {e}"));
                }
                return ApplicationReport {
                    name: name.to_string(),
                    outcomes,
                    backup: None,
                };
            }
        };

        for outcome in outcomes
            .iter_mut()
            .filter(|o| o.state == PairState::Validated)
        {
            self.migrate_pair(name, outcome, backup.as_ref());
        }

        let report = ApplicationReport {
            name: name.to_string(),
            outcomes,
            backup,
        };
        if report.success() {
            tracing::info!(app = name, "Application migrated");
        } else {
            tracing::warn!(app = name, "Application migrated with errors");
        }
        report
    }

    fn migrate_pair(&self, app: &str, outcome: &mut PairOutcome, backup: Option<&RollbackRecord>) {
        let source = PathBuf::from(&outcome.source);
        let target = PathBuf::from(&outcome.target);
        self.rollback
            .log(app, &format!("Starting to process {}", source.display()));

        let mut stale_removed = false;
        if self.system.is_symlink(&source) {
            let link = match self.system.read_link(&source) {
                Ok(link) => link,
                Err(e) => return self.fail(app, outcome, &e.to_string()),
            };
            if self.points_to(&source, &link, &target) {
                tracing::info!(link = %source.display(), "Symlink already correct");
                self.rollback.log(
                    app,
                    &format!("Symlink {} already correct", source.display()),
                );
                return outcome.transition(PairState::SymlinkOk);
            }

            tracing::warn!(
                link = %source.display(),
                points_to = %link.display(),
                "Removing stale symlink"
            );
            if let Err(e) = self.system.remove_file(&source) {
                return self.fail(app, outcome, &format!("Failed to remove stale symlink: {e}"));
            }
            self.rollback
                .log(app, &format!("Removed stale symlink {}", source.display()));
            stale_removed = true;
        }

        if !stale_removed {
            if !self.system.exists(&source) {
                tracing::info!(source = %source.display(), "Source does not exist, skipping");
                self.rollback
                    .log(app, &format!("Source {} does not exist", source.display()));
                return outcome.transition(PairState::SourceMissingSkipped);
            }
            if !self.system.is_dir(&source) {
                return self.fail(
                    app,
                    outcome,
                    &format!("Source is not a directory: {}", source.display()),
                );
            }
        }

        if !self.system.exists(&target) {
            if let Err(e) = self.system.create_dir_all(&target, None) {
                return self.fail(app, outcome, &e.to_string());
            }
            self.rollback
                .log(app, &format!("Created target directory {}", target.display()));
        }

        if !stale_removed {
            let log_dir = backup.map_or(self.rollback.log_dir(), |r| r.backup_folder.as_path());
            let basename = source
                .file_name()
                .map_or_else(|| "root".into(), |n| n.to_string_lossy());
            let move_log = log_dir.join(format!("{app}_{basename}_move_log.txt"));

            let report = match self.mover.move_contents(
                self.system,
                &source,
                &target,
                Some(&move_log),
                self.progress,
            ) {
                Ok(report) => report,
                Err(e) => {
                    self.restore(app, outcome, &source, &target, &[]);
                    return self.fail(app, outcome, &e.to_string());
                }
            };
            outcome.moved = report.moved.len();
            outcome.bytes = report.bytes;
            if let Some(e) = &report.log_error {
                let warning = format!("Failed to write move log: {e}");
                self.rollback.log(app, &warning);
                outcome.warnings.push(warning);
            }

            if !report.is_success() {
                self.restore(app, outcome, &source, &target, &report.planned);
                for (item, reason) in &report.errors {
                    outcome
                        .errors
                        .push(format!("Failed to move {}: {reason}", item.display()));
                }
                return self.fail(app, outcome, "Moving contents failed");
            }
            self.rollback.log(
                app,
                &format!(
                    "Moved contents from {} to {}",
                    source.display(),
                    target.display()
                ),
            );

            if let Err(e) = self.system.remove_dir(&source) {
                return self.fail(app, outcome, &e.to_string());
            }
        }

        if let Err(e) = self.system.symlink(&target, &source) {
            self.restore(app, outcome, &source, &target, &[]);
            return self.fail(app, outcome, &e.to_string());
        }
        tracing::info!(link = %source.display(), target = %target.display(), "Created symlink");
        self.rollback.log(
            app,
            &format!(
                "Created symlink from {} to {}",
                source.display(),
                target.display()
            ),
        );
        outcome.transition(PairState::SymlinkOk);
    }

    fn fail(&self, app: &str, outcome: &mut PairOutcome, error: &str) {
        tracing::error!(app, source = %outcome.source, "{error}");
        self.rollback.log(app, &format!("Error occurred: {error}"));
        outcome.fail(error);
    }

    fn restore(
        &self,
        app: &str,
        outcome: &mut PairOutcome,
        source: &Path,
        target: &Path,
        items: &[PathBuf],
    ) {
        match self
            .rollback
            .restore(self.system, self.mover, app, source, target, items)
        {
            Ok(folder) => outcome.rollback_folder = Some(folder),
            Err(e) => {
                tracing::error!(app, "Rollback failed: {e}");
                self.rollback
                    .log(app, &format!("Error occurred: rollback failed: {e}"));
            }
        }
    }

    /// Whether the link at `source` (pointing at `link`) resolves to `target`
    fn points_to(&self, source: &Path, link: &Path, target: &Path) -> bool {
        let link = link.to_string_lossy();
        let resolved = if path::is_absolute(&link) {
            link.into_owned()
        } else {
            let base = path::parent(&source.to_string_lossy(), self.style)
                .unwrap_or_else(|| ".".to_string());
            format!("{base}{}{link}", self.style.separator())
        };
        path::normalize(&resolved, self.style)
            == path::normalize(&target.to_string_lossy(), self.style)
    }
}
