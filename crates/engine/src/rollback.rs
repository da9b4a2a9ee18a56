//! Best-effort rollback
//!
//! Before an application's directories are touched, every real directory
//! among them is copied into a timestamped backup folder. When a pair fails
//! mid-move, whatever is still left under its source is moved aside into a
//! rollback folder. Each step is appended to a per-application rollback log.

use crate::mover::{ContentMover, MoveUnit};
use crate::system::System;
use crate::{Error, Result};
use chrono::Local;
use modlink_core::NoProgress;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Backup taken before an application is migrated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackRecord {
    /// Folder holding the copies
    pub backup_folder: PathBuf,
    /// The application's rollback log
    pub log_file: PathBuf,
    /// Directories that were copied
    pub moved_items: Vec<PathBuf>,
}

/// Takes backups and writes rollback logs
#[derive(Debug)]
pub struct RollbackManager {
    root: PathBuf,
    log_dir: PathBuf,
    dry_run: bool,
    writer: Mutex<()>,
}

impl RollbackManager {
    /// Create a manager storing backups under `root` and logs under `log_dir`
    pub fn new(root: impl Into<PathBuf>, log_dir: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            root: root.into(),
            log_dir: log_dir.into(),
            dry_run,
            writer: Mutex::new(()),
        }
    }

    /// Backup root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding rollback and move logs
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Rollback log of `app`
    pub fn log_file(&self, app: &str) -> PathBuf {
        self.log_dir.join(format!("{app}_rollback.log"))
    }

    /// Append a timestamped line to the rollback log of `app`
    ///
    /// Failures to write are logged and otherwise ignored. Nothing is written
    /// in a dry run.
    pub fn log(&self, app: &str, message: &str) {
        tracing::debug!(app, "{message}");
        if self.dry_run {
            return;
        }
        let path = self.log_file(app);
        let line = format!("{}: {message}\n", Local::now().to_rfc3339());
        if let Err(e) = self.append(&path, &line) {
            tracing::warn!(path = %path.display(), "Failed to write rollback log: {e}");
        }
    }

    fn append(&self, path: &Path, text: &str) -> Result<()> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io_at("create directory", parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io_at("open", path, e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| Error::io_at("write", path, e))
    }

    /// Copy every real directory in `live_paths` into a fresh backup folder
    ///
    /// Returns `None` when nothing needs backing up or in a dry run.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup folder cannot be created or a copy fails.
    pub fn prepare(
        &self,
        system: &dyn System,
        app: &str,
        live_paths: &[PathBuf],
    ) -> Result<Option<RollbackRecord>> {
        let real_dirs: Vec<&PathBuf> = live_paths
            .iter()
            .filter(|p| system.is_dir(p) && !system.is_symlink(p))
            .collect();

        if real_dirs.is_empty() {
            tracing::info!(app, "No rollback needed as no changes are required.");
            self.log(app, "No rollback needed as no changes are required.");
            return Ok(None);
        }

        let backup_folder = self
            .root
            .join(app)
            .join(format!("rollback_{}", Local::now().format("%Y%m%d_%H%M%S")));

        if self.dry_run {
            tracing::info!(
                app,
                folder = %backup_folder.display(),
                "Would back up {} directories",
                real_dirs.len()
            );
            return Ok(None);
        }

        system.create_dir_all(&backup_folder, None)?;
        let mut used = HashSet::new();
        let mut moved_items = Vec::with_capacity(real_dirs.len());
        for dir in real_dirs {
            let dest = backup_folder.join(unique_name(dir, &mut used));
            let bytes = system.copy_tree(dir, &dest)?;
            tracing::debug!(from = %dir.display(), to = %dest.display(), bytes, "Backed up");
            moved_items.push(dir.clone());
        }

        tracing::info!(app, folder = %backup_folder.display(), "Rollback preparation completed");
        self.log(app, "Rollback preparation completed");
        Ok(Some(RollbackRecord {
            backup_folder,
            log_file: self.log_file(app),
            moved_items,
        }))
    }

    /// Move every planned item still under `source` into a rollback folder
    ///
    /// Returns the rollback folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback folder or its log cannot be created.
    pub fn restore(
        &self,
        system: &dyn System,
        mover: &ContentMover,
        app: &str,
        source: &Path,
        target: &Path,
        items: &[PathBuf],
    ) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let target_name = target
            .file_name()
            .map_or_else(|| "root".to_string(), |n| n.to_string_lossy().into_owned());
        let folder = self
            .root
            .join(app)
            .join(format!("rollback_{stamp}-{target_name}"));

        tracing::warn!(app, source = %source.display(), "Rolling back into {}", folder.display());
        self.log(app, &format!("Starting rollback of {}", source.display()));
        if self.dry_run {
            return Ok(folder);
        }

        system.create_dir_all(&folder, None)?;
        let local_log = folder.join("rollback_log.txt");
        self.append(
            &local_log,
            &format!(
                "Rollback started at {}\nSource: {}\nTarget: {}\n",
                Local::now().to_rfc3339(),
                source.display(),
                target.display()
            ),
        )?;

        let mut used = HashSet::new();
        let units: Vec<MoveUnit> = items
            .iter()
            .filter(|item| item.starts_with(source))
            .filter(|item| system.exists(item) || system.is_symlink(item))
            .map(|item| MoveUnit {
                from: item.clone(),
                to: folder.join(unique_name(item, &mut used)),
                bytes: 0,
            })
            .collect();

        let report = mover.move_units(system, &units, &NoProgress);
        for item in &report.moved {
            let line = format!("Restored {} to {}", item.display(), folder.display());
            self.log(app, &line);
            self.append(&local_log, &format!("{line}\n"))?;
        }
        for (item, reason) in &report.errors {
            self.log(
                app,
                &format!("Error occurred: could not restore {}: {reason}", item.display()),
            );
        }
        if report.moved.is_empty() {
            tracing::warn!(app, "No files were moved during rollback. Rollback folder is empty");
            self.log(app, "No files were moved during rollback. Rollback folder is empty");
        }
        Ok(folder)
    }
}

/// Basename of `path`, suffixed when already taken
fn unique_name(path: &Path, used: &mut HashSet<String>) -> String {
    let base = path
        .file_name()
        .map_or_else(|| "root".to_string(), |n| n.to_string_lossy().into_owned());
    let mut name = base.clone();
    let mut n = 1;
    while !used.insert(name.clone()) {
        name = format!("{base}_{n}");
        n += 1;
    }
    name
}
