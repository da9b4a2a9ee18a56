//! Concurrent content mover
//!
//! Moves the entries of one directory into another on a bounded rayon pool.
//! Each top-level entry is one unit of work; failures are collected per unit
//! and never stop the others.

use crate::system::{System, tree_size};
use crate::{Error, Result};
use modlink_core::ProgressReporter;
use rayon::prelude::*;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// One entry to move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveUnit {
    /// Current location
    pub from: PathBuf,
    /// Destination
    pub to: PathBuf,
    /// Size in bytes, for progress reporting
    pub bytes: u64,
}

/// Outcome of a bulk move
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveReport {
    /// Every item that was scheduled, by source path
    pub planned: Vec<PathBuf>,
    /// Items moved successfully, by source path
    pub moved: Vec<PathBuf>,
    /// Bytes moved
    pub bytes: u64,
    /// Items that failed, with the reason
    pub errors: Vec<(PathBuf, String)>,
    /// Why the move log could not be written, if it could not
    pub log_error: Option<String>,
}

impl MoveReport {
    /// Whether every unit moved, regardless of the move log
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Moves directory contents on a dedicated worker pool
#[derive(Debug)]
pub struct ContentMover {
    pool: rayon::ThreadPool,
}

impl ContentMover {
    /// Create a mover with `workers` threads (0 uses the available parallelism)
    ///
    /// # Errors
    ///
    /// Returns an error if the thread pool cannot be built.
    pub fn new(workers: usize) -> Result<Self> {
        let workers = if workers == 0 {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        } else {
            workers
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("modlink-mover-{i}"))
            .build()
            .map_err(|e| Error::Message(format!("Failed to build worker pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Move every entry of `src` into `dst`
    ///
    /// A directory entry whose name already exists as a directory under
    /// `dst` is merged one level deep: its children move individually and
    /// the emptied directory is removed. When `move_log` is given, the list
    /// of moved items is appended to it after all workers finish. A log that
    /// cannot be written is reported in [`MoveReport::log_error`].
    ///
    /// # Errors
    ///
    /// Only listing `src` can fail the call; per-item failures are reported
    /// in [`MoveReport::errors`].
    pub fn move_contents(
        &self,
        system: &dyn System,
        src: &Path,
        dst: &Path,
        move_log: Option<&Path>,
        progress: &dyn ProgressReporter,
    ) -> Result<MoveReport> {
        let mut units = Vec::new();
        let mut merged = Vec::new();

        for entry in system.read_dir(src)? {
            let Some(name) = entry.file_name() else {
                continue;
            };
            let dest = dst.join(name);
            let real_dir = |p: &Path| system.is_dir(p) && !system.is_symlink(p);

            if real_dir(entry.as_path()) && real_dir(dest.as_path()) {
                tracing::debug!(dir = %entry.display(), "Destination exists, merging children");
                for child in system.read_dir(&entry)? {
                    if let Some(child_name) = child.file_name() {
                        units.push(unit(child.clone(), dest.join(child_name)));
                    }
                }
                merged.push(entry);
            } else {
                units.push(unit(entry, dest));
            }
        }

        let mut report = self.move_units(system, &units, progress);

        for dir in merged {
            let emptied = report
                .errors
                .iter()
                .all(|(item, _)| !item.starts_with(&dir));
            if emptied && let Err(e) = system.remove_dir(&dir) {
                report.errors.push((dir, e.to_string()));
            }
        }

        if let Some(log) = move_log
            && !system.is_dry_run()
            && let Err(e) = write_move_log(log, &report.moved)
        {
            tracing::warn!(log = %log.display(), "Failed to write move log: {e}");
            report.log_error = Some(e.to_string());
        }
        Ok(report)
    }

    /// Move prepared units concurrently
    pub fn move_units(
        &self,
        system: &dyn System,
        units: &[MoveUnit],
        progress: &dyn ProgressReporter,
    ) -> MoveReport {
        let total: u64 = units.iter().map(|u| u.bytes).sum();
        let moved_bytes = AtomicU64::new(0);
        progress.start(total, "Moving files");

        let results: Vec<std::result::Result<&MoveUnit, (PathBuf, String)>> =
            self.pool.install(|| {
                units
                    .par_iter()
                    .map(|u| {
                        if system.exists(&u.to) || system.is_symlink(&u.to) {
                            return Err((
                                u.from.clone(),
                                format!("destination already exists: {}", u.to.display()),
                            ));
                        }
                        system
                            .move_path(&u.from, &u.to)
                            .map_err(|e| (u.from.clone(), e.to_string()))?;
                        moved_bytes.fetch_add(u.bytes, Ordering::Relaxed);
                        progress.advance(u.bytes);
                        Ok(u)
                    })
                    .collect()
            });
        progress.finish();

        let mut report = MoveReport {
            planned: units.iter().map(|u| u.from.clone()).collect(),
            bytes: moved_bytes.load(Ordering::Relaxed),
            ..MoveReport::default()
        };
        for result in results {
            match result {
                Ok(u) => report.moved.push(u.from.clone()),
                Err((item, reason)) => {
                    tracing::warn!(item = %item.display(), "Failed to move: {reason}");
                    report.errors.push((item, reason));
                }
            }
        }
        report
    }
}

fn unit(from: PathBuf, to: PathBuf) -> MoveUnit {
    let bytes = tree_size(&from);
    MoveUnit { from, to, bytes }
}

/// Append the list of moved items to a log file
fn write_move_log(log: &Path, moved: &[PathBuf]) -> Result<()> {
    if let Some(parent) = log.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_at("create directory", parent, e))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)
        .map_err(|e| Error::io_at("open move log", log, e))?;

    let mut text = String::from("List of moved items:\n");
    for item in moved {
        text.push_str(&format!("  File: {}\n", item.display()));
    }
    file.write_all(text.as_bytes())
        .map_err(|e| Error::io_at("write move log", log, e))
}
