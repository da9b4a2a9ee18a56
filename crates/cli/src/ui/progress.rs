//! Progress bar utilities
//!
//! This module provides progress bar helpers using indicatif, and a
//! [`ProgressReporter`] that drives them from the engine's worker threads.

use indicatif::{ProgressBar, ProgressStyle};
use modlink_core::ProgressReporter;
use std::sync::{Mutex, PoisonError};

/// Create a byte progress bar for content moves
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .expect("progress bar template is valid")
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .expect("spinner template is valid"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Shows one progress bar per batch reported by the engine
///
/// A bar is created on `start` and cleared on `finish`; `advance` from any
/// worker thread updates the current bar.
#[derive(Default)]
pub struct ProgressBarReporter {
    current: Mutex<Option<ProgressBar>>,
    hidden: bool,
}

impl ProgressBarReporter {
    /// Reporter that draws to the terminal
    pub fn new() -> Self {
        Self::default()
    }

    /// Reporter that tracks progress without drawing
    pub fn hidden() -> Self {
        Self {
            current: Mutex::new(None),
            hidden: true,
        }
    }

    /// Position of the active bar, if any
    pub fn position(&self) -> Option<u64> {
        self.lock().as_ref().map(ProgressBar::position)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ProgressBarReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressBarReporter")
            .field("position", &self.position())
            .field("hidden", &self.hidden)
            .finish()
    }
}

impl ProgressReporter for ProgressBarReporter {
    fn start(&self, total: u64, message: &str) {
        let pb = if self.hidden {
            ProgressBar::hidden()
        } else {
            create_progress_bar(total, message)
        };
        pb.set_length(total);
        if let Some(previous) = self.lock().replace(pb) {
            previous.finish_and_clear();
        }
    }

    fn advance(&self, delta: u64) {
        if let Some(pb) = self.lock().as_ref() {
            pb.inc(delta);
        }
    }

    fn finish(&self) {
        if let Some(pb) = self.lock().as_ref() {
            pb.finish_and_clear();
        }
    }
}
