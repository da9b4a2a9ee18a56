//! Core behavioral traits for modlink components
//!
//! The engine reports progress through [`ProgressReporter`] so that the
//! library never depends on a terminal. The CLI plugs in an indicatif bar;
//! tests and library users can pass [`NoProgress`].

/// Byte-level progress sink for long-running moves
///
/// Implementations are shared between worker threads, so every method takes
/// `&self`.
///
/// # Examples
///
/// ```
/// use modlink_core::ProgressReporter;
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// #[derive(Default)]
/// struct Counter(AtomicU64);
///
/// impl ProgressReporter for Counter {
///     fn start(&self, _total: u64, _message: &str) {}
///     fn advance(&self, delta: u64) {
///         self.0.fetch_add(delta, Ordering::Relaxed);
///     }
///     fn finish(&self) {}
/// }
///
/// let counter = Counter::default();
/// counter.advance(42);
/// assert_eq!(counter.0.load(Ordering::Relaxed), 42);
/// ```
pub trait ProgressReporter: Send + Sync {
    /// A new batch of `total` bytes is about to be processed
    fn start(&self, total: u64, message: &str);

    /// `delta` more bytes were processed
    fn advance(&self, delta: u64);

    /// The batch finished (successfully or not)
    fn finish(&self);
}

/// Progress reporter that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn start(&self, _total: u64, _message: &str) {}

    fn advance(&self, _delta: u64) {}

    fn finish(&self) {}
}
