//! Terminal UI components for modlink
//!
//! Progress bars for content moves and spinners for long validation runs.

pub mod progress;

pub use progress::{ProgressBarReporter, create_progress_bar, create_spinner};
