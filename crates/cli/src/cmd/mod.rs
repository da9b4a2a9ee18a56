//! Command implementations

pub mod docs;
pub mod expand;
pub mod migrate;
pub mod status;
pub mod trace;
pub mod variables;

pub use docs::{DocFormat, DocsCommand};
pub use expand::ExpandCommand;
pub use migrate::MigrateCommand;
pub use status::StatusCommand;
pub use trace::TraceCommand;
pub use variables::VariablesCommand;
