//! CLI command handlers, one file per command.

mod checksum;
mod completions;
mod config;
mod fetch;
mod plan;

pub use checksum::run_checksum;
pub use completions::{run_completions, run_man};
pub use config::run_config;
pub use fetch::{run_fetch, FetchArgs};
pub use plan::run_plan;
