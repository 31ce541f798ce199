//! CLI command handlers. Each command is in its own file for clarity and line limit.

mod completions;
mod config;
mod man;
mod simulate;

pub use completions::run_completions;
pub use config::run_config;
pub use man::run_man;
pub use simulate::run_simulate;
