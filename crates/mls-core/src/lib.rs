pub mod config;
pub mod logging;

// Scheduler components
pub mod error;
pub mod network;
pub mod orchestrator;
pub mod perf;
pub mod placeholder;
pub mod platform;
pub mod priority;
pub mod request;
pub mod retry;
pub mod select;
pub mod viewport;
