//! `mls config` – show the resolved configuration.

use anyhow::Result;
use mls_core::config::{self, SchedulerConfig};

pub fn run_config(cfg: &SchedulerConfig) -> Result<()> {
    match config::config_path() {
        Ok(path) => println!("# {}", path.display()),
        Err(_) => println!("# (no config file location available)"),
    }
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
