//! CLI command implementations

mod config;
mod run;

pub use config::{config_init, config_path, config_set, config_show};
pub use run::{run_command, RunArgs};
