pub mod commands;
pub mod config;
pub mod output;

pub use commands::{run_command, CliCommand};
pub use config::CliConfig;
