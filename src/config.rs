//! Configuration: command line arguments and the optional runner config file.

pub mod cli_args;
pub mod runner_config;

pub use cli_args::CliArgs;
pub use runner_config::{RunnerConfig, TransferConfig};
