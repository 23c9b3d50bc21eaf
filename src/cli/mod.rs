//! CLI module for hotdict
//!
//! Provides command-line interface for:
//! - check: Load every dictionary once and report health
//! - get: One-shot key lookup
//! - watch: Keep dictionaries fresh until interrupted

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check, get, run, run_command, watch};
pub use config::{Config, ContainerKind, DictConfig, Format};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
