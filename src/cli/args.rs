//! CLI argument definitions using clap
//!
//! Commands:
//! - hotdict check --config <path>
//! - hotdict get --config <path> --name <dict> --key <key>
//! - hotdict watch --config <path> [--report-secs <n>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hotdict - hot-reloadable in-memory dictionaries
#[derive(Parser, Debug)]
#[command(name = "hotdict")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Base-load every dictionary once and print its health
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./hotdict.json")]
        config: PathBuf,
    },

    /// Load one dictionary and look up a key
    Get {
        /// Path to configuration file
        #[arg(long, default_value = "./hotdict.json")]
        config: PathBuf,

        /// Dictionary name
        #[arg(long)]
        name: String,

        #[arg(long)]
        key: String,
    },

    /// Keep every dictionary fresh until Ctrl-C
    Watch {
        /// Path to configuration file
        #[arg(long, default_value = "./hotdict.json")]
        config: PathBuf,

        /// Seconds between health reports
        #[arg(long, default_value_t = 10)]
        report_secs: u64,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
