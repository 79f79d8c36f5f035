//! CLI argument definitions using clap
//!
//! Commands:
//! - oiltrack init --config <path>
//! - oiltrack backup --config <path> --out <file> [--full]
//! - oiltrack restore --config <path> --input <file> [--full]
//! - oiltrack check --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// oiltrack - backup and restore for the oil change tracker
#[derive(Parser, Debug)]
#[command(name = "oiltrack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the data directory, record store and asset layout
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./oiltrack.json")]
        config: PathBuf,
    },

    /// Write a snapshot document, or a full archive with --full
    Backup {
        /// Path to configuration file
        #[arg(long, default_value = "./oiltrack.json")]
        config: PathBuf,

        /// Output file
        #[arg(long)]
        out: PathBuf,

        /// Include asset files (zip archive)
        #[arg(long)]
        full: bool,
    },

    /// Replace all records from a snapshot document, or records and assets
    /// from a full archive with --full
    Restore {
        /// Path to configuration file
        #[arg(long, default_value = "./oiltrack.json")]
        config: PathBuf,

        /// Snapshot document or archive to restore
        #[arg(long)]
        input: PathBuf,

        /// Input is a full archive
        #[arg(long)]
        full: bool,
    },

    /// List asset references whose file is missing
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./oiltrack.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
