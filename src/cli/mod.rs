//! CLI module for oiltrack
//!
//! Provides command-line interface for:
//! - init: Create the data directory and asset layout
//! - backup: Snapshot document or full archive
//! - restore: From a snapshot document or a full archive
//! - check: Dangling asset references

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{backup, check, init, restore, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
