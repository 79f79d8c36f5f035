//! CLI command implementations
//!
//! Each command loads the configuration, applies its log level, opens the
//! workspace and writes one JSON response. Errors are returned to [`run`],
//! which writes the error response.

use std::path::Path;

use serde_json::json;

use crate::config::Config;
use crate::observability::{Event, Logger};
use crate::workspace::Workspace;

use super::args::Command;
use super::errors::CliResult;
use super::io::{write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    match run_command(cli.command) {
        Ok(()) => Ok(()),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Backup { config, out, full } => backup(&config, &out, full),
        Command::Restore {
            config,
            input,
            full,
        } => restore(&config, &input, full),
        Command::Check { config } => check(&config),
    }
}

fn load_config(config_path: &Path) -> CliResult<Config> {
    let config = Config::load(config_path)?;
    Logger::set_min_severity(config.severity()?);

    let path = config_path.display().to_string();
    Logger::info(Event::ConfigLoaded.as_str(), &[("path", path.as_str())]);
    Ok(config)
}

/// Create the data directory, record store and asset layout.
///
/// Running it on an initialized directory leaves the data as it is.
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let workspace = Workspace::init(config)?;

    let data_dir = workspace.config().data_path().display().to_string();
    let uploads_dir = workspace.tree().root().display().to_string();
    workspace.close()?;

    write_response(json!({
        "initialized": true,
        "data_dir": data_dir,
        "uploads_dir": uploads_dir,
    }))
}

/// Write a snapshot document, or a full archive when `full` is set
pub fn backup(config_path: &Path, out: &Path, full: bool) -> CliResult<()> {
    let config = load_config(config_path)?;
    let workspace = Workspace::open(config)?;

    let summary = if full {
        workspace.backup_archive(out)
    } else {
        workspace.backup_snapshot(out)
    };
    let summary = summary?;
    workspace.close()?;

    write_response(json!({
        "output": out.display().to_string(),
        "full": full,
        "summary": serde_json::to_value(&summary)?,
    }))
}

/// Restore from a snapshot document, or from a full archive when `full`
/// is set
pub fn restore(config_path: &Path, input: &Path, full: bool) -> CliResult<()> {
    let config = load_config(config_path)?;
    let workspace = Workspace::open(config)?;

    let report = if full {
        workspace.restore_archive_file(input)
    } else {
        workspace.restore_snapshot_file(input)
    };
    let report = report?;
    workspace.close()?;

    write_response(json!({
        "input": input.display().to_string(),
        "full": full,
        "report": serde_json::to_value(&report)?,
    }))
}

/// List asset references whose file is missing
pub fn check(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let workspace = Workspace::open(config)?;

    let dangling = workspace.dangling_references()?;
    workspace.close()?;

    write_response(json!({
        "consistent": dangling.is_empty(),
        "dangling_references": dangling,
    }))
}
