//! CLI-specific error types
//!
//! Every failure leaves the process with a single JSON error response on
//! stdout. Backup and restore failures keep their own codes so callers can
//! tell an invalid snapshot from a path escape.

use std::fmt;
use std::io;

use crate::backup::BackupError;
use crate::config::ConfigError;
use crate::restore::RestoreError;
use crate::workspace::WorkspaceError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout)
    IoError,
    /// Data directory not initialized
    NotInitialized,
    /// Opening or creating the workspace failed
    WorkspaceError,
    /// Another operation held the maintenance slot too long
    Busy,
    /// A backup or restore failed with its own code
    Operation(&'static str),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "OCT_CLI_CONFIG_ERROR",
            Self::IoError => "OCT_CLI_IO_ERROR",
            Self::NotInitialized => "OCT_CLI_NOT_INITIALIZED",
            Self::WorkspaceError => "OCT_CLI_WORKSPACE_ERROR",
            Self::Busy => "OCT_CLI_BUSY",
            Self::Operation(code) => *code,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<WorkspaceError> for CliError {
    fn from(e: WorkspaceError) -> Self {
        let code = match &e {
            WorkspaceError::NotInitialized(_) => CliErrorCode::NotInitialized,
            WorkspaceError::Busy(_) => CliErrorCode::Busy,
            _ => CliErrorCode::WorkspaceError,
        };
        Self::new(code, e.to_string())
    }
}

impl From<BackupError> for CliError {
    fn from(e: BackupError) -> Self {
        Self::new(CliErrorCode::Operation(e.code().as_str()), e.to_string())
    }
}

impl From<RestoreError> for CliError {
    fn from(e: RestoreError) -> Self {
        Self::new(CliErrorCode::Operation(e.kind().code()), e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
