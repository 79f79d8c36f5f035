//! Backup error types
//!
//! Backup errors are ERROR severity: a failed backup leaves the records and
//! the asset tree untouched, and any partial archive file is deleted.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use crate::assets::AssetError;
use crate::maintenance::MaintenanceError;
use crate::observability::Severity;
use crate::snapshot::SnapshotError;

/// Backup error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupErrorCode {
    /// General backup failure
    OctBackupFailed,
    /// I/O failure while reading assets or writing the output
    OctBackupIo,
    /// The snapshot document could not be produced
    OctBackupSnapshot,
    /// The zip writer failed
    OctBackupArchive,
    /// A restore held the maintenance slot for too long
    OctBackupBusy,
}

impl BackupErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupErrorCode::OctBackupFailed => "OCT_BACKUP_FAILED",
            BackupErrorCode::OctBackupIo => "OCT_BACKUP_IO",
            BackupErrorCode::OctBackupSnapshot => "OCT_BACKUP_SNAPSHOT",
            BackupErrorCode::OctBackupArchive => "OCT_BACKUP_ARCHIVE",
            BackupErrorCode::OctBackupBusy => "OCT_BACKUP_BUSY",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

impl fmt::Display for BackupErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Backup error with full context
#[derive(Debug)]
pub struct BackupError {
    code: BackupErrorCode,
    message: String,
    source: Option<BoxedSource>,
}

impl BackupError {
    fn new(code: BackupErrorCode, message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self {
            code,
            message: message.into(),
            source,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(BackupErrorCode::OctBackupFailed, message, None)
    }

    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(BackupErrorCode::OctBackupIo, message, Some(Box::new(source)))
    }

    pub fn io_error_at_path(path: &std::path::Path, source: io::Error) -> Self {
        Self::io_error(format!("I/O error at {}", path.display()), source)
    }

    pub fn archive_failed(message: impl Into<String>, source: zip::result::ZipError) -> Self {
        Self::new(
            BackupErrorCode::OctBackupArchive,
            message,
            Some(Box::new(source)),
        )
    }

    pub fn code(&self) -> BackupErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl StdError for BackupError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

/// Result type for backup operations
pub type BackupResult<T> = Result<T, BackupError>;

impl From<SnapshotError> for BackupError {
    fn from(err: SnapshotError) -> Self {
        BackupError::new(
            BackupErrorCode::OctBackupSnapshot,
            "could not produce snapshot document",
            Some(Box::new(err)),
        )
    }
}

impl From<AssetError> for BackupError {
    fn from(err: AssetError) -> Self {
        BackupError::new(
            BackupErrorCode::OctBackupIo,
            "could not read asset tree",
            Some(Box::new(err)),
        )
    }
}

impl From<MaintenanceError> for BackupError {
    fn from(err: MaintenanceError) -> Self {
        BackupError::new(
            BackupErrorCode::OctBackupBusy,
            "a restore is in progress",
            Some(Box::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(BackupErrorCode::OctBackupFailed.as_str(), "OCT_BACKUP_FAILED");
        assert_eq!(BackupErrorCode::OctBackupIo.as_str(), "OCT_BACKUP_IO");
        assert_eq!(BackupErrorCode::OctBackupSnapshot.as_str(), "OCT_BACKUP_SNAPSHOT");
        assert_eq!(BackupErrorCode::OctBackupArchive.as_str(), "OCT_BACKUP_ARCHIVE");
        assert_eq!(BackupErrorCode::OctBackupBusy.as_str(), "OCT_BACKUP_BUSY");
    }

    #[test]
    fn test_error_display_contains_required_fields() {
        let io_err = io::Error::new(io::ErrorKind::Other, "disk full");
        let err = BackupError::io_error("could not write archive", io_err);
        let display = format!("{}", err);

        assert!(display.contains("[ERROR]"));
        assert!(display.contains("OCT_BACKUP_IO"));
        assert!(display.contains("could not write archive"));
        assert!(display.contains("caused by: disk full"));
    }

    #[test]
    fn test_busy_conversion() {
        let err: BackupError = MaintenanceError::Busy { waited_ms: 10 }.into();
        assert_eq!(err.code(), BackupErrorCode::OctBackupBusy);
    }
}
