//! Restore error types
//!
//! Every restore error names its kind and the state it left storage in:
//!
//! - `InvalidFormat`, `UnsupportedSchema`, `ArchiveMalformed`, `PathEscape`,
//!   `Busy` and `Io` are raised before anything destructive happens; storage
//!   is [`StorageState::Untouched`].
//! - `RestoreFailed` is raised by the relational apply (rolled back, so
//!   untouched when no assets were replaced) or after the asset wipe, where
//!   storage is [`StorageState::Undefined`] and the restore must be re-run.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use crate::maintenance::MaintenanceError;
use crate::observability::Severity;
use crate::snapshot::{SnapshotError, SnapshotErrorCode};

/// Restore error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreErrorKind {
    /// Not a snapshot of this product, or a malformed document
    InvalidFormat,
    /// Snapshot of this product at an unreadable version
    UnsupportedSchema,
    /// Archive unreadable, without exactly one `db.json`, or over its limits
    ArchiveMalformed,
    /// An archive entry would land outside the storage root
    PathEscape,
    /// Applying the restore failed
    RestoreFailed,
    /// The maintenance slot could not be acquired in time
    Busy,
    /// The restore input could not be read
    Io,
}

impl RestoreErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            RestoreErrorKind::InvalidFormat => "OCT_RESTORE_INVALID_FORMAT",
            RestoreErrorKind::UnsupportedSchema => "OCT_RESTORE_UNSUPPORTED_SCHEMA",
            RestoreErrorKind::ArchiveMalformed => "OCT_RESTORE_ARCHIVE_MALFORMED",
            RestoreErrorKind::PathEscape => "OCT_RESTORE_PATH_ESCAPE",
            RestoreErrorKind::RestoreFailed => "OCT_RESTORE_FAILED",
            RestoreErrorKind::Busy => "OCT_RESTORE_BUSY",
            RestoreErrorKind::Io => "OCT_RESTORE_IO",
        }
    }
}

impl fmt::Display for RestoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// State of records and assets after a failed restore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageState {
    /// Nothing was changed
    Untouched,
    /// The asset tree was wiped; re-run the same archive
    Undefined,
}

impl StorageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageState::Untouched => "untouched",
            StorageState::Undefined => "undefined",
        }
    }
}

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Restore error with full context
#[derive(Debug)]
pub struct RestoreError {
    kind: RestoreErrorKind,
    message: String,
    storage: StorageState,
    source: Option<BoxedSource>,
}

impl RestoreError {
    fn new(kind: RestoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            storage: StorageState::Untouched,
            source: None,
        }
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorKind::InvalidFormat, message)
    }

    pub fn unsupported_schema(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorKind::UnsupportedSchema, message)
    }

    pub fn archive_malformed(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorKind::ArchiveMalformed, message)
    }

    /// `entry` is the offending archive entry name
    pub fn path_escape(entry: &str) -> Self {
        Self::new(
            RestoreErrorKind::PathEscape,
            format!("archive entry {:?} escapes the storage root", entry),
        )
    }

    /// A failure while applying the restore
    pub fn failed(message: impl Into<String>, storage: StorageState) -> Self {
        let mut err = Self::new(RestoreErrorKind::RestoreFailed, message);
        err.storage = storage;
        err
    }

    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(RestoreErrorKind::Io, message).with_source(source)
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Re-classify the storage state, e.g. once the asset wipe has happened
    pub fn with_storage_state(mut self, storage: StorageState) -> Self {
        self.storage = storage;
        self
    }

    pub fn kind(&self) -> RestoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn storage_state(&self) -> StorageState {
        self.storage
    }

    /// Whether the same restore must be re-run to reach a consistent state
    pub fn requires_rerun(&self) -> bool {
        self.storage == StorageState::Undefined
    }

    /// FATAL once storage is undefined, ERROR otherwise
    pub fn severity(&self) -> Severity {
        match self.storage {
            StorageState::Undefined => Severity::Fatal,
            StorageState::Untouched => Severity::Error,
        }
    }
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.kind, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        if self.requires_rerun() {
            write!(f, " [storage state undefined; re-run the restore]")?;
        }
        Ok(())
    }
}

impl StdError for RestoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

/// Result type for restore operations
pub type RestoreResult<T> = Result<T, RestoreError>;

impl From<SnapshotError> for RestoreError {
    fn from(err: SnapshotError) -> Self {
        let kind = match err.code() {
            SnapshotErrorCode::OctSnapshotUnsupportedSchema => RestoreErrorKind::UnsupportedSchema,
            _ => RestoreErrorKind::InvalidFormat,
        };
        let message = err.message().to_string();
        RestoreError::new(kind, message).with_source(err)
    }
}

impl From<MaintenanceError> for RestoreError {
    fn from(err: MaintenanceError) -> Self {
        RestoreError::new(
            RestoreErrorKind::Busy,
            "another backup, restore or write holds the maintenance slot",
        )
        .with_source(err)
    }
}
