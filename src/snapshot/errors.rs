//! Snapshot codec errors
//!
//! Error codes:
//! - OCT_SNAPSHOT_INVALID_FORMAT (ERROR severity)
//! - OCT_SNAPSHOT_UNSUPPORTED_SCHEMA (ERROR severity)
//! - OCT_SNAPSHOT_READ (ERROR severity)
//! - OCT_SNAPSHOT_ENCODE (ERROR severity)
//!
//! None of these leave side effects: decoding never touches storage and
//! encoding only reads.

use std::error::Error as StdError;
use std::fmt;

use crate::observability::Severity;

/// Snapshot error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotErrorCode {
    /// Document is not a snapshot of this product
    OctSnapshotInvalidFormat,
    /// Snapshot of this product at a version this build cannot read
    OctSnapshotUnsupportedSchema,
    /// Records could not be read from the store
    OctSnapshotRead,
    /// Document could not be serialized
    OctSnapshotEncode,
}

impl SnapshotErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            SnapshotErrorCode::OctSnapshotInvalidFormat => "OCT_SNAPSHOT_INVALID_FORMAT",
            SnapshotErrorCode::OctSnapshotUnsupportedSchema => "OCT_SNAPSHOT_UNSUPPORTED_SCHEMA",
            SnapshotErrorCode::OctSnapshotRead => "OCT_SNAPSHOT_READ",
            SnapshotErrorCode::OctSnapshotEncode => "OCT_SNAPSHOT_ENCODE",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

impl fmt::Display for SnapshotErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Snapshot error with code, message and optional cause
#[derive(Debug)]
pub struct SnapshotError {
    code: SnapshotErrorCode,
    message: String,
    source: Option<BoxedSource>,
}

impl SnapshotError {
    fn new(code: SnapshotErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// The document is not a readable snapshot of this product
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::new(SnapshotErrorCode::OctSnapshotInvalidFormat, message)
    }

    /// The schema version cannot be read by this build
    pub fn unsupported_schema(message: impl Into<String>) -> Self {
        Self::new(SnapshotErrorCode::OctSnapshotUnsupportedSchema, message)
    }

    /// Reading the records to encode failed
    pub fn read_failed(message: impl Into<String>) -> Self {
        Self::new(SnapshotErrorCode::OctSnapshotRead, message)
    }

    /// Serializing the document failed
    pub fn encode_failed(message: impl Into<String>) -> Self {
        Self::new(SnapshotErrorCode::OctSnapshotEncode, message)
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn code(&self) -> SnapshotErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl StdError for SnapshotError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SnapshotErrorCode::OctSnapshotInvalidFormat.code(),
            "OCT_SNAPSHOT_INVALID_FORMAT"
        );
        assert_eq!(
            SnapshotErrorCode::OctSnapshotUnsupportedSchema.code(),
            "OCT_SNAPSHOT_UNSUPPORTED_SCHEMA"
        );
        assert_eq!(SnapshotErrorCode::OctSnapshotRead.code(), "OCT_SNAPSHOT_READ");
        assert_eq!(SnapshotErrorCode::OctSnapshotEncode.code(), "OCT_SNAPSHOT_ENCODE");
    }

    #[test]
    fn test_display_contains_code_and_cause() {
        let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = SnapshotError::invalid_format("document is not JSON").with_source(cause);
        let display = err.to_string();

        assert!(display.starts_with("[ERROR] OCT_SNAPSHOT_INVALID_FORMAT"));
        assert!(display.contains("document is not JSON"));
        assert!(display.contains("caused by"));
        assert!(StdError::source(&err).is_some());
    }
}
