//! Asset tree errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for asset operations
pub type AssetResult<T> = Result<T, AssetError>;

/// Asset tree errors
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Path escapes storage root: {0}")]
    PathEscape(String),

    #[error("Invalid asset reference: {0:?}")]
    InvalidReference(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl AssetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        AssetError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the error is a containment violation
    pub fn is_path_escape(&self) -> bool {
        matches!(self, AssetError::PathEscape(_))
    }
}
