//! Configuration
//!
//! One JSON file, `./oiltrack.json` by default:
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/oiltrack",
//!   "uploads_dir": "/var/lib/oiltrack/uploads",
//!   "categories": { "vehicles": "vehicles", "receipts": "receipts", "entry_photos": "entry_photos" },
//!   "lock_timeout_ms": 30000,
//!   "max_archive_bytes": 209715200,
//!   "log_level": "INFO"
//! }
//! ```
//!
//! Only `data_dir` is required.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assets::CategoryLayout;
use crate::observability::Severity;

/// File name of the record store inside the data directory
pub const DATABASE_FILE: &str = "oiltrack.db";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Data directory holding the record store (required)
    pub data_dir: PathBuf,

    /// Storage root for assets (default: `<data_dir>/uploads`)
    #[serde(default)]
    pub uploads_dir: Option<PathBuf>,

    /// Category subdirectories of the storage root
    #[serde(default)]
    pub categories: CategoryLayout,

    /// How long to wait for the maintenance slot
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Largest archive, and largest total uncompressed content, accepted
    /// for restore
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,

    /// Minimum log severity
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_lock_timeout_ms() -> u64 {
    30_000
}

fn default_max_archive_bytes() -> u64 {
    200 * 1024 * 1024
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Config {
    /// Defaults for everything but the data directory
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            uploads_dir: None,
            categories: CategoryLayout::default(),
            lock_timeout_ms: default_lock_timeout_ms(),
            max_archive_bytes: default_max_archive_bytes(),
            log_level: default_log_level(),
        }
    }

    /// Load and validate configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }
        if matches!(&self.uploads_dir, Some(dir) if dir.as_os_str().is_empty()) {
            return Err(ConfigError::Invalid("uploads_dir must not be empty".into()));
        }
        let uploads = lexical_absolute(&self.uploads_path())?;
        let data_dir = lexical_absolute(&self.data_dir)?;
        let database = lexical_absolute(&self.database_path())?;
        if data_dir.starts_with(&uploads) || database.starts_with(&uploads) {
            return Err(ConfigError::Invalid(
                "data_dir must not be inside uploads_dir; uploads_dir is wiped on restore".into(),
            ));
        }

        self.categories
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("categories: {}", e)))?;

        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid("lock_timeout_ms must be > 0".into()));
        }
        if self.max_archive_bytes == 0 {
            return Err(ConfigError::Invalid("max_archive_bytes must be > 0".into()));
        }

        self.severity()?;
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        &self.data_dir
    }

    /// The record store file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// The asset storage root
    pub fn uploads_path(&self) -> PathBuf {
        self.uploads_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("uploads"))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> Result<Severity, ConfigError> {
        self.log_level
            .parse()
            .map_err(|e: String| ConfigError::Invalid(format!("log_level: {}", e)))
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically
fn lexical_absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| ConfigError::Invalid(format!("cannot resolve {}: {}", path.display(), e)))?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(temp: &TempDir, json: &str) -> PathBuf {
        let path = temp.path().join("oiltrack.json");
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, r#"{"data_dir": "/var/lib/oiltrack"}"#);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.uploads_path(), PathBuf::from("/var/lib/oiltrack/uploads"));
        assert_eq!(config.database_path(), PathBuf::from("/var/lib/oiltrack/oiltrack.db"));
        assert_eq!(config.lock_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_archive_bytes, 200 * 1024 * 1024);
        assert_eq!(config.severity().unwrap(), Severity::Info);
        assert_eq!(config.categories, CategoryLayout::default());
    }

    #[test]
    fn test_missing_data_dir_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, r#"{"uploads_dir": "/tmp/x"}"#);
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::for_data_dir("/data");
        config.lock_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::for_data_dir("/data");
        config.log_level = "LOUD".into();
        assert!(config.validate().is_err());

        let mut config = Config::for_data_dir("/data");
        config.uploads_dir = Some("/data".into());
        assert!(config.validate().is_err());

        let mut config = Config::for_data_dir("data");
        config.uploads_dir = Some("./data".into());
        assert!(config.validate().is_err());

        let mut config = Config::for_data_dir("/data");
        config.categories.receipts = "../receipts".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_data_dir_inside_uploads_is_rejected() {
        let mut config = Config::for_data_dir("/srv/uploads/db");
        config.uploads_dir = Some("/srv/uploads".into());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::for_data_dir("/srv/other/../uploads/db");
        config.uploads_dir = Some("/srv/./uploads".into());
        assert!(config.validate().is_err());

        // Sibling whose name only shares a prefix
        let mut config = Config::for_data_dir("/srv/uploads-db");
        config.uploads_dir = Some("/srv/uploads".into());
        assert!(config.validate().is_ok());

        // The default layout keeps uploads inside the data directory
        assert!(Config::for_data_dir("/srv/data").validate().is_ok());
    }

    #[test]
    fn test_unreadable_file() {
        let temp = TempDir::new().unwrap();
        let err = Config::load(&temp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
