//! Workspace
//!
//! Ties one configuration to its record store, asset tree and maintenance
//! slot. Every backup, restore and check goes through here so the slot is
//! always taken in the right mode:
//!
//! - backups, checks and record writes hold it shared
//! - restores hold it exclusively

use std::fs;
use std::io::{Read, Seek, Write};
use std::path::Path;

use thiserror::Error;
use uuid::Uuid;

use crate::assets::{AssetError, AssetTree};
use crate::backup::{BackupManager, BackupResult, BackupSummary};
use crate::config::Config;
use crate::garage::Garage;
use crate::maintenance::{MaintenanceError, MaintenanceLock};
use crate::observability::{Event, Logger};
use crate::restore::{ArchiveLimits, RestoreManager, RestoreReport, RestoreResult};
use crate::snapshot::SnapshotDocument;
use crate::store::{RecordStore, StoreError};

/// Workspace lifecycle errors
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Workspace not initialized: {0} does not exist (run `oiltrack init`)")]
    NotInitialized(String),

    #[error("Failed to create {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Asset tree error: {0}")]
    Asset(#[from] AssetError),

    #[error("{0}")]
    Busy(#[from] MaintenanceError),
}

/// An opened data directory
pub struct Workspace {
    config: Config,
    store: RecordStore,
    tree: AssetTree,
    lock: MaintenanceLock,
    session: Uuid,
}

impl Workspace {
    /// Create the data directory, the store schema and the category
    /// subdirectories, then open the workspace. Safe to run twice.
    pub fn init(config: Config) -> Result<Self, WorkspaceError> {
        let data_dir = config.data_path();
        fs::create_dir_all(data_dir).map_err(|source| WorkspaceError::Create {
            path: data_dir.display().to_string(),
            source,
        })?;

        Self::open_unchecked(config)
    }

    /// Open an initialized workspace
    pub fn open(config: Config) -> Result<Self, WorkspaceError> {
        let db_path = config.database_path();
        if !db_path.exists() {
            return Err(WorkspaceError::NotInitialized(
                db_path.display().to_string(),
            ));
        }

        Self::open_unchecked(config)
    }

    fn open_unchecked(config: Config) -> Result<Self, WorkspaceError> {
        let store = RecordStore::open(&config.database_path())?;
        let tree = AssetTree::new(config.uploads_path(), config.categories.clone());
        tree.ensure_layout()?;

        let lock = MaintenanceLock::new(config.lock_timeout());
        let session = Uuid::new_v4();

        let data_dir = config.data_path().display().to_string();
        let uploads_dir = tree.root().display().to_string();
        let session_id = session.to_string();
        Logger::info(
            Event::WorkspaceOpen.as_str(),
            &[
                ("data_dir", data_dir.as_str()),
                ("uploads_dir", uploads_dir.as_str()),
                ("session", session_id.as_str()),
            ],
        );

        Ok(Self {
            config,
            store,
            tree,
            lock,
            session,
        })
    }

    /// Close the record store
    pub fn close(self) -> Result<(), WorkspaceError> {
        let session_id = self.session.to_string();
        self.store.close()?;
        Logger::info(
            Event::WorkspaceClose.as_str(),
            &[("session", session_id.as_str())],
        );
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn tree(&self) -> &AssetTree {
        &self.tree
    }

    pub fn lock(&self) -> &MaintenanceLock {
        &self.lock
    }

    /// Record operations that keep the asset tree in step
    pub fn garage(&self) -> Garage<'_> {
        Garage::new(&self.store, &self.tree, &self.lock)
    }

    fn limits(&self) -> ArchiveLimits {
        ArchiveLimits {
            max_bytes: self.config.max_archive_bytes,
        }
    }

    // ========================================================================
    // Backup
    // ========================================================================

    /// Current records as a snapshot document
    pub fn export_snapshot(&self) -> BackupResult<SnapshotDocument> {
        let slot = self.lock.acquire_shared()?;
        BackupManager::export_snapshot(&self.store, &slot)
    }

    /// Write a plain snapshot document to `output`
    pub fn backup_snapshot(&self, output: &Path) -> BackupResult<BackupSummary> {
        let slot = self.lock.acquire_shared()?;
        BackupManager::write_snapshot_file(&self.store, output, &slot)
    }

    /// Write a full archive to `output`
    pub fn backup_archive(&self, output: &Path) -> BackupResult<BackupSummary> {
        let slot = self.lock.acquire_shared()?;
        BackupManager::create_archive_file(&self.store, &self.tree, output, &slot)
    }

    /// Write a full archive into `sink`
    pub fn build_archive<W: Write + Seek>(&self, sink: W) -> BackupResult<(W, BackupSummary)> {
        let slot = self.lock.acquire_shared()?;
        BackupManager::build_archive(&self.store, &self.tree, sink, &slot)
    }

    // ========================================================================
    // Restore
    // ========================================================================

    /// Replace all records with a raw snapshot document
    pub fn restore_snapshot(&self, raw: &[u8]) -> RestoreResult<RestoreReport> {
        let slot = self.lock.acquire_exclusive()?;
        RestoreManager::restore_snapshot(&self.store, &self.tree, raw, &slot)
    }

    /// Replace all records with the snapshot document at `path`
    pub fn restore_snapshot_file(&self, path: &Path) -> RestoreResult<RestoreReport> {
        let slot = self.lock.acquire_exclusive()?;
        RestoreManager::restore_snapshot_file(
            &self.store,
            &self.tree,
            path,
            self.config.max_archive_bytes,
            &slot,
        )
    }

    /// Replace records and assets with the archive in `reader`
    pub fn restore_archive<R: Read + Seek>(&self, reader: R) -> RestoreResult<RestoreReport> {
        let slot = self.lock.acquire_exclusive()?;
        RestoreManager::restore_archive(&self.store, &self.tree, reader, self.limits(), &slot)
    }

    /// Replace records and assets with the archive at `path`
    pub fn restore_archive_file(&self, path: &Path) -> RestoreResult<RestoreReport> {
        let slot = self.lock.acquire_exclusive()?;
        RestoreManager::restore_archive_file(&self.store, &self.tree, path, self.limits(), &slot)
    }

    // ========================================================================
    // Check
    // ========================================================================

    /// Asset references in the live records whose file is missing
    pub fn dangling_references(&self) -> Result<Vec<String>, WorkspaceError> {
        let _slot = self.lock.acquire_shared()?;
        let (vehicles, entries) = self.store.export_all()?;

        let references = vehicles
            .iter()
            .flat_map(|v| v.asset_references())
            .chain(entries.iter().flat_map(|e| e.asset_references()));
        Ok(self.tree.dangling(references))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewVehicle;
    use tempfile::TempDir;

    fn config(temp: &TempDir) -> Config {
        Config::for_data_dir(temp.path().join("data"))
    }

    #[test]
    fn test_open_requires_init() {
        let temp = TempDir::new().unwrap();
        let result = Workspace::open(config(&temp));
        assert!(matches!(result, Err(WorkspaceError::NotInitialized(_))));
    }

    #[test]
    fn test_init_creates_layout_and_reopens() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::init(config(&temp)).unwrap();
        assert!(temp.path().join("data/oiltrack.db").exists());
        assert!(temp.path().join("data/uploads/vehicles").is_dir());
        assert!(temp.path().join("data/uploads/receipts").is_dir());
        assert!(temp.path().join("data/uploads/entry_photos").is_dir());
        ws.store().create_vehicle(NewVehicle::named("Truck")).unwrap();
        ws.close().unwrap();

        let ws = Workspace::open(config(&temp)).unwrap();
        assert_eq!(ws.store().counts().unwrap(), (1, 0));
    }

    #[test]
    fn test_dangling_references_reports_missing_files() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::init(config(&temp)).unwrap();

        let mut new = NewVehicle::named("Truck");
        new.image_path = Some("uploads/vehicles/gone.jpg".into());
        ws.store().create_vehicle(new).unwrap();

        assert_eq!(
            ws.dangling_references().unwrap(),
            vec!["uploads/vehicles/gone.jpg".to_string()]
        );
    }

    #[test]
    fn test_backup_waits_for_restore_slot() {
        let temp = TempDir::new().unwrap();
        let mut cfg = config(&temp);
        cfg.lock_timeout_ms = 20;
        let ws = Workspace::init(cfg).unwrap();

        let _held = ws.lock().acquire_exclusive().unwrap();
        let err = ws.backup_snapshot(&temp.path().join("db.json")).unwrap_err();
        assert_eq!(err.code(), crate::backup::BackupErrorCode::OctBackupBusy);
        assert!(!temp.path().join("db.json").exists());
    }
}
