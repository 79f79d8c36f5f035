//! Backup subsystem
//!
//! Two kinds of backup exist:
//!
//! - **Snapshot**: the relational records only, as a JSON snapshot document.
//! - **Archive**: a zip holding the snapshot document as `db.json` plus every
//!   file of the asset tree under `uploads/`.
//!
//! # Archive Format
//!
//! ```text
//! backup.zip
//! ├── db.json
//! └── uploads/
//!     └── <category>/<file>
//! ```
//!
//! # Important
//!
//! Backup is read-only. It never modifies records or assets, and a failed
//! archive build deletes its partial output file. Callers hold the
//! maintenance slot shared for the duration, so a restore cannot run
//! underneath a backup.

mod archive;
mod errors;

pub use archive::{
    cleanup_partial_archive, create_zip_archive, write_archive, ArchiveBuilder, ArchiveStats,
    SNAPSHOT_ENTRY,
};
pub use errors::{BackupError, BackupErrorCode, BackupResult};

use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use serde::Serialize;

use crate::assets::AssetTree;
use crate::maintenance::SharedSlot;
use crate::observability::ObservationScope;
use crate::snapshot::{SnapshotCodec, SnapshotDocument};
use crate::store::RecordStore;

/// What a finished backup contains
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupSummary {
    pub schema_tag: String,
    pub vehicles: usize,
    pub service_entries: usize,
    /// Asset files included; always 0 for snapshot backups
    pub assets: usize,
    pub asset_bytes: u64,
    /// Size of the produced output in bytes
    pub output_bytes: u64,
}

impl BackupSummary {
    fn new(document: &SnapshotDocument) -> Self {
        Self {
            schema_tag: document.schema_tag.clone(),
            vehicles: document.vehicles.len(),
            service_entries: document.service_entries.len(),
            assets: 0,
            asset_bytes: 0,
            output_bytes: 0,
        }
    }

    fn with_archive(mut self, stats: ArchiveStats, output_bytes: u64) -> Self {
        self.assets = stats.assets;
        self.asset_bytes = stats.asset_bytes;
        self.output_bytes = output_bytes;
        self
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("vehicles", self.vehicles.to_string()),
            ("service_entries", self.service_entries.to_string()),
            ("assets", self.assets.to_string()),
            ("output_bytes", self.output_bytes.to_string()),
        ]
    }
}

fn complete_scope(scope: ObservationScope<'_>, summary: &BackupSummary) {
    let fields = summary.fields();
    let refs: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
    scope.complete_with_fields(&refs);
}

/// Backup manager for snapshot documents and archives.
///
/// # Usage
///
/// ```ignore
/// let slot = lock.acquire_shared()?;
/// let summary = BackupManager::create_archive_file(&store, &tree, &output_path, &slot)?;
/// ```
pub struct BackupManager;

impl BackupManager {
    /// Encode the current records as a snapshot document
    pub fn export_snapshot(
        store: &RecordStore,
        _slot: &SharedSlot<'_>,
    ) -> BackupResult<SnapshotDocument> {
        Ok(SnapshotCodec::encode(store)?)
    }

    /// Write a plain snapshot document to `output_path`
    pub fn write_snapshot_file(
        store: &RecordStore,
        output_path: &Path,
        slot: &SharedSlot<'_>,
    ) -> BackupResult<BackupSummary> {
        let output = output_path.display().to_string();
        let scope = ObservationScope::with_fields(
            "BACKUP",
            &[("kind", "snapshot"), ("output", output.as_str())],
        );

        let result = (|| -> BackupResult<BackupSummary> {
            let document = Self::export_snapshot(store, slot)?;
            let bytes = SnapshotCodec::to_bytes(&document)?;

            let mut file = File::create(output_path)
                .map_err(|e| BackupError::io_error_at_path(output_path, e))?;
            file.write_all(&bytes)
                .and_then(|_| file.sync_all())
                .map_err(|e| BackupError::io_error_at_path(output_path, e))?;

            let mut summary = BackupSummary::new(&document);
            summary.output_bytes = bytes.len() as u64;
            Ok(summary)
        })();

        match result {
            Ok(summary) => {
                complete_scope(scope, &summary);
                Ok(summary)
            }
            Err(e) => {
                cleanup_partial_archive(output_path);
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    /// Build a full archive into any seekable sink
    pub fn build_archive<W: Write + Seek>(
        store: &RecordStore,
        tree: &AssetTree,
        sink: W,
        slot: &SharedSlot<'_>,
    ) -> BackupResult<(W, BackupSummary)> {
        let document = Self::export_snapshot(store, slot)?;
        let bytes = SnapshotCodec::to_bytes(&document)?;
        let assets = tree.enumerate()?;

        let (mut sink, stats) = write_archive(&bytes, &assets, sink)?;
        let output_bytes = sink
            .stream_position()
            .map_err(|e| BackupError::io_error("could not measure archive", e))?;

        let summary = BackupSummary::new(&document).with_archive(stats, output_bytes);
        Ok((sink, summary))
    }

    /// Build a full archive at `output_path`.
    ///
    /// On any failure the partial file is removed.
    pub fn create_archive_file(
        store: &RecordStore,
        tree: &AssetTree,
        output_path: &Path,
        slot: &SharedSlot<'_>,
    ) -> BackupResult<BackupSummary> {
        let output = output_path.display().to_string();
        let scope = ObservationScope::with_fields(
            "BACKUP",
            &[("kind", "archive"), ("output", output.as_str())],
        );

        let result = (|| -> BackupResult<BackupSummary> {
            let document = Self::export_snapshot(store, slot)?;
            let bytes = SnapshotCodec::to_bytes(&document)?;
            let assets = tree.enumerate()?;

            let (stats, size) = create_zip_archive(&bytes, &assets, output_path)?;
            Ok(BackupSummary::new(&document).with_archive(stats, size))
        })();

        match result {
            Ok(summary) => {
                complete_scope(scope, &summary);
                Ok(summary)
            }
            Err(e) => {
                cleanup_partial_archive(output_path);
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }
}
