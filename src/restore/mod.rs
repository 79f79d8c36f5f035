//! Restore subsystem
//!
//! Restore replaces the live records, and for archives the whole asset
//! tree, with the contents of a backup.
//!
//! # Algorithm (archive)
//!
//! 1. Open the archive (`Received`)
//! 2. Locate `db.json`, decode and upgrade it (`Validated`)
//! 3. Check every `uploads/` entry against the path guard
//! 4. Wipe the asset tree and write every entry (`AssetsReplaced`)
//! 5. Replace all records in one transaction (`DataRestored`)
//! 6. Report dangling references (`Done`)
//!
//! Steps 1-3 have no side effects. From step 4 on a failure leaves storage
//! undefined; the error says so and the remedy is re-running the same
//! archive.
//!
//! # Important
//!
//! Restore runs under the exclusive maintenance slot. It is never retried
//! internally and cannot be cancelled once the wipe has begun.

mod archive;
mod errors;
mod relational;

pub use archive::{ArchiveLimits, ArchiveOutcome, ArchiveRestore, RestoreState};
pub use errors::{RestoreError, RestoreErrorKind, RestoreResult, StorageState};
pub use relational::{RelationalRestorer, RestoredCounts};

use std::fs::{self, File};
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use serde::Serialize;

use crate::assets::AssetTree;
use crate::maintenance::ExclusiveSlot;
use crate::observability::ObservationScope;
use crate::snapshot::{SnapshotCodec, SnapshotDocument};
use crate::store::RecordStore;

/// What a finished restore did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub vehicles: usize,
    pub service_entries: usize,
    /// Asset files written; always 0 for snapshot restores
    pub assets_written: usize,
    /// Archive entries that were not restored (outside `uploads/`, symlinks)
    pub skipped_entries: Vec<String>,
    /// Restored references whose file is not in the asset tree
    pub dangling_references: Vec<String>,
}

fn finish_scope(scope: ObservationScope<'_>, result: &RestoreResult<RestoreReport>) {
    match result {
        Ok(report) => {
            let vehicles = report.vehicles.to_string();
            let entries = report.service_entries.to_string();
            let assets = report.assets_written.to_string();
            let dangling = report.dangling_references.len().to_string();
            scope.complete_with_fields(&[
                ("vehicles", vehicles.as_str()),
                ("service_entries", entries.as_str()),
                ("assets_written", assets.as_str()),
                ("dangling", dangling.as_str()),
            ]);
        }
        Err(e) => scope.fail(&e.to_string()),
    }
}

fn dangling_in(tree: &AssetTree, document: &SnapshotDocument) -> Vec<String> {
    tree.dangling(document.asset_references())
}

/// Restore manager for snapshot documents and archives.
///
/// # Usage
///
/// ```ignore
/// let slot = lock.acquire_exclusive()?;
/// let report = RestoreManager::restore_archive_file(
///     &store, &tree, &archive_path, ArchiveLimits::default(), &slot,
/// )?;
/// ```
pub struct RestoreManager;

impl RestoreManager {
    /// Replace all records with a raw snapshot document; assets are left
    /// as they are.
    pub fn restore_snapshot(
        store: &RecordStore,
        tree: &AssetTree,
        raw: &[u8],
        slot: &ExclusiveSlot<'_>,
    ) -> RestoreResult<RestoreReport> {
        let scope = ObservationScope::with_fields("RESTORE", &[("kind", "snapshot")]);

        let result = (|| -> RestoreResult<RestoreReport> {
            let document = SnapshotCodec::decode(raw)?;
            let counts = RelationalRestorer::apply(store, &document, slot)?;
            Ok(RestoreReport {
                vehicles: counts.vehicles,
                service_entries: counts.service_entries,
                assets_written: 0,
                skipped_entries: Vec::new(),
                dangling_references: dangling_in(tree, &document),
            })
        })();

        finish_scope(scope, &result);
        result
    }

    /// [`RestoreManager::restore_snapshot`] reading the document from a file
    pub fn restore_snapshot_file(
        store: &RecordStore,
        tree: &AssetTree,
        path: &Path,
        max_bytes: u64,
        slot: &ExclusiveSlot<'_>,
    ) -> RestoreResult<RestoreReport> {
        let file = File::open(path).map_err(|e| {
            RestoreError::io_error(format!("could not open {}", path.display()), e)
        })?;
        let mut raw = Vec::new();
        file.take(max_bytes.saturating_add(1))
            .read_to_end(&mut raw)
            .map_err(|e| {
                RestoreError::io_error(format!("could not read {}", path.display()), e)
            })?;
        if raw.len() as u64 > max_bytes {
            return Err(RestoreError::invalid_format(format!(
                "snapshot exceeds the {} byte limit",
                max_bytes
            )));
        }

        Self::restore_snapshot(store, tree, &raw, slot)
    }

    /// Full restore from an archive in any seekable reader
    pub fn restore_archive<R: Read + Seek>(
        store: &RecordStore,
        tree: &AssetTree,
        reader: R,
        limits: ArchiveLimits,
        slot: &ExclusiveSlot<'_>,
    ) -> RestoreResult<RestoreReport> {
        let scope = ObservationScope::with_fields("RESTORE", &[("kind", "archive")]);

        let result = ArchiveRestore::run(reader, limits, tree, store, slot).map(|outcome| {
            RestoreReport {
                vehicles: outcome.counts.vehicles,
                service_entries: outcome.counts.service_entries,
                assets_written: outcome.assets_written,
                dangling_references: dangling_in(tree, &outcome.document),
                skipped_entries: outcome.skipped_entries,
            }
        });

        finish_scope(scope, &result);
        result
    }

    /// Full restore from an archive file; the file size is checked against
    /// the limit before it is opened as a zip.
    pub fn restore_archive_file(
        store: &RecordStore,
        tree: &AssetTree,
        path: &Path,
        limits: ArchiveLimits,
        slot: &ExclusiveSlot<'_>,
    ) -> RestoreResult<RestoreReport> {
        let size = fs::metadata(path)
            .map_err(|e| RestoreError::io_error(format!("could not stat {}", path.display()), e))?
            .len();
        if size > limits.max_bytes {
            return Err(RestoreError::archive_malformed(format!(
                "archive is {} bytes, limit is {}",
                size, limits.max_bytes
            )));
        }

        let file = File::open(path).map_err(|e| {
            RestoreError::io_error(format!("could not open {}", path.display()), e)
        })?;
        Self::restore_archive(store, tree, BufReader::new(file), limits, slot)
    }
}
