//! Applying a snapshot document to the record store

use serde::Serialize;

use crate::maintenance::ExclusiveSlot;
use crate::snapshot::SnapshotDocument;
use crate::store::RecordStore;

use super::errors::{RestoreError, RestoreResult, StorageState};

/// Rows written by a relational restore
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoredCounts {
    pub vehicles: usize,
    pub service_entries: usize,
}

/// Replaces every record with the contents of a snapshot document
pub struct RelationalRestorer;

impl RelationalRestorer {
    /// Replace all records in one transaction.
    ///
    /// Entries are deleted before vehicles, then vehicles are inserted before
    /// entries, every row keeping its id. Any failure rolls the whole
    /// transaction back and the store is exactly as before.
    pub fn apply(
        store: &RecordStore,
        document: &SnapshotDocument,
        _slot: &ExclusiveSlot<'_>,
    ) -> RestoreResult<RestoredCounts> {
        store
            .transaction(|tx| {
                tx.delete_all_service_entries()?;
                tx.delete_all_vehicles()?;

                for vehicle in &document.vehicles {
                    tx.insert_vehicle(vehicle)?;
                }
                for entry in &document.service_entries {
                    tx.insert_service_entry(entry)?;
                }

                Ok(RestoredCounts {
                    vehicles: document.vehicles.len(),
                    service_entries: document.service_entries.len(),
                })
            })
            .map_err(|e| {
                RestoreError::failed(
                    format!("relational restore rolled back: {}", e),
                    StorageState::Untouched,
                )
                .with_source(e)
            })
    }
}
