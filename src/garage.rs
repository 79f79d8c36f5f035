//! Record lifecycle with assets
//!
//! Vehicle and service entry operations that keep the asset tree in step
//! with the records: uploads are stored before the row that references
//! them, replaced or removed files are deleted after the row changes, and
//! deleting a vehicle removes every file its entries reference.
//!
//! Every deletion resolves through the path guard. A reference that escapes
//! the storage root is logged and left alone.

use thiserror::Error;

use crate::assets::{AssetCategory, AssetError, AssetTree};
use crate::maintenance::{MaintenanceError, MaintenanceLock};
use crate::model::{
    NewServiceEntry, NewVehicle, RecordId, ServiceEntry, ServiceEntryPatch, Vehicle,
    VehiclePatch,
};
use crate::observability::{Event, Logger};
use crate::store::{RecordStore, StoreError};

/// Garage operation errors
#[derive(Debug, Error)]
pub enum GarageError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: RecordId },

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("{0}")]
    Busy(#[from] MaintenanceError),
}

pub type GarageResult<T> = Result<T, GarageError>;

/// An uploaded file as received from the client
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub original_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(original_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            original_name: original_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Changes to a service entry and its attachments
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    /// Field changes; its photo and receipt fields are ignored
    pub patch: ServiceEntryPatch,
    /// Photo references to drop; references the entry does not hold are ignored
    pub remove_photos: Vec<String>,
    /// Photos appended after the kept ones
    pub add_photos: Vec<Upload>,
    /// Drop the receipt without a replacement
    pub remove_receipt: bool,
    /// Replacement receipt; wins over `remove_receipt`
    pub receipt: Option<Upload>,
}

/// Record operations bound to one store and asset tree
pub struct Garage<'a> {
    store: &'a RecordStore,
    tree: &'a AssetTree,
    lock: &'a MaintenanceLock,
}

impl<'a> Garage<'a> {
    pub fn new(store: &'a RecordStore, tree: &'a AssetTree, lock: &'a MaintenanceLock) -> Self {
        Self { store, tree, lock }
    }

    // ========================================================================
    // Vehicles
    // ========================================================================

    /// Create a vehicle, storing `image` first
    pub fn add_vehicle(&self, mut new: NewVehicle, image: Option<Upload>) -> GarageResult<Vehicle> {
        let _slot = self.lock.acquire_shared()?;

        let stored = self.store_optional(AssetCategory::VehicleImage, image)?;
        if let Some(ref reference) = stored {
            new.image_path = Some(reference.clone());
        }

        match self.store.create_vehicle(new) {
            Ok(vehicle) => Ok(vehicle),
            Err(e) => {
                self.discard(stored.iter().map(String::as_str));
                Err(e.into())
            }
        }
    }

    /// Apply `patch`; a new `image` replaces the old file
    pub fn update_vehicle(
        &self,
        id: RecordId,
        mut patch: VehiclePatch,
        image: Option<Upload>,
    ) -> GarageResult<Vehicle> {
        let _slot = self.lock.acquire_shared()?;

        let existing = self
            .store
            .get_vehicle(id)?
            .ok_or(GarageError::NotFound { kind: "vehicle", id })?;

        let stored = self.store_optional(AssetCategory::VehicleImage, image)?;
        if let Some(ref reference) = stored {
            patch.image_path = Some(Some(reference.clone()));
        }

        let updated = match self.store.update_vehicle(id, patch) {
            Ok(Some(vehicle)) => vehicle,
            Ok(None) => {
                self.discard(stored.iter().map(String::as_str));
                return Err(GarageError::NotFound { kind: "vehicle", id });
            }
            Err(e) => {
                self.discard(stored.iter().map(String::as_str));
                return Err(e.into());
            }
        };

        if let Some(old) = existing.image_path.as_deref() {
            if updated.image_path.as_deref() != Some(old) {
                self.remove_asset(old);
            }
        }
        Ok(updated)
    }

    /// Delete a vehicle, its image, and every file its entries reference.
    ///
    /// The entries themselves go with the row by cascade.
    pub fn delete_vehicle(&self, id: RecordId) -> GarageResult<()> {
        let _slot = self.lock.acquire_shared()?;

        let vehicle = self
            .store
            .get_vehicle(id)?
            .ok_or(GarageError::NotFound { kind: "vehicle", id })?;
        let entries = self.store.list_service_entries(id)?;

        self.discard(vehicle.asset_references());
        for entry in &entries {
            self.discard(entry.asset_references());
        }

        if !self.store.delete_vehicle(id)? {
            return Err(GarageError::NotFound { kind: "vehicle", id });
        }
        Ok(())
    }

    // ========================================================================
    // Service entries
    // ========================================================================

    /// Create a service entry with its photos and receipt.
    ///
    /// The vehicle's mileage is raised to the entry's when the entry is
    /// higher.
    pub fn add_service_entry(
        &self,
        vehicle_id: RecordId,
        mut new: NewServiceEntry,
        photos: Vec<Upload>,
        receipt: Option<Upload>,
    ) -> GarageResult<ServiceEntry> {
        let _slot = self.lock.acquire_shared()?;

        let vehicle = self.store.get_vehicle(vehicle_id)?.ok_or(GarageError::NotFound {
            kind: "vehicle",
            id: vehicle_id,
        })?;

        let mut stored = Vec::new();
        let result = (|| -> GarageResult<ServiceEntry> {
            for photo in photos {
                let reference = self.store_upload(AssetCategory::EntryPhoto, photo)?;
                stored.push(reference.clone());
                new.photo_paths.push(reference);
            }
            if let Some(upload) = receipt {
                let reference = self.store_upload(AssetCategory::Receipt, upload)?;
                stored.push(reference.clone());
                new.receipt_path = Some(reference);
            }
            Ok(self.store.create_service_entry(vehicle_id, new)?)
        })();

        match result {
            Ok(entry) => {
                self.bump_mileage(&vehicle, entry.mileage)?;
                Ok(entry)
            }
            Err(e) => {
                self.discard(stored.iter().map(String::as_str));
                Err(e)
            }
        }
    }

    /// Apply `update` to entry `id`.
    ///
    /// Files of removed photos and of a removed or replaced receipt are
    /// deleted once the row is updated.
    pub fn update_service_entry(
        &self,
        id: RecordId,
        update: EntryUpdate,
    ) -> GarageResult<ServiceEntry> {
        let _slot = self.lock.acquire_shared()?;

        let existing = self.store.get_service_entry(id)?.ok_or(GarageError::NotFound {
            kind: "service entry",
            id,
        })?;

        let EntryUpdate {
            mut patch,
            remove_photos,
            add_photos,
            remove_receipt,
            receipt,
        } = update;

        let (mut photos, dropped): (Vec<String>, Vec<String>) = existing
            .photo_paths
            .iter()
            .cloned()
            .partition(|p| !remove_photos.contains(p));

        let mut stored = Vec::new();
        let result = (|| -> GarageResult<Option<String>> {
            for photo in add_photos {
                let reference = self.store_upload(AssetCategory::EntryPhoto, photo)?;
                stored.push(reference.clone());
                photos.push(reference);
            }
            match receipt {
                Some(upload) => {
                    let reference = self.store_upload(AssetCategory::Receipt, upload)?;
                    stored.push(reference.clone());
                    Ok(Some(reference))
                }
                None if remove_receipt => Ok(None),
                None => Ok(existing.receipt_path.clone()),
            }
        })();

        let receipt_path = match result {
            Ok(receipt_path) => receipt_path,
            Err(e) => {
                self.discard(stored.iter().map(String::as_str));
                return Err(e);
            }
        };

        patch.photo_paths = Some(photos);
        patch.receipt_path = Some(receipt_path);

        let updated = match self.store.update_service_entry(id, patch) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                self.discard(stored.iter().map(String::as_str));
                return Err(GarageError::NotFound {
                    kind: "service entry",
                    id,
                });
            }
            Err(e) => {
                self.discard(stored.iter().map(String::as_str));
                return Err(e.into());
            }
        };

        self.discard(dropped.iter().map(String::as_str));
        if let Some(old) = existing.receipt_path.as_deref() {
            if updated.receipt_path.as_deref() != Some(old) {
                self.remove_asset(old);
            }
        }

        if let Some(vehicle) = self.store.get_vehicle(updated.vehicle_id)? {
            self.bump_mileage(&vehicle, updated.mileage)?;
        }
        Ok(updated)
    }

    /// Delete a service entry with its receipt and photos
    pub fn delete_service_entry(&self, id: RecordId) -> GarageResult<()> {
        let _slot = self.lock.acquire_shared()?;

        let entry = self.store.get_service_entry(id)?.ok_or(GarageError::NotFound {
            kind: "service entry",
            id,
        })?;

        if !self.store.delete_service_entry(id)? {
            return Err(GarageError::NotFound {
                kind: "service entry",
                id,
            });
        }
        self.discard(entry.asset_references());
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn store_upload(&self, category: AssetCategory, upload: Upload) -> GarageResult<String> {
        Ok(self
            .tree
            .store_upload(category, &upload.original_name, &upload.bytes)?)
    }

    fn store_optional(
        &self,
        category: AssetCategory,
        upload: Option<Upload>,
    ) -> GarageResult<Option<String>> {
        upload
            .map(|u| self.store_upload(category, u))
            .transpose()
    }

    fn bump_mileage(&self, vehicle: &Vehicle, mileage: Option<i64>) -> GarageResult<()> {
        match mileage {
            Some(m) if m > vehicle.current_mileage => {
                let patch = VehiclePatch {
                    current_mileage: Some(m),
                    ..VehiclePatch::default()
                };
                self.store.update_vehicle(vehicle.id, patch)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn discard<'r, I>(&self, references: I)
    where
        I: IntoIterator<Item = &'r str>,
    {
        for reference in references {
            self.remove_asset(reference);
        }
    }

    /// Delete one file; failures are logged, never returned.
    fn remove_asset(&self, reference: &str) {
        match self.tree.delete(reference) {
            Ok(_) => {}
            Err(e) if e.is_path_escape() => {
                Logger::warn(
                    Event::AssetRejected.as_str(),
                    &[("reference", reference), ("reason", e.to_string().as_str())],
                );
            }
            Err(e) => {
                Logger::warn(
                    Event::AssetDeleteFailed.as_str(),
                    &[("reference", reference), ("reason", e.to_string().as_str())],
                );
            }
        }
    }
}
