//! Raw, id-keyed primitives available inside one store transaction

use rusqlite::{params, Transaction};

use crate::model::{ServiceEntry, Vehicle};

use super::errors::{StoreError, StoreResult};
use super::rows::{photo_paths_column, vin_decoded_column};

/// A live transaction on the record store.
///
/// Dropped without commit, everything done through it is rolled back.
pub struct StoreTx<'conn> {
    pub(super) tx: Transaction<'conn>,
}

impl StoreTx<'_> {
    /// Delete every service entry; returns the number of rows removed
    pub fn delete_all_service_entries(&self) -> StoreResult<usize> {
        Ok(self.tx.execute("DELETE FROM service_entries", [])?)
    }

    /// Delete every vehicle; returns the number of rows removed
    pub fn delete_all_vehicles(&self) -> StoreResult<usize> {
        Ok(self.tx.execute("DELETE FROM vehicles", [])?)
    }

    /// Insert a vehicle keeping its id and every field verbatim
    pub fn insert_vehicle(&self, vehicle: &Vehicle) -> StoreResult<()> {
        let vin_decoded = vin_decoded_column(vehicle)?;
        self.tx
            .execute(
                "INSERT INTO vehicles (
                    id, nickname, year, make, model, vin, owner_first, owner_last,
                    current_mileage, oil_quarts, oil_weight, service_interval_miles,
                    service_interval_months, image_path, vin_decoded_json, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    vehicle.id,
                    vehicle.nickname,
                    vehicle.year,
                    vehicle.make,
                    vehicle.model,
                    vehicle.vin,
                    vehicle.owner_first,
                    vehicle.owner_last,
                    vehicle.current_mileage,
                    vehicle.oil_quarts,
                    vehicle.oil_weight,
                    vehicle.service_interval_miles,
                    vehicle.service_interval_months,
                    vehicle.image_path,
                    vin_decoded,
                    vehicle.created_at,
                    vehicle.updated_at,
                ],
            )
            .map_err(|source| StoreError::Insert {
                table: "vehicles",
                id: vehicle.id,
                source,
            })?;
        Ok(())
    }

    /// Insert a service entry keeping its id and vehicle linkage
    pub fn insert_service_entry(&self, entry: &ServiceEntry) -> StoreResult<()> {
        let photos = photo_paths_column(entry)?;
        self.tx
            .execute(
                "INSERT INTO service_entries (
                    id, vehicle_id, date, mileage, oil_brand, oil_weight, oil_quarts,
                    filter_brand, filter_part, notes, receipt_path, photo_paths_json,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    entry.id,
                    entry.vehicle_id,
                    entry.date,
                    entry.mileage,
                    entry.oil_brand,
                    entry.oil_weight,
                    entry.oil_quarts,
                    entry.filter_brand,
                    entry.filter_part,
                    entry.notes,
                    entry.receipt_path,
                    photos,
                    entry.created_at,
                    entry.updated_at,
                ],
            )
            .map_err(|source| StoreError::Insert {
                table: "service_entries",
                id: entry.id,
                source,
            })?;
        Ok(())
    }
}
