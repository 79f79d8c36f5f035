//! Relational record store
//!
//! SQLite-backed storage for vehicles and service entries. The store is the
//! collaborator the backup engine reads from and restores into; it also
//! carries the plain record operations the rest of the application uses.
//!
//! # Guarantees
//!
//! - `foreign_keys = ON`: a service entry cannot reference a missing vehicle,
//!   and deleting a vehicle cascades to its entries.
//! - One connection behind a mutex: a [`RecordStore::transaction`] holds the
//!   connection for its whole duration, so no other reader or writer can
//!   observe an intermediate state.

mod errors;
mod rows;
mod schema;
mod tx;

pub use errors::{StoreError, StoreResult};
pub use tx::StoreTx;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{
    now_timestamp, NewServiceEntry, NewVehicle, RecordId, ServiceEntry, ServiceEntryPatch,
    Vehicle, VehiclePatch,
};

use rows::{entry_from_row, photo_paths_column, vehicle_from_row, ENTRY_COLUMNS, VEHICLE_COLUMNS};

/// SQLite-backed record store
#[derive(Debug)]
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Open (or create) the store at `path` and bring its layout up to date
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::configure(Connection::open(path)?)
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        schema::apply(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Close the underlying connection, reporting any error SQLite raises
    pub fn close(self) -> StoreResult<()> {
        let conn = self.conn.into_inner().map_err(|_| StoreError::Poisoned)?;
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run `f` inside one transaction.
    ///
    /// Commits when `f` returns `Ok`; any error rolls back every change made
    /// through the [`StoreTx`].
    pub fn transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&StoreTx<'_>) -> StoreResult<T>,
    {
        let mut conn = self.conn()?;
        let tx = StoreTx {
            tx: conn.transaction()?,
        };
        let value = f(&tx)?;
        tx.tx.commit()?;
        Ok(value)
    }

    // ---------------------------------------------------------------------
    // Vehicles
    // ---------------------------------------------------------------------

    /// All vehicles, most recently updated first
    pub fn list_vehicles(&self) -> StoreResult<Vec<Vehicle>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM vehicles ORDER BY updated_at DESC, id ASC",
            VEHICLE_COLUMNS
        ))?;
        let rows = stmt.query_map([], vehicle_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_vehicle(&self, id: RecordId) -> StoreResult<Option<Vehicle>> {
        let conn = self.conn()?;
        Self::fetch_vehicle(&conn, id)
    }

    fn fetch_vehicle(conn: &Connection, id: RecordId) -> StoreResult<Option<Vehicle>> {
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM vehicles WHERE id = ?1", VEHICLE_COLUMNS),
                [id],
                vehicle_from_row,
            )
            .optional()?)
    }

    pub fn create_vehicle(&self, new: NewVehicle) -> StoreResult<Vehicle> {
        let conn = self.conn()?;
        let now = now_timestamp();
        let vin_decoded = new
            .vin_decoded
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            "INSERT INTO vehicles (
                nickname, year, make, model, vin, owner_first, owner_last, current_mileage,
                oil_quarts, oil_weight, service_interval_miles, service_interval_months,
                image_path, vin_decoded_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
            params![
                new.nickname,
                new.year,
                new.make,
                new.model,
                new.vin.trim(),
                new.owner_first,
                new.owner_last,
                new.current_mileage,
                new.oil_quarts,
                new.oil_weight,
                new.service_interval_miles,
                new.service_interval_months,
                new.image_path,
                vin_decoded,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::fetch_vehicle(&conn, id)?.ok_or(StoreError::NotFound {
            kind: "vehicle",
            id,
        })
    }

    /// Apply `patch` to vehicle `id`; `None` when the vehicle does not exist
    pub fn update_vehicle(&self, id: RecordId, patch: VehiclePatch) -> StoreResult<Option<Vehicle>> {
        let conn = self.conn()?;
        let existing = match Self::fetch_vehicle(&conn, id)? {
            Some(v) => v,
            None => return Ok(None),
        };
        let updated = patch.apply(&existing, now_timestamp());
        let vin_decoded = rows::vin_decoded_column(&updated)?;

        conn.execute(
            "UPDATE vehicles SET
                nickname = ?2, year = ?3, make = ?4, model = ?5, vin = ?6, owner_first = ?7,
                owner_last = ?8, current_mileage = ?9, oil_quarts = ?10, oil_weight = ?11,
                service_interval_miles = ?12, service_interval_months = ?13, image_path = ?14,
                vin_decoded_json = ?15, updated_at = ?16
             WHERE id = ?1",
            params![
                id,
                updated.nickname,
                updated.year,
                updated.make,
                updated.model,
                updated.vin,
                updated.owner_first,
                updated.owner_last,
                updated.current_mileage,
                updated.oil_quarts,
                updated.oil_weight,
                updated.service_interval_miles,
                updated.service_interval_months,
                updated.image_path,
                vin_decoded,
                updated.updated_at,
            ],
        )?;

        Ok(Some(updated))
    }

    /// Delete a vehicle and, by cascade, its service entries
    pub fn delete_vehicle(&self, id: RecordId) -> StoreResult<bool> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM vehicles WHERE id = ?1", [id])? > 0)
    }

    // ---------------------------------------------------------------------
    // Service entries
    // ---------------------------------------------------------------------

    /// Entries of one vehicle, newest first
    pub fn list_service_entries(&self, vehicle_id: RecordId) -> StoreResult<Vec<ServiceEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM service_entries WHERE vehicle_id = ?1 ORDER BY date DESC, id DESC",
            ENTRY_COLUMNS
        ))?;
        let rows = stmt.query_map([vehicle_id], entry_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every entry of every vehicle, by id
    pub fn list_all_service_entries(&self) -> StoreResult<Vec<ServiceEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM service_entries ORDER BY id ASC",
            ENTRY_COLUMNS
        ))?;
        let rows = stmt.query_map([], entry_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Vehicles and entries read under one lock, so both halves match
    pub fn export_all(&self) -> StoreResult<(Vec<Vehicle>, Vec<ServiceEntry>)> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM vehicles ORDER BY updated_at DESC, id ASC",
            VEHICLE_COLUMNS
        ))?;
        let vehicles = stmt
            .query_map([], vehicle_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM service_entries ORDER BY id ASC",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((vehicles, entries))
    }

    pub fn get_service_entry(&self, id: RecordId) -> StoreResult<Option<ServiceEntry>> {
        let conn = self.conn()?;
        Self::fetch_entry(&conn, id)
    }

    fn fetch_entry(conn: &Connection, id: RecordId) -> StoreResult<Option<ServiceEntry>> {
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM service_entries WHERE id = ?1", ENTRY_COLUMNS),
                [id],
                entry_from_row,
            )
            .optional()?)
    }

    /// The most recent entry of a vehicle, if any
    pub fn latest_service_entry(&self, vehicle_id: RecordId) -> StoreResult<Option<ServiceEntry>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM service_entries WHERE vehicle_id = ?1
                     ORDER BY date DESC, id DESC LIMIT 1",
                    ENTRY_COLUMNS
                ),
                [vehicle_id],
                entry_from_row,
            )
            .optional()?)
    }

    pub fn create_service_entry(
        &self,
        vehicle_id: RecordId,
        new: NewServiceEntry,
    ) -> StoreResult<ServiceEntry> {
        let conn = self.conn()?;
        if Self::fetch_vehicle(&conn, vehicle_id)?.is_none() {
            return Err(StoreError::NotFound {
                kind: "vehicle",
                id: vehicle_id,
            });
        }

        let now = now_timestamp();
        let date = new
            .date
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());
        let photos = serde_json::to_string(&new.photo_paths)?;

        conn.execute(
            "INSERT INTO service_entries (
                vehicle_id, date, mileage, oil_brand, oil_weight, oil_quarts, filter_brand,
                filter_part, notes, receipt_path, photo_paths_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                vehicle_id,
                date,
                new.mileage,
                new.oil_brand,
                new.oil_weight,
                new.oil_quarts,
                new.filter_brand,
                new.filter_part,
                new.notes,
                new.receipt_path,
                photos,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::fetch_entry(&conn, id)?.ok_or(StoreError::NotFound {
            kind: "service entry",
            id,
        })
    }

    /// Apply `patch` to entry `id`; `None` when the entry does not exist
    pub fn update_service_entry(
        &self,
        id: RecordId,
        patch: ServiceEntryPatch,
    ) -> StoreResult<Option<ServiceEntry>> {
        let conn = self.conn()?;
        let existing = match Self::fetch_entry(&conn, id)? {
            Some(e) => e,
            None => return Ok(None),
        };
        let updated = patch.apply(&existing, now_timestamp());
        let photos = photo_paths_column(&updated)?;

        conn.execute(
            "UPDATE service_entries SET
                date = ?2, mileage = ?3, oil_brand = ?4, oil_weight = ?5, oil_quarts = ?6,
                filter_brand = ?7, filter_part = ?8, notes = ?9, receipt_path = ?10,
                photo_paths_json = ?11, updated_at = ?12
             WHERE id = ?1",
            params![
                id,
                updated.date,
                updated.mileage,
                updated.oil_brand,
                updated.oil_weight,
                updated.oil_quarts,
                updated.filter_brand,
                updated.filter_part,
                updated.notes,
                updated.receipt_path,
                photos,
                updated.updated_at,
            ],
        )?;

        Ok(Some(updated))
    }

    pub fn delete_service_entry(&self, id: RecordId) -> StoreResult<bool> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM service_entries WHERE id = ?1", [id])? > 0)
    }

    /// Number of (vehicles, service entries) currently stored
    pub fn counts(&self) -> StoreResult<(usize, usize)> {
        let conn = self.conn()?;
        let vehicles: i64 = conn.query_row("SELECT COUNT(*) FROM vehicles", [], |r| r.get(0))?;
        let entries: i64 =
            conn.query_row("SELECT COUNT(*) FROM service_entries", [], |r| r.get(0))?;
        Ok((vehicles as usize, entries as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> RecordStore {
        RecordStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_and_get_vehicle() {
        let store = store();
        let created = store.create_vehicle(NewVehicle::named("Truck")).unwrap();

        let fetched = store.get_vehicle(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.service_interval_miles, 5000);
        assert_eq!(fetched.service_interval_months, 6);
    }

    #[test]
    fn test_vin_decoded_roundtrips_opaquely() {
        let store = store();
        let meta = serde_json::json!({"Make": "TOYOTA", "Cylinders": 4});
        let created = store
            .create_vehicle(NewVehicle {
                vin_decoded: Some(meta.clone()),
                ..NewVehicle::named("Corolla")
            })
            .unwrap();

        assert_eq!(created.vin_decoded, Some(meta));
    }

    #[test]
    fn test_update_vehicle_missing_returns_none() {
        let store = store();
        assert!(store.update_vehicle(99, VehiclePatch::default()).unwrap().is_none());
    }

    #[test]
    fn test_service_entry_requires_vehicle() {
        let store = store();
        let err = store
            .create_service_entry(42, NewServiceEntry::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_service_entry_defaults_date_to_today() {
        let store = store();
        let v = store.create_vehicle(NewVehicle::named("Van")).unwrap();
        let entry = store
            .create_service_entry(v.id, NewServiceEntry::default())
            .unwrap();

        assert_eq!(entry.date, Utc::now().format("%Y-%m-%d").to_string());
        assert!(entry.photo_paths.is_empty());
    }

    #[test]
    fn test_entries_listed_newest_first() {
        let store = store();
        let v = store.create_vehicle(NewVehicle::named("Van")).unwrap();
        for date in ["2023-01-01", "2024-06-01", "2023-09-15"] {
            store
                .create_service_entry(
                    v.id,
                    NewServiceEntry {
                        date: Some(date.into()),
                        ..NewServiceEntry::default()
                    },
                )
                .unwrap();
        }

        let dates: Vec<String> = store
            .list_service_entries(v.id)
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec!["2024-06-01", "2023-09-15", "2023-01-01"]);
        assert_eq!(store.latest_service_entry(v.id).unwrap().unwrap().date, "2024-06-01");
    }

    #[test]
    fn test_delete_vehicle_cascades() {
        let store = store();
        let v = store.create_vehicle(NewVehicle::named("Van")).unwrap();
        store
            .create_service_entry(v.id, NewServiceEntry::default())
            .unwrap();

        assert!(store.delete_vehicle(v.id).unwrap());
        assert_eq!(store.counts().unwrap(), (0, 0));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let store = store();
        store.create_vehicle(NewVehicle::named("Keep")).unwrap();

        let result: StoreResult<()> = store.transaction(|tx| {
            tx.delete_all_vehicles()?;
            Err(StoreError::Poisoned)
        });

        assert!(result.is_err());
        assert_eq!(store.counts().unwrap(), (1, 0));
    }

    #[test]
    fn test_open_on_disk_and_close() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("oiltrack.db");

        let store = RecordStore::open(&path).unwrap();
        store.create_vehicle(NewVehicle::named("Persisted")).unwrap();
        store.close().unwrap();

        let reopened = RecordStore::open(&path).unwrap();
        assert_eq!(reopened.list_vehicles().unwrap()[0].nickname, "Persisted");
    }
}
