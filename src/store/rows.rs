//! Row <-> record conversion

use rusqlite::types::Type;
use rusqlite::Row;

use crate::model::{ServiceEntry, Vehicle};

pub const VEHICLE_COLUMNS: &str = "id, nickname, year, make, model, vin, owner_first, owner_last, \
     current_mileage, oil_quarts, oil_weight, service_interval_miles, service_interval_months, \
     image_path, vin_decoded_json, created_at, updated_at";

pub const ENTRY_COLUMNS: &str = "id, vehicle_id, date, mileage, oil_brand, oil_weight, oil_quarts, \
     filter_brand, filter_part, notes, receipt_path, photo_paths_json, created_at, updated_at";

fn json_column<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn vehicle_from_row(row: &Row<'_>) -> rusqlite::Result<Vehicle> {
    let vin_decoded: Option<String> = row.get(14)?;
    let vin_decoded = match vin_decoded {
        Some(raw) => Some(json_column(14, &raw)?),
        None => None,
    };

    Ok(Vehicle {
        id: row.get(0)?,
        nickname: row.get(1)?,
        year: row.get(2)?,
        make: row.get(3)?,
        model: row.get(4)?,
        vin: row.get(5)?,
        owner_first: row.get(6)?,
        owner_last: row.get(7)?,
        current_mileage: row.get(8)?,
        oil_quarts: row.get(9)?,
        oil_weight: row.get(10)?,
        service_interval_miles: row.get(11)?,
        service_interval_months: row.get(12)?,
        image_path: row.get(13)?,
        vin_decoded,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

pub fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<ServiceEntry> {
    let photos: String = row.get(11)?;

    Ok(ServiceEntry {
        id: row.get(0)?,
        vehicle_id: row.get(1)?,
        date: row.get(2)?,
        mileage: row.get(3)?,
        oil_brand: row.get(4)?,
        oil_weight: row.get(5)?,
        oil_quarts: row.get(6)?,
        filter_brand: row.get(7)?,
        filter_part: row.get(8)?,
        notes: row.get(9)?,
        receipt_path: row.get(10)?,
        photo_paths: json_column(11, &photos)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Serialized form of the opaque VIN metadata column
pub fn vin_decoded_column(vehicle: &Vehicle) -> serde_json::Result<Option<String>> {
    vehicle
        .vin_decoded
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
}

/// Serialized form of the photo sequence column
pub fn photo_paths_column(entry: &ServiceEntry) -> serde_json::Result<String> {
    serde_json::to_string(&entry.photo_paths)
}
