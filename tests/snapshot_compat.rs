//! Snapshot Document Compatibility Tests
//!
//! Tests for:
//! - Round-trip: decode(encode()) reproduces the dataset
//! - Schema upgrade: v1 documents decode with empty photo lists
//! - Rejection of foreign and future schema tags
//! - Documents exported by the original application (legacy field names)

use oiltrack::model::{NewServiceEntry, NewVehicle};
use oiltrack::snapshot::{SnapshotCodec, SnapshotErrorCode, CURRENT_SCHEMA_VERSION};
use oiltrack::store::RecordStore;
use serde_json::json;

// =============================================================================
// Test Utilities
// =============================================================================

fn populated_store() -> RecordStore {
    let store = RecordStore::open_in_memory().unwrap();

    let mut truck = NewVehicle::named("Truck");
    truck.make = "Ford".into();
    truck.current_mileage = 120_500;
    truck.image_path = Some("uploads/vehicles/truck.jpg".into());
    truck.vin_decoded = Some(json!({"Make": "FORD", "ModelYear": "2015"}));
    let truck = store.create_vehicle(truck).unwrap();

    let sedan = store.create_vehicle(NewVehicle::named("Sedan")).unwrap();

    store
        .create_service_entry(
            truck.id,
            NewServiceEntry {
                date: Some("2024-01-01".into()),
                mileage: Some(120_000),
                oil_weight: "5W-30".into(),
                receipt_path: Some("uploads/receipts/r1.pdf".into()),
                photo_paths: vec![
                    "uploads/entry_photos/a.jpg".into(),
                    "uploads/entry_photos/b.jpg".into(),
                ],
                ..NewServiceEntry::default()
            },
        )
        .unwrap();
    store
        .create_service_entry(
            sedan.id,
            NewServiceEntry {
                date: Some("2023-06-15".into()),
                notes: "first change".into(),
                ..NewServiceEntry::default()
            },
        )
        .unwrap();

    store
}

fn decode_value(value: serde_json::Value) -> oiltrack::snapshot::SnapshotResult<oiltrack::snapshot::SnapshotDocument> {
    SnapshotCodec::decode(value.to_string().as_bytes())
}

// =============================================================================
// Round-trip
// =============================================================================

#[test]
fn test_round_trip_is_set_equal() {
    let store = populated_store();
    let document = SnapshotCodec::encode(&store).unwrap();
    let bytes = SnapshotCodec::to_bytes(&document).unwrap();
    let decoded = SnapshotCodec::decode(&bytes).unwrap();

    let mut before_vehicles = store.list_vehicles().unwrap();
    let mut after_vehicles = decoded.vehicles.clone();
    before_vehicles.sort_by_key(|v| v.id);
    after_vehicles.sort_by_key(|v| v.id);
    assert_eq!(before_vehicles, after_vehicles);

    let mut before_entries = store.list_all_service_entries().unwrap();
    let mut after_entries = decoded.service_entries.clone();
    before_entries.sort_by_key(|e| e.id);
    after_entries.sort_by_key(|e| e.id);
    assert_eq!(before_entries, after_entries);

    assert_eq!(
        decoded.schema_tag,
        format!("oil-change-tracker@{}", CURRENT_SCHEMA_VERSION)
    );
}

#[test]
fn test_round_trip_through_a_second_store() {
    let source = populated_store();
    let document = SnapshotCodec::encode(&source).unwrap();

    let target = RecordStore::open_in_memory().unwrap();
    target
        .transaction(|tx| {
            for v in &document.vehicles {
                tx.insert_vehicle(v)?;
            }
            for e in &document.service_entries {
                tx.insert_service_entry(e)?;
            }
            Ok(())
        })
        .unwrap();

    let again = SnapshotCodec::encode(&target).unwrap();
    assert_eq!(document.vehicles, again.vehicles);
    assert_eq!(document.service_entries, again.service_entries);
}

#[test]
fn test_oil_quantities_keep_full_precision() {
    let quarts = 13.677471273751875_f64;
    let store = RecordStore::open_in_memory().unwrap();

    let mut new = NewVehicle::named("Van");
    new.oil_quarts = Some(quarts);
    let van = store.create_vehicle(new).unwrap();
    store
        .create_service_entry(
            van.id,
            NewServiceEntry {
                oil_quarts: Some(quarts),
                ..NewServiceEntry::default()
            },
        )
        .unwrap();

    let document = SnapshotCodec::encode(&store).unwrap();
    let bytes = SnapshotCodec::to_bytes(&document).unwrap();
    let decoded = SnapshotCodec::decode(&bytes).unwrap();

    assert_eq!(decoded.vehicles[0].oil_quarts.map(f64::to_bits), Some(quarts.to_bits()));
    assert_eq!(
        decoded.service_entries[0].oil_quarts.map(f64::to_bits),
        Some(quarts.to_bits())
    );
    assert_eq!(decoded, document);
}

// =============================================================================
// Schema upgrade
// =============================================================================

#[test]
fn test_v1_document_decodes_with_empty_photos() {
    let document = decode_value(json!({
        "schemaTag": "oil-change-tracker@1",
        "exportedAt": "2023-01-01T00:00:00.000Z",
        "vehicles": [{"id": 1, "nickname": "Truck"}],
        "serviceEntries": [{"id": 10, "vehicle_id": 1, "date": "2022-12-01"}]
    }))
    .unwrap();

    assert_eq!(document.schema_tag, "oil-change-tracker@2");
    assert_eq!(document.service_entries.len(), 1);
    assert!(document.service_entries[0].photo_paths.is_empty());
    assert_eq!(document.vehicles[0].service_interval_miles, 5000);
    assert_eq!(document.vehicles[0].service_interval_months, 6);
}

#[test]
fn test_v1_document_ignores_stray_photo_columns() {
    let document = decode_value(json!({
        "schemaTag": "oil-change-tracker@1",
        "vehicles": [{"id": 1, "nickname": "Truck"}],
        "serviceEntries": [{
            "id": 10, "vehicle_id": 1, "date": "2022-12-01",
            "photo_paths_json": "[\"uploads/entry_photos/x.jpg\"]"
        }]
    }))
    .unwrap();

    assert!(document.service_entries[0].photo_paths.is_empty());
}

// =============================================================================
// Rejection
// =============================================================================

#[test]
fn test_foreign_product_is_invalid_format() {
    let err = decode_value(json!({
        "schemaTag": "other-app@1",
        "vehicles": [],
        "serviceEntries": []
    }))
    .unwrap_err();
    assert_eq!(err.code(), SnapshotErrorCode::OctSnapshotInvalidFormat);
}

#[test]
fn test_future_version_is_unsupported() {
    let err = decode_value(json!({
        "schemaTag": "oil-change-tracker@999",
        "vehicles": [],
        "serviceEntries": []
    }))
    .unwrap_err();
    assert_eq!(err.code(), SnapshotErrorCode::OctSnapshotUnsupportedSchema);
}

#[test]
fn test_malformed_documents_are_invalid_format() {
    for raw in [
        &b"not json"[..],
        &b"[1, 2, 3]"[..],
        &b"{\"vehicles\": []}"[..],
        &b"{\"schemaTag\": \"oil-change-tracker@2\", \"vehicles\": {}}"[..],
        &b"{\"schemaTag\": 2}"[..],
    ] {
        let err = SnapshotCodec::decode(raw).unwrap_err();
        assert_eq!(
            err.code(),
            SnapshotErrorCode::OctSnapshotInvalidFormat,
            "input: {}",
            String::from_utf8_lossy(raw)
        );
    }
}

// =============================================================================
// Documents from the original application
// =============================================================================

#[test]
fn test_original_export_format_is_accepted() {
    let document = decode_value(json!({
        "ok": true,
        "schema": "oil-change-tracker@2",
        "exported_at": "2024-03-01T12:00:00.000Z",
        "vehicles": [{
            "id": 1,
            "nickname": "Truck",
            "year": 2015,
            "make": null,
            "current_mileage": 120500,
            "image_path": "/uploads/vehicles/1700000000000_abc123.jpg",
            "vin_decoded_json": "{\"Make\":\"FORD\"}",
            "created_at": "2024-01-01T00:00:00.000Z",
            "updated_at": "2024-01-01T00:00:00.000Z"
        }],
        "service_entries": [{
            "id": 10,
            "vehicle_id": 1,
            "date": "2024-01-01",
            "mileage": 120000,
            "receipt_path": "/uploads/receipts/r.pdf",
            "photo_paths_json": "[\"/uploads/entry_photos/a.jpg\"]"
        }]
    }))
    .unwrap();

    let truck = &document.vehicles[0];
    assert_eq!(truck.make, "");
    assert_eq!(truck.vin_decoded, Some(json!({"Make": "FORD"})));
    assert_eq!(
        truck.image_path.as_deref(),
        Some("/uploads/vehicles/1700000000000_abc123.jpg")
    );

    let entry = &document.service_entries[0];
    assert_eq!(entry.photo_paths, vec!["/uploads/entry_photos/a.jpg".to_string()]);
    assert_eq!(document.exported_at, "2024-03-01T12:00:00.000Z");
}

#[test]
fn test_unparseable_photo_column_names_the_entry() {
    let err = decode_value(json!({
        "schemaTag": "oil-change-tracker@2",
        "vehicles": [{"id": 1}],
        "serviceEntries": [{
            "id": 42, "vehicle_id": 1, "date": "2024-01-01",
            "photo_paths_json": "[not json"
        }]
    }))
    .unwrap_err();

    assert_eq!(err.code(), SnapshotErrorCode::OctSnapshotInvalidFormat);
    assert!(err.message().contains("42"));
}
