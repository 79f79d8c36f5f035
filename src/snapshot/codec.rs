//! Encoding the store into a snapshot document and back

use serde_json::{Map, Value};

use crate::model::now_timestamp;
use crate::store::RecordStore;

use super::document::SnapshotDocument;
use super::errors::{SnapshotError, SnapshotResult};
use super::migrate::{normalize_legacy_fields, upgrade};
use super::tag::SchemaTag;

/// Stateless codec between the relational store and [`SnapshotDocument`]
pub struct SnapshotCodec;

impl SnapshotCodec {
    /// Read every record and tag the result with the current schema.
    ///
    /// Vehicles are ordered by `updated_at` descending, service entries by
    /// id ascending.
    pub fn encode(store: &RecordStore) -> SnapshotResult<SnapshotDocument> {
        let (vehicles, service_entries) = store.export_all().map_err(|e| {
            SnapshotError::read_failed("could not read records for snapshot").with_source(e)
        })?;

        Ok(SnapshotDocument {
            schema_tag: SchemaTag::current().to_string(),
            exported_at: now_timestamp(),
            vehicles,
            service_entries,
        })
    }

    /// Serialize a document as pretty-printed JSON
    pub fn to_bytes(document: &SnapshotDocument) -> SnapshotResult<Vec<u8>> {
        serde_json::to_vec_pretty(document).map_err(|e| {
            SnapshotError::encode_failed("could not serialize snapshot").with_source(e)
        })
    }

    /// Parse, validate and upgrade a raw document.
    ///
    /// The schema tag is checked before anything else in the document is
    /// interpreted. The returned document always carries the current tag.
    pub fn decode(raw: &[u8]) -> SnapshotResult<SnapshotDocument> {
        let value: Value = serde_json::from_slice(raw).map_err(|e| {
            SnapshotError::invalid_format("snapshot is not valid JSON").with_source(e)
        })?;

        let mut doc = match value {
            Value::Object(map) => map,
            _ => return Err(SnapshotError::invalid_format("snapshot must be a JSON object")),
        };

        let tag = SchemaTag::parse(raw_tag(&doc)?)?;

        normalize_legacy_fields(&mut doc)?;
        upgrade(&mut doc, tag.version())?;
        doc.insert(
            "schemaTag".to_string(),
            Value::String(SchemaTag::current().to_string()),
        );

        serde_json::from_value(Value::Object(doc)).map_err(|e| {
            SnapshotError::invalid_format("snapshot records are malformed").with_source(e)
        })
    }
}

/// The tag under its current or legacy name
fn raw_tag(doc: &Map<String, Value>) -> SnapshotResult<&str> {
    match doc.get("schemaTag").or_else(|| doc.get("schema")) {
        Some(Value::String(tag)) => Ok(tag),
        Some(_) => Err(SnapshotError::invalid_format("schema tag must be a string")),
        None => Err(SnapshotError::invalid_format("snapshot has no schema tag")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewServiceEntry, NewVehicle};
    use crate::snapshot::SnapshotErrorCode;

    fn seeded_store() -> RecordStore {
        let store = RecordStore::open_in_memory().unwrap();
        let truck = store.create_vehicle(NewVehicle::named("Truck")).unwrap();
        store.create_vehicle(NewVehicle::named("Van")).unwrap();
        store
            .create_service_entry(
                truck.id,
                NewServiceEntry {
                    date: Some("2024-01-01".into()),
                    oil_quarts: Some(5.5),
                    photo_paths: vec!["uploads/entry_photos/a.jpg".into()],
                    ..NewServiceEntry::default()
                },
            )
            .unwrap();
        store
    }

    #[test]
    fn test_encode_tags_current_schema() {
        let doc = SnapshotCodec::encode(&seeded_store()).unwrap();
        assert_eq!(doc.schema_tag, "oil-change-tracker@2");
        assert_eq!(doc.vehicles.len(), 2);
        assert_eq!(doc.service_entries.len(), 1);
    }

    #[test]
    fn test_decode_of_encode_is_identity() {
        let doc = SnapshotCodec::encode(&seeded_store()).unwrap();
        let bytes = SnapshotCodec::to_bytes(&doc).unwrap();

        assert_eq!(SnapshotCodec::decode(&bytes).unwrap(), doc);
    }

    #[test]
    fn test_document_uses_camel_case_top_level() {
        let doc = SnapshotCodec::encode(&seeded_store()).unwrap();
        let value: Value = serde_json::from_slice(&SnapshotCodec::to_bytes(&doc).unwrap()).unwrap();

        assert!(value.get("schemaTag").is_some());
        assert!(value.get("exportedAt").is_some());
        assert!(value.get("serviceEntries").is_some());
        assert!(value["serviceEntries"][0]["photo_paths"].is_array());
    }

    #[test]
    fn test_decode_rejects_non_object() {
        for raw in [&b"[]"[..], &b"42"[..], &b"not json"[..], &b""[..]] {
            let err = SnapshotCodec::decode(raw).unwrap_err();
            assert_eq!(err.code(), SnapshotErrorCode::OctSnapshotInvalidFormat);
        }
    }

    #[test]
    fn test_decode_requires_string_tag() {
        let err = SnapshotCodec::decode(br#"{"vehicles": []}"#).unwrap_err();
        assert_eq!(err.code(), SnapshotErrorCode::OctSnapshotInvalidFormat);

        let err = SnapshotCodec::decode(br#"{"schemaTag": 2}"#).unwrap_err();
        assert_eq!(err.code(), SnapshotErrorCode::OctSnapshotInvalidFormat);
    }

    #[test]
    fn test_tag_checked_before_body() {
        let err =
            SnapshotCodec::decode(br#"{"schemaTag": "oil-change-tracker@999", "vehicles": 7}"#)
                .unwrap_err();
        assert_eq!(err.code(), SnapshotErrorCode::OctSnapshotUnsupportedSchema);
    }

    #[test]
    fn test_malformed_record_is_invalid_format() {
        let raw = br#"{"schemaTag": "oil-change-tracker@2", "vehicles": [{"nickname": "no id"}]}"#;
        let err = SnapshotCodec::decode(raw).unwrap_err();
        assert_eq!(err.code(), SnapshotErrorCode::OctSnapshotInvalidFormat);
    }

    #[test]
    fn test_missing_collections_are_empty() {
        let doc = SnapshotCodec::decode(br#"{"schemaTag": "oil-change-tracker@2"}"#).unwrap();
        assert!(doc.is_empty());
    }
}
