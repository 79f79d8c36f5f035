//! Upgrading older and legacy-shaped documents
//!
//! Upgrades run on the untyped JSON tree before the typed decode. Each step
//! lifts a document from version `n` to `n + 1`; the steps run in order
//! until the document reaches the current version.

use serde_json::{Map, Value};

use super::errors::{SnapshotError, SnapshotResult};
use super::tag::CURRENT_SCHEMA_VERSION;

type Step = fn(&mut Map<String, Value>) -> SnapshotResult<()>;

/// `STEPS[n - 1]` upgrades version `n` to `n + 1`
const STEPS: [Step; (CURRENT_SCHEMA_VERSION - 1) as usize] = [v1_to_v2];

/// Bring `doc` from `version` up to the current version
pub fn upgrade(doc: &mut Map<String, Value>, version: u32) -> SnapshotResult<()> {
    for step in STEPS.iter().skip(version.saturating_sub(1) as usize) {
        step(doc)?;
    }
    Ok(())
}

/// Version 1 had no photo sequence on service entries
fn v1_to_v2(doc: &mut Map<String, Value>) -> SnapshotResult<()> {
    for entry in records_mut(doc, "serviceEntries")? {
        entry.remove("photo_paths_json");
        entry.insert("photo_paths".to_string(), Value::Array(Vec::new()));
    }
    Ok(())
}

/// Rename top-level and per-record fields written by older exporters
/// (`schema`, `exported_at`, `service_entries`, JSON-in-text columns).
pub fn normalize_legacy_fields(doc: &mut Map<String, Value>) -> SnapshotResult<()> {
    rename_key(doc, "schema", "schemaTag");
    rename_key(doc, "exported_at", "exportedAt");
    rename_key(doc, "service_entries", "serviceEntries");

    for vehicle in records_mut(doc, "vehicles")? {
        if let Some(raw) = vehicle.remove("vin_decoded_json") {
            if !vehicle.contains_key("vin_decoded") {
                vehicle.insert("vin_decoded".to_string(), parse_json_text(raw));
            }
        }
    }

    for entry in records_mut(doc, "serviceEntries")? {
        if let Some(raw) = entry.remove("photo_paths_json") {
            if entry.contains_key("photo_paths") {
                continue;
            }
            let photos = match raw {
                Value::Null => Value::Array(Vec::new()),
                Value::String(text) => serde_json::from_str(&text).map_err(|e| {
                    SnapshotError::invalid_format(format!(
                        "service entry {} has unreadable photo_paths_json",
                        record_id(entry)
                    ))
                    .with_source(e)
                })?,
                other => other,
            };
            entry.insert("photo_paths".to_string(), photos);
        }
    }

    Ok(())
}

fn rename_key(doc: &mut Map<String, Value>, legacy: &str, current: &str) {
    if let Some(value) = doc.remove(legacy) {
        if !doc.contains_key(current) {
            doc.insert(current.to_string(), value);
        }
    }
}

/// Text columns holding JSON are decoded when they parse, kept verbatim
/// otherwise.
fn parse_json_text(raw: Value) -> Value {
    match raw {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

fn record_id(record: &Map<String, Value>) -> String {
    record
        .get("id")
        .map(Value::to_string)
        .unwrap_or_else(|| "?".to_string())
}

/// The record objects of one collection; a missing or null collection is
/// empty.
fn records_mut<'a>(
    doc: &'a mut Map<String, Value>,
    collection: &str,
) -> SnapshotResult<Vec<&'a mut Map<String, Value>>> {
    match doc.get_mut(collection) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter_mut()
            .map(|item| match item {
                Value::Object(record) => Ok(record),
                _ => Err(SnapshotError::invalid_format(format!(
                    "{} must contain only objects",
                    collection
                ))),
            })
            .collect(),
        Some(_) => Err(SnapshotError::invalid_format(format!(
            "{} must be an array",
            collection
        ))),
    }
}
