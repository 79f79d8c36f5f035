//! The snapshot document

use serde::{Deserialize, Serialize};

use crate::model::{ServiceEntry, Vehicle};

/// Self-describing, point-in-time copy of every relational record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// `<product-id>@<version>`
    #[serde(rename = "schemaTag")]
    pub schema_tag: String,
    /// When the snapshot was taken; informational only
    #[serde(rename = "exportedAt", default)]
    pub exported_at: String,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(rename = "serviceEntries", default)]
    pub service_entries: Vec<ServiceEntry>,
}

impl SnapshotDocument {
    /// Every asset reference held by any record, in record order
    pub fn asset_references(&self) -> impl Iterator<Item = &str> {
        self.vehicles
            .iter()
            .flat_map(|v| v.asset_references())
            .chain(
                self.service_entries
                    .iter()
                    .flat_map(|e| e.asset_references()),
            )
    }

    /// Whether the document holds no records at all
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty() && self.service_entries.is_empty()
    }
}
