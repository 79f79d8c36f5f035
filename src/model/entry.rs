use serde::{Deserialize, Serialize};

use super::{null_as_default, pick, RecordId};

/// One maintenance event recorded against a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub id: RecordId,
    pub vehicle_id: RecordId,
    /// Calendar date of the service, `YYYY-MM-DD`
    pub date: String,
    #[serde(default)]
    pub mileage: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub oil_brand: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub oil_weight: String,
    #[serde(default)]
    pub oil_quarts: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filter_brand: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filter_part: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    /// Asset reference of the receipt scan
    #[serde(default)]
    pub receipt_path: Option<String>,
    /// Asset references of the photos, in upload order
    #[serde(default)]
    pub photo_paths: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: String,
}

impl ServiceEntry {
    /// Every asset reference owned by this entry: receipt first, then photos
    pub fn asset_references(&self) -> impl Iterator<Item = &str> {
        self.receipt_path
            .as_deref()
            .into_iter()
            .chain(self.photo_paths.iter().map(String::as_str))
    }
}

/// Input for creating a service entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewServiceEntry {
    /// Defaults to today when absent
    pub date: Option<String>,
    pub mileage: Option<i64>,
    pub oil_brand: String,
    pub oil_weight: String,
    pub oil_quarts: Option<f64>,
    pub filter_brand: String,
    pub filter_part: String,
    pub notes: String,
    pub receipt_path: Option<String>,
    pub photo_paths: Vec<String>,
}

/// Partial update of a service entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceEntryPatch {
    pub date: Option<String>,
    pub mileage: Option<Option<i64>>,
    pub oil_brand: Option<String>,
    pub oil_weight: Option<String>,
    pub oil_quarts: Option<Option<f64>>,
    pub filter_brand: Option<String>,
    pub filter_part: Option<String>,
    pub notes: Option<String>,
    pub receipt_path: Option<Option<String>>,
    pub photo_paths: Option<Vec<String>>,
}

impl ServiceEntryPatch {
    /// Merge the patch over `existing`; ids and `created_at` never change.
    pub fn apply(self, existing: &ServiceEntry, updated_at: String) -> ServiceEntry {
        ServiceEntry {
            id: existing.id,
            vehicle_id: existing.vehicle_id,
            date: pick(self.date, &existing.date),
            mileage: pick(self.mileage, &existing.mileage),
            oil_brand: pick(self.oil_brand, &existing.oil_brand),
            oil_weight: pick(self.oil_weight, &existing.oil_weight),
            oil_quarts: pick(self.oil_quarts, &existing.oil_quarts),
            filter_brand: pick(self.filter_brand, &existing.filter_brand),
            filter_part: pick(self.filter_part, &existing.filter_part),
            notes: pick(self.notes, &existing.notes),
            receipt_path: pick(self.receipt_path, &existing.receipt_path),
            photo_paths: pick(self.photo_paths, &existing.photo_paths),
            created_at: existing.created_at.clone(),
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oil_change() -> ServiceEntry {
        ServiceEntry {
            id: 10,
            vehicle_id: 1,
            date: "2024-01-01".into(),
            mileage: Some(120_500),
            oil_brand: "Mobil 1".into(),
            oil_weight: "5W-20".into(),
            oil_quarts: Some(6.0),
            filter_brand: "Motorcraft".into(),
            filter_part: "FL-820S".into(),
            notes: String::new(),
            receipt_path: Some("uploads/receipts/r.pdf".into()),
            photo_paths: vec!["uploads/entry_photos/a.jpg".into()],
            created_at: "2024-01-01T00:00:00.000Z".into(),
            updated_at: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn test_asset_references_receipt_then_photos() {
        let entry = oil_change();
        let refs: Vec<&str> = entry.asset_references().collect();
        assert_eq!(refs, vec!["uploads/receipts/r.pdf", "uploads/entry_photos/a.jpg"]);
    }

    #[test]
    fn test_patch_clears_receipt_and_mileage() {
        let patch = ServiceEntryPatch {
            receipt_path: Some(None),
            mileage: Some(None),
            ..ServiceEntryPatch::default()
        };
        let updated = patch.apply(&oil_change(), "later".into());

        assert_eq!(updated.receipt_path, None);
        assert_eq!(updated.mileage, None);
        assert_eq!(updated.photo_paths, oil_change().photo_paths);
        assert_eq!(updated.vehicle_id, 1);
    }

    #[test]
    fn test_missing_photo_paths_defaults_to_empty() {
        let json = r#"{"id": 1, "vehicle_id": 2, "date": "2020-02-02"}"#;
        let entry: ServiceEntry = serde_json::from_str(json).unwrap();
        assert!(entry.photo_paths.is_empty());
        assert_eq!(entry.notes, "");
    }
}
