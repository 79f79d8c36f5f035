use serde::{Deserialize, Serialize};

use super::{
    null_as_default, pick, RecordId, DEFAULT_INTERVAL_MILES, DEFAULT_INTERVAL_MONTHS,
};

fn default_interval_miles() -> i64 {
    DEFAULT_INTERVAL_MILES
}

fn default_interval_months() -> i64 {
    DEFAULT_INTERVAL_MONTHS
}

/// A tracked vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: RecordId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nickname: String,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub make: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vin: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner_first: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner_last: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_mileage: i64,
    #[serde(default)]
    pub oil_quarts: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub oil_weight: String,
    #[serde(default = "default_interval_miles")]
    pub service_interval_miles: i64,
    #[serde(default = "default_interval_months")]
    pub service_interval_months: i64,
    /// Asset reference of the vehicle picture
    #[serde(default)]
    pub image_path: Option<String>,
    /// Decoded VIN metadata, stored opaquely
    #[serde(default, alias = "vin_decoded_json")]
    pub vin_decoded: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: String,
}

impl Vehicle {
    /// Asset references owned by this vehicle record itself
    pub fn asset_references(&self) -> impl Iterator<Item = &str> {
        self.image_path.as_deref().into_iter()
    }
}

/// Input for creating a vehicle
#[derive(Debug, Clone, PartialEq)]
pub struct NewVehicle {
    pub nickname: String,
    pub year: Option<i64>,
    pub make: String,
    pub model: String,
    pub vin: String,
    pub owner_first: String,
    pub owner_last: String,
    pub current_mileage: i64,
    pub oil_quarts: Option<f64>,
    pub oil_weight: String,
    pub service_interval_miles: i64,
    pub service_interval_months: i64,
    pub image_path: Option<String>,
    pub vin_decoded: Option<serde_json::Value>,
}

impl Default for NewVehicle {
    fn default() -> Self {
        Self {
            nickname: String::new(),
            year: None,
            make: String::new(),
            model: String::new(),
            vin: String::new(),
            owner_first: String::new(),
            owner_last: String::new(),
            current_mileage: 0,
            oil_quarts: None,
            oil_weight: String::new(),
            service_interval_miles: DEFAULT_INTERVAL_MILES,
            service_interval_months: DEFAULT_INTERVAL_MONTHS,
            image_path: None,
            vin_decoded: None,
        }
    }
}

impl NewVehicle {
    /// Shorthand for a vehicle with only a nickname
    pub fn named(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            ..Self::default()
        }
    }
}

/// Partial update of a vehicle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehiclePatch {
    pub nickname: Option<String>,
    pub year: Option<Option<i64>>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub vin: Option<String>,
    pub owner_first: Option<String>,
    pub owner_last: Option<String>,
    pub current_mileage: Option<i64>,
    pub oil_quarts: Option<Option<f64>>,
    pub oil_weight: Option<String>,
    pub service_interval_miles: Option<i64>,
    pub service_interval_months: Option<i64>,
    pub image_path: Option<Option<String>>,
    pub vin_decoded: Option<Option<serde_json::Value>>,
}

impl VehiclePatch {
    /// Merge the patch over `existing`; `id` and `created_at` never change.
    pub fn apply(self, existing: &Vehicle, updated_at: String) -> Vehicle {
        Vehicle {
            id: existing.id,
            nickname: pick(self.nickname, &existing.nickname),
            year: pick(self.year, &existing.year),
            make: pick(self.make, &existing.make),
            model: pick(self.model, &existing.model),
            vin: pick(self.vin, &existing.vin).trim().to_string(),
            owner_first: pick(self.owner_first, &existing.owner_first),
            owner_last: pick(self.owner_last, &existing.owner_last),
            current_mileage: pick(self.current_mileage, &existing.current_mileage),
            oil_quarts: pick(self.oil_quarts, &existing.oil_quarts),
            oil_weight: pick(self.oil_weight, &existing.oil_weight),
            service_interval_miles: pick(
                self.service_interval_miles,
                &existing.service_interval_miles,
            ),
            service_interval_months: pick(
                self.service_interval_months,
                &existing.service_interval_months,
            ),
            image_path: pick(self.image_path, &existing.image_path),
            vin_decoded: pick(self.vin_decoded, &existing.vin_decoded),
            created_at: existing.created_at.clone(),
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truck() -> Vehicle {
        Vehicle {
            id: 1,
            nickname: "Truck".into(),
            year: Some(2004),
            make: "Ford".into(),
            model: "F-150".into(),
            vin: "1FTRX18W1XKA12345".into(),
            owner_first: "Sam".into(),
            owner_last: "Lee".into(),
            current_mileage: 120_000,
            oil_quarts: Some(6.0),
            oil_weight: "5W-20".into(),
            service_interval_miles: 5000,
            service_interval_months: 6,
            image_path: Some("uploads/vehicles/truck.jpg".into()),
            vin_decoded: None,
            created_at: "2024-01-01T00:00:00.000Z".into(),
            updated_at: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn test_empty_patch_keeps_everything() {
        let existing = truck();
        let updated = VehiclePatch::default().apply(&existing, "later".into());

        assert_eq!(updated.nickname, existing.nickname);
        assert_eq!(updated.year, existing.year);
        assert_eq!(updated.image_path, existing.image_path);
        assert_eq!(updated.updated_at, "later");
        assert_eq!(updated.created_at, existing.created_at);
    }

    #[test]
    fn test_zero_and_null_are_real_updates() {
        let existing = truck();
        let patch = VehiclePatch {
            current_mileage: Some(0),
            year: Some(None),
            oil_quarts: Some(None),
            image_path: Some(None),
            nickname: Some(String::new()),
            ..VehiclePatch::default()
        };

        let updated = patch.apply(&existing, "later".into());

        assert_eq!(updated.current_mileage, 0);
        assert_eq!(updated.year, None);
        assert_eq!(updated.oil_quarts, None);
        assert_eq!(updated.image_path, None);
        assert_eq!(updated.nickname, "");
    }

    #[test]
    fn test_vin_is_trimmed() {
        let patch = VehiclePatch {
            vin: Some("  ABC123 ".into()),
            ..VehiclePatch::default()
        };
        assert_eq!(patch.apply(&truck(), "t".into()).vin, "ABC123");
    }

    #[test]
    fn test_deserialize_tolerates_nulls_and_legacy_names() {
        let json = r#"{
            "id": 7, "nickname": null, "make": "Honda",
            "vin_decoded_json": "{\"Make\":\"HONDA\"}",
            "created_at": "2023-05-01 10:00:00", "updated_at": "2023-05-01 10:00:00"
        }"#;
        let vehicle: Vehicle = serde_json::from_str(json).unwrap();

        assert_eq!(vehicle.nickname, "");
        assert_eq!(vehicle.service_interval_miles, DEFAULT_INTERVAL_MILES);
        assert_eq!(
            vehicle.vin_decoded,
            Some(serde_json::Value::String("{\"Make\":\"HONDA\"}".into()))
        );
    }
}
