//! Relational records of the tracker
//!
//! Two record kinds exist: [`Vehicle`] and [`ServiceEntry`]. A service entry
//! always belongs to exactly one vehicle and is deleted with it.
//!
//! Each record kind has a creation input (`New*`) and a partial update
//! (`*Patch`). A patch distinguishes "not supplied" from every concrete value:
//! plain fields are `Option<T>`, nullable fields are `Option<Option<T>>`, so
//! `Some(0)` and `Some(None)` are real updates while `None` keeps the
//! existing value.

mod entry;
mod vehicle;

pub use entry::{NewServiceEntry, ServiceEntry, ServiceEntryPatch};
pub use vehicle::{NewVehicle, Vehicle, VehiclePatch};

use serde::{Deserialize, Deserializer};

/// Record identifier
pub type RecordId = i64;

/// Default service interval in miles for new vehicles
pub const DEFAULT_INTERVAL_MILES: i64 = 5000;

/// Default service interval in months for new vehicles
pub const DEFAULT_INTERVAL_MONTHS: i64 = 6;

/// Current wall-clock time in the stored timestamp format
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Deserialize `null` as the type's default value.
///
/// Text columns in older snapshots may be `null` where newer code always
/// writes an empty string.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn pick<T>(update: Option<T>, existing: &T) -> T
where
    T: Clone,
{
    update.unwrap_or_else(|| existing.clone())
}
