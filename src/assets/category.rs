//! Asset categories and their storage subdirectories

use serde::{Deserialize, Serialize};

/// Kind of uploaded asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCategory {
    VehicleImage,
    Receipt,
    EntryPhoto,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 3] = [
        AssetCategory::VehicleImage,
        AssetCategory::Receipt,
        AssetCategory::EntryPhoto,
    ];
}

fn default_vehicles() -> String {
    "vehicles".to_string()
}

fn default_receipts() -> String {
    "receipts".to_string()
}

fn default_entry_photos() -> String {
    "entry_photos".to_string()
}

/// Mapping of asset categories to subdirectories of the storage root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLayout {
    #[serde(default = "default_vehicles")]
    pub vehicles: String,
    #[serde(default = "default_receipts")]
    pub receipts: String,
    #[serde(default = "default_entry_photos")]
    pub entry_photos: String,
}

impl Default for CategoryLayout {
    fn default() -> Self {
        Self {
            vehicles: default_vehicles(),
            receipts: default_receipts(),
            entry_photos: default_entry_photos(),
        }
    }
}

impl CategoryLayout {
    /// Subdirectory holding assets of `category`
    pub fn dir_for(&self, category: AssetCategory) -> &str {
        match category {
            AssetCategory::VehicleImage => &self.vehicles,
            AssetCategory::Receipt => &self.receipts,
            AssetCategory::EntryPhoto => &self.entry_photos,
        }
    }

    /// All subdirectories, in category order
    pub fn dirs(&self) -> impl Iterator<Item = &str> {
        AssetCategory::ALL.into_iter().map(move |c| self.dir_for(c))
    }

    /// Every subdirectory must be one plain, distinct path segment
    pub fn validate(&self) -> Result<(), String> {
        let dirs: Vec<&str> = self.dirs().collect();
        for (i, dir) in dirs.iter().enumerate() {
            if dir.is_empty() || *dir == "." || *dir == ".." {
                return Err(format!("invalid category directory {:?}", dir));
            }
            if dir.contains(['/', '\\', '\0']) {
                return Err(format!(
                    "category directory must be a single segment: {:?}",
                    dir
                ));
            }
            if dirs[..i].contains(dir) {
                return Err(format!("duplicate category directory {:?}", dir));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_valid() {
        let layout = CategoryLayout::default();
        assert!(layout.validate().is_ok());
        assert_eq!(
            layout.dirs().collect::<Vec<_>>(),
            vec!["vehicles", "receipts", "entry_photos"]
        );
    }

    #[test]
    fn test_rejects_nested_and_duplicate_dirs() {
        let nested = CategoryLayout {
            receipts: "a/b".into(),
            ..CategoryLayout::default()
        };
        assert!(nested.validate().is_err());

        let dup = CategoryLayout {
            entry_photos: "vehicles".into(),
            ..CategoryLayout::default()
        };
        assert!(dup.validate().is_err());

        let parent = CategoryLayout {
            vehicles: "..".into(),
            ..CategoryLayout::default()
        };
        assert!(parent.validate().is_err());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let layout: CategoryLayout = serde_json::from_str(r#"{"receipts": "scans"}"#).unwrap();
        assert_eq!(layout.dir_for(AssetCategory::Receipt), "scans");
        assert_eq!(layout.dir_for(AssetCategory::VehicleImage), "vehicles");
    }
}
