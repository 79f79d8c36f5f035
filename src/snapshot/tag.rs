//! Schema tags: `<product-id>@<version>`

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::errors::{SnapshotError, SnapshotResult};

/// Product identifier carried by every snapshot of this application
pub const PRODUCT_ID: &str = "oil-change-tracker";

/// Schema version written by this build
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Oldest schema version this build can upgrade
pub const OLDEST_SCHEMA_VERSION: u32 = 1;

fn tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^oil-change-tracker@([0-9]+)$").expect("tag pattern is valid"))
}

/// A parsed, product-checked schema tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaTag {
    version: u32,
}

impl SchemaTag {
    /// Tag written by this build
    pub fn current() -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
        }
    }

    /// Parse and check a raw tag.
    ///
    /// Anything that is not `oil-change-tracker@<digits>` is an invalid
    /// format; a well-formed tag outside the readable version range is an
    /// unsupported schema.
    pub fn parse(raw: &str) -> SnapshotResult<Self> {
        let captures = tag_pattern().captures(raw).ok_or_else(|| {
            SnapshotError::invalid_format(format!("not a {} snapshot: {:?}", PRODUCT_ID, raw))
        })?;

        let digits = &captures[1];
        let version: u32 = digits.parse().map_err(|_| {
            SnapshotError::unsupported_schema(format!("schema version {} is out of range", digits))
        })?;

        if !(OLDEST_SCHEMA_VERSION..=CURRENT_SCHEMA_VERSION).contains(&version) {
            return Err(SnapshotError::unsupported_schema(format!(
                "schema version {} is not supported (readable: {}..={})",
                version, OLDEST_SCHEMA_VERSION, CURRENT_SCHEMA_VERSION
            )));
        }

        Ok(Self { version })
    }

    pub fn version(&self) -> u32 {
        self.version
    }
}

impl fmt::Display for SchemaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", PRODUCT_ID, self.version)
    }
}
