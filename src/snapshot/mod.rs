//! Relational snapshots
//!
//! A snapshot is a self-describing JSON document holding every vehicle and
//! service entry. The document names its product and schema version in its
//! `schemaTag`; older versions are upgraded on decode, newer ones and
//! documents of other products are refused.
//!
//! ```json
//! {
//!   "schemaTag": "oil-change-tracker@2",
//!   "exportedAt": "2024-05-01T12:00:00.000Z",
//!   "vehicles": [ ... ],
//!   "serviceEntries": [ ... ]
//! }
//! ```

mod codec;
mod document;
mod errors;
mod migrate;
mod tag;

pub use codec::SnapshotCodec;
pub use document::SnapshotDocument;
pub use errors::{SnapshotError, SnapshotErrorCode, SnapshotResult};
pub use tag::{SchemaTag, CURRENT_SCHEMA_VERSION, OLDEST_SCHEMA_VERSION, PRODUCT_ID};
