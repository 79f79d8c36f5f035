//! Asset storage
//!
//! Binary assets (vehicle pictures, receipt scans, service photos) live in a
//! file tree under one storage root, split into one subdirectory per
//! [`AssetCategory`]. Records hold *references* to them, strings of the form
//! `uploads/<category dir>/<file name>`.
//!
//! Every reference is resolved through the [`PathGuard`] before any read,
//! write or delete, so a stored or archived name can never reach a file
//! outside the root.

mod category;
mod errors;
mod guard;
mod tree;

pub use category::{AssetCategory, CategoryLayout};
pub use errors::{AssetError, AssetResult};
pub use guard::{reference_for, PathGuard, REFERENCE_NAMESPACE};
pub use tree::{AssetFile, AssetTree};
