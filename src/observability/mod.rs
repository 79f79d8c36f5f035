//! Observability for the backup and restore engine
//!
//! - Structured logging (JSON lines on stderr)
//! - Explicit event names
//! - Scope-based begin/complete logging
//!
//! Observability is read-only: nothing here changes the outcome of an
//! operation, and logging failures are ignored.
//!
//! # Usage
//!
//! ```ignore
//! use oiltrack::observability::{Event, Logger, ObservationScope};
//!
//! Logger::info(Event::RestoreWipe.as_str(), &[("root", "/data/uploads")]);
//!
//! let scope = ObservationScope::new("BACKUP");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::ObservationScope;
