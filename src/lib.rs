//! oiltrack - backup and restore engine for the oil change tracker
//!
//! Produces and consumes two backup forms of a vehicle maintenance dataset:
//!
//! - a relational snapshot document (`db.json`): every vehicle and service
//!   entry, tagged `oil-change-tracker@<version>`
//! - a full archive: a zip holding `db.json` plus the asset tree under
//!   `uploads/`
//!
//! A full restore validates the archive before anything is touched, then
//! replaces the asset tree and swaps all records in one transaction.

pub mod assets;
pub mod backup;
pub mod cli;
pub mod config;
pub mod garage;
pub mod maintenance;
pub mod model;
pub mod observability;
pub mod restore;
pub mod snapshot;
pub mod store;
pub mod workspace;
