//! Observable events
//!
//! Events are explicit and typed. Operation boundaries (`BACKUP_BEGIN`,
//! `RESTORE_FAILED`, ...) come from [`super::ObservationScope`]; everything
//! in between uses one of these names.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Workspace opened
    WorkspaceOpen,
    /// Workspace closed
    WorkspaceClose,
    /// Configuration loaded
    ConfigLoaded,

    // Maintenance slot
    /// Maintenance slot acquisition timed out
    MaintenanceBusy,

    // Restore
    /// Restore moved to a new state
    RestoreTransition,
    /// Storage root wiped (point of no return)
    RestoreWipe,
    /// Archive entry rejected by path containment
    RestorePathEscape,
    /// Archive entry skipped
    RestoreEntrySkipped,

    // Assets
    /// Asset written
    AssetStored,
    /// Asset deleted
    AssetDeleted,
    /// Asset already missing at delete time
    AssetMissing,
    /// Asset reference rejected by path containment
    AssetRejected,
    /// Record references an asset that is not on disk
    AssetDangling,
    /// Asset could not be removed from disk
    AssetDeleteFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::WorkspaceOpen => "WORKSPACE_OPEN",
            Event::WorkspaceClose => "WORKSPACE_CLOSE",
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::MaintenanceBusy => "MAINTENANCE_BUSY",

            Event::RestoreTransition => "RESTORE_STATE",
            Event::RestoreWipe => "RESTORE_WIPE",
            Event::RestorePathEscape => "RESTORE_PATH_ESCAPE",
            Event::RestoreEntrySkipped => "RESTORE_ENTRY_SKIPPED",

            Event::AssetStored => "ASSET_STORED",
            Event::AssetDeleted => "ASSET_DELETED",
            Event::AssetMissing => "ASSET_MISSING",
            Event::AssetRejected => "ASSET_REJECTED",
            Event::AssetDangling => "ASSET_DANGLING",
            Event::AssetDeleteFailed => "ASSET_DELETE_FAILED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
