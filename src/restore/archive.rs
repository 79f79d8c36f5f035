//! Archive restore state machine
//!
//! ```text
//! Received -> Validated -> AssetsReplaced -> DataRestored -> Done
//!     \___________\______________\_______________\_____> Failed(reason)
//! ```
//!
//! Everything up to and including the containment check of every entry
//! happens before the asset tree is wiped. A failure after the wipe leaves
//! storage undefined and is reported as such; recovery is a re-run.

use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Seek};

use zip::ZipArchive;

use crate::assets::{AssetError, AssetTree, CategoryLayout, REFERENCE_NAMESPACE};
use crate::backup::SNAPSHOT_ENTRY;
use crate::maintenance::ExclusiveSlot;
use crate::observability::{Event, Logger};
use crate::snapshot::{SnapshotCodec, SnapshotDocument};
use crate::store::RecordStore;

use super::errors::{RestoreError, RestoreResult, StorageState};
use super::relational::{RelationalRestorer, RestoredCounts};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Size limits applied to an archive before anything is extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLimits {
    /// Upper bound on the archive size and on the total uncompressed size
    /// of its entries
    pub max_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_bytes: 200 * 1024 * 1024,
        }
    }
}

/// Restore progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreState {
    Received,
    Validated,
    AssetsReplaced,
    DataRestored,
    Done,
    Failed(String),
}

impl RestoreState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreState::Received => "RECEIVED",
            RestoreState::Validated => "VALIDATED",
            RestoreState::AssetsReplaced => "ASSETS_REPLACED",
            RestoreState::DataRestored => "DATA_RESTORED",
            RestoreState::Done => "DONE",
            RestoreState::Failed(_) => "FAILED",
        }
    }
}

impl fmt::Display for RestoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreState::Failed(reason) => write!(f, "FAILED({})", reason),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// An asset entry that passed containment, waiting to be written
#[derive(Debug)]
struct PlannedEntry {
    index: usize,
    name: String,
    relative: String,
    size: u64,
}

/// Outcome of a completed archive restore
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveOutcome {
    pub counts: RestoredCounts,
    pub assets_written: usize,
    pub skipped_entries: Vec<String>,
    pub document: SnapshotDocument,
}

/// One archive restore, driven step by step
pub struct ArchiveRestore<R: Read + Seek> {
    archive: ZipArchive<R>,
    limits: ArchiveLimits,
    state: RestoreState,
    snapshot_index: Option<usize>,
    prefix: String,
    document: Option<SnapshotDocument>,
    skipped: Vec<String>,
    assets_written: usize,
    counts: RestoredCounts,
}

impl<R: Read + Seek> ArchiveRestore<R> {
    /// Open the archive for random-access listing
    pub fn receive(reader: R, limits: ArchiveLimits) -> RestoreResult<Self> {
        let archive = ZipArchive::new(reader).map_err(|e| {
            RestoreError::archive_malformed("upload is not a readable zip archive").with_source(e)
        })?;

        let restore = Self {
            archive,
            limits,
            state: RestoreState::Received,
            snapshot_index: None,
            prefix: String::new(),
            document: None,
            skipped: Vec::new(),
            assets_written: 0,
            counts: RestoredCounts::default(),
        };
        Logger::info(
            Event::RestoreTransition.as_str(),
            &[
                ("entries", restore.archive.len().to_string().as_str()),
                ("state", restore.state.as_str()),
            ],
        );
        Ok(restore)
    }

    pub fn state(&self) -> &RestoreState {
        &self.state
    }

    fn transition(&mut self, next: RestoreState) {
        Logger::info(
            Event::RestoreTransition.as_str(),
            &[("from", self.state.as_str()), ("state", next.as_str())],
        );
        self.state = next;
    }

    fn fail(&mut self, err: RestoreError) -> RestoreError {
        let from = self.state.as_str();
        Logger::error(
            Event::RestoreTransition.as_str(),
            &[
                ("from", from),
                ("state", "FAILED"),
                ("code", err.kind().code()),
                ("storage", err.storage_state().as_str()),
                ("reason", err.message()),
            ],
        );
        self.state = RestoreState::Failed(err.to_string());
        err
    }

    fn expect_state(&self, expected: &RestoreState) -> RestoreResult<()> {
        if &self.state == expected {
            Ok(())
        } else {
            Err(RestoreError::failed(
                format!("restore step out of order: in {}, expected {}", self.state, expected),
                StorageState::Untouched,
            ))
        }
    }

    /// Locate and decode `db.json`; reject bad schemas before any write.
    pub fn validate(&mut self) -> RestoreResult<()> {
        self.expect_state(&RestoreState::Received)?;
        match self.locate_and_decode() {
            Ok(document) => {
                self.document = Some(document);
                self.transition(RestoreState::Validated);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn locate_and_decode(&mut self) -> RestoreResult<SnapshotDocument> {
        let mut found: Vec<(usize, String)> = Vec::new();
        for i in 0..self.archive.len() {
            let file = self.archive.by_index(i).map_err(|e| {
                RestoreError::archive_malformed(format!("unreadable entry #{}", i)).with_source(e)
            })?;
            if file.is_dir() {
                continue;
            }
            if let Some(prefix) = snapshot_prefix(&normalize_name(file.name())) {
                found.push((i, prefix));
            }
        }

        let (index, prefix) = match found.len() {
            0 => return Err(RestoreError::archive_malformed("archive has no db.json")),
            1 => found.remove(0),
            n => {
                return Err(RestoreError::archive_malformed(format!(
                    "archive has {} db.json entries",
                    n
                )))
            }
        };

        let mut file = self.archive.by_index(index).map_err(|e| {
            RestoreError::archive_malformed("unreadable db.json").with_source(e)
        })?;
        if file.size() > self.limits.max_bytes {
            return Err(RestoreError::archive_malformed(format!(
                "db.json is {} bytes, limit is {}",
                file.size(),
                self.limits.max_bytes
            )));
        }

        let mut raw = Vec::new();
        (&mut file)
            .take(self.limits.max_bytes.saturating_add(1))
            .read_to_end(&mut raw)
            .map_err(|e| RestoreError::archive_malformed("unreadable db.json").with_source(e))?;
        if raw.len() as u64 > self.limits.max_bytes {
            return Err(RestoreError::archive_malformed("db.json exceeds the size limit"));
        }
        drop(file);

        let document = SnapshotCodec::decode(&raw)?;
        self.snapshot_index = Some(index);
        self.prefix = prefix;
        Ok(document)
    }

    /// Check every asset entry against the guard, then wipe the asset tree
    /// and write the entries.
    pub fn replace_assets(
        &mut self,
        tree: &AssetTree,
        _slot: &ExclusiveSlot<'_>,
    ) -> RestoreResult<usize> {
        self.expect_state(&RestoreState::Validated)?;

        let plan = match self.plan_entries(tree) {
            Ok(plan) => plan,
            Err(e) => return Err(self.fail(e)),
        };

        Logger::warn(
            Event::RestoreWipe.as_str(),
            &[
                ("root", tree.root().display().to_string().as_str()),
                ("entries", plan.len().to_string().as_str()),
            ],
        );
        if let Err(e) = tree.wipe_and_recreate() {
            let err = RestoreError::failed("could not wipe the asset tree", StorageState::Undefined)
                .with_source(e);
            return Err(self.fail(err));
        }

        for entry in &plan {
            if let Err(e) = self.write_entry(tree, entry) {
                return Err(self.fail(e));
            }
            self.assets_written += 1;
        }

        self.transition(RestoreState::AssetsReplaced);
        Ok(self.assets_written)
    }

    fn plan_entries(&mut self, tree: &AssetTree) -> RestoreResult<Vec<PlannedEntry>> {
        let uploads_prefix = format!("{}{}/", self.prefix, REFERENCE_NAMESPACE);
        let mut plan = Vec::new();
        let mut total: u64 = 0;

        for i in 0..self.archive.len() {
            if Some(i) == self.snapshot_index {
                continue;
            }
            let (name, is_dir, mode, size) = {
                let file = self.archive.by_index(i).map_err(|e| {
                    RestoreError::archive_malformed(format!("unreadable entry #{}", i))
                        .with_source(e)
                })?;
                (
                    normalize_name(file.name()),
                    file.is_dir(),
                    file.unix_mode(),
                    file.size(),
                )
            };

            if is_dir {
                continue;
            }
            let relative = match name.strip_prefix(&uploads_prefix) {
                Some(rel) => rel.to_string(),
                None => {
                    self.skip(&name, "outside uploads/");
                    continue;
                }
            };

            if is_symlink(mode) {
                self.skip(&name, "symbolic link");
                continue;
            }

            let guard = tree.guard();
            let relative = match guard
                .resolve_relative(&relative)
                .and_then(|_| guard.normalize(&relative))
            {
                Ok(normalized) => normalized,
                Err(AssetError::PathEscape(_)) => {
                    Logger::error(Event::RestorePathEscape.as_str(), &[("entry", name.as_str())]);
                    return Err(RestoreError::path_escape(&name));
                }
                Err(e) => {
                    return Err(RestoreError::archive_malformed(format!(
                        "invalid entry name {:?}",
                        name
                    ))
                    .with_source(e))
                }
            };

            total = total.saturating_add(size);
            if total > self.limits.max_bytes {
                return Err(RestoreError::archive_malformed(format!(
                    "archive expands beyond the {} byte limit",
                    self.limits.max_bytes
                )));
            }

            plan.push(PlannedEntry {
                index: i,
                name,
                relative,
                size,
            });
        }

        check_writable(&plan, tree.layout())?;
        Ok(plan)
    }

    fn skip(&mut self, name: &str, reason: &str) {
        Logger::warn(
            Event::RestoreEntrySkipped.as_str(),
            &[("entry", name), ("reason", reason)],
        );
        self.skipped.push(name.to_string());
    }

    fn write_entry(&mut self, tree: &AssetTree, entry: &PlannedEntry) -> RestoreResult<()> {
        let after_wipe = |message: String| RestoreError::failed(message, StorageState::Undefined);

        let mut file = self.archive.by_index(entry.index).map_err(|e| {
            after_wipe(format!("could not reopen entry {}", entry.name)).with_source(e)
        })?;

        let mut limited = (&mut file).take(entry.size.saturating_add(1));
        let written = tree
            .write_entry(&entry.relative, &mut limited)
            .map_err(|e| after_wipe(format!("could not write entry {}", entry.name)).with_source(e))?;

        if written > entry.size {
            return Err(after_wipe(format!(
                "entry {} is larger than its declared {} bytes",
                entry.name, entry.size
            )));
        }
        Ok(())
    }

    /// Apply the decoded document to the record store
    pub fn restore_data(
        &mut self,
        store: &RecordStore,
        slot: &ExclusiveSlot<'_>,
    ) -> RestoreResult<RestoredCounts> {
        self.expect_state(&RestoreState::AssetsReplaced)?;
        let document = match self.document.as_ref() {
            Some(doc) => doc,
            None => {
                let err = RestoreError::failed("no decoded document", StorageState::Undefined);
                return Err(self.fail(err));
            }
        };

        match RelationalRestorer::apply(store, document, slot) {
            Ok(counts) => {
                self.counts = counts;
                self.transition(RestoreState::DataRestored);
                Ok(counts)
            }
            Err(e) => {
                let err = e.with_storage_state(StorageState::Undefined);
                Err(self.fail(err))
            }
        }
    }

    /// Close the restore
    pub fn finish(mut self) -> RestoreResult<ArchiveOutcome> {
        self.expect_state(&RestoreState::DataRestored)?;
        self.transition(RestoreState::Done);

        let document = self.document.take().ok_or_else(|| {
            RestoreError::failed("no decoded document", StorageState::Undefined)
        })?;
        Ok(ArchiveOutcome {
            counts: self.counts,
            assets_written: self.assets_written,
            skipped_entries: std::mem::take(&mut self.skipped),
            document,
        })
    }

    /// Drive every step in order
    pub fn run(
        reader: R,
        limits: ArchiveLimits,
        tree: &AssetTree,
        store: &RecordStore,
        slot: &ExclusiveSlot<'_>,
    ) -> RestoreResult<ArchiveOutcome> {
        let mut restore = Self::receive(reader, limits)?;
        restore.validate()?;
        restore.replace_assets(tree, slot)?;
        restore.restore_data(store, slot)?;
        restore.finish()
    }
}

/// Forward slashes only
fn normalize_name(name: &str) -> String {
    name.replace('\\', "/")
}

/// Directory prefix of a `db.json` entry at the top level or one directory
/// deep (`""` or `"dir/"`); `None` for any other entry.
fn snapshot_prefix(name: &str) -> Option<String> {
    if name == SNAPSHOT_ENTRY {
        return Some(String::new());
    }
    let dir = name.strip_suffix(SNAPSHOT_ENTRY)?.strip_suffix('/')?;
    if dir.is_empty() || dir.contains('/') || dir == "." || dir == ".." {
        return None;
    }
    Some(format!("{}/", dir))
}

/// Every planned file must land where a file can be created once the tree
/// is wiped: not on a category directory, and not on a path another entry
/// needs as a directory.
fn check_writable(plan: &[PlannedEntry], layout: &CategoryLayout) -> RestoreResult<()> {
    let files: HashSet<&str> = plan.iter().map(|e| e.relative.as_str()).collect();

    for entry in plan {
        if layout.dirs().any(|dir| dir == entry.relative) {
            return Err(RestoreError::archive_malformed(format!(
                "entry {} is a file where the {} directory belongs",
                entry.name, entry.relative
            )));
        }

        let mut ancestor = entry.relative.as_str();
        while let Some((parent, _)) = ancestor.rsplit_once('/') {
            if files.contains(parent) {
                return Err(RestoreError::archive_malformed(format!(
                    "entry {} needs {} as a directory, but the archive also holds it as a file",
                    entry.name, parent
                )));
            }
            ancestor = parent;
        }
    }
    Ok(())
}

fn is_symlink(mode: Option<u32>) -> bool {
    matches!(mode, Some(m) if m & S_IFMT == S_IFLNK)
}
