//! Path containment
//!
//! Every asset reference and every archive entry name is resolved here before
//! the filesystem is touched. Resolution is purely lexical: the stored string
//! is normalized segment by segment and joined to the storage root, and any
//! `..` that would climb above the root is rejected as [`AssetError::PathEscape`].
//! No symlinks are followed during resolution.

use std::path::{Component, Path, PathBuf};

use super::errors::{AssetError, AssetResult};

/// Namespace segment that stored references carry in front of the
/// root-relative path (`uploads/vehicles/a.jpg`).
pub const REFERENCE_NAMESPACE: &str = "uploads";

/// Resolves references against one storage root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Create a guard for `root`. The root itself is normalized lexically.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: normalize_root(root.as_ref()),
        }
    }

    /// The normalized storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a stored asset reference (`uploads/receipts/r.pdf`,
    /// `/uploads/receipts/r.pdf` or `receipts/r.pdf`).
    pub fn resolve_reference(&self, reference: &str) -> AssetResult<PathBuf> {
        let relative = strip_namespace(reference);
        self.resolve_relative(relative)
            .map_err(|e| match e {
                AssetError::PathEscape(_) => AssetError::PathEscape(reference.to_string()),
                AssetError::InvalidReference(_) => {
                    AssetError::InvalidReference(reference.to_string())
                }
                other => other,
            })
    }

    /// Resolve a path relative to the storage root, such as the part of an
    /// archive entry name after `uploads/`.
    pub fn resolve_relative(&self, relative: &str) -> AssetResult<PathBuf> {
        let segments = normalize_segments(relative)?;
        if segments.is_empty() {
            return Err(AssetError::InvalidReference(relative.to_string()));
        }

        let mut resolved = self.root.clone();
        resolved.extend(segments);

        if !resolved.starts_with(&self.root) || resolved == self.root {
            return Err(AssetError::PathEscape(relative.to_string()));
        }
        Ok(resolved)
    }

    /// Normalized root-relative form of `relative`, `/`-separated
    pub fn normalize(&self, relative: &str) -> AssetResult<String> {
        Ok(normalize_segments(relative)?.join("/"))
    }
}

/// Build the stored reference for a root-relative path
pub fn reference_for(relative: &str) -> String {
    format!("{}/{}", REFERENCE_NAMESPACE, relative.trim_start_matches('/'))
}

fn strip_namespace(reference: &str) -> &str {
    let trimmed = reference.trim_start_matches(['/', '\\']);
    match trimmed.strip_prefix(REFERENCE_NAMESPACE) {
        Some(rest) if rest.starts_with(['/', '\\']) => rest,
        Some("") => "",
        _ => trimmed,
    }
}

/// Split `raw` into clean segments.
///
/// Backslashes count as separators, empty and `.` segments vanish and `..`
/// removes the previous segment. Climbing above the start is an escape.
fn normalize_segments(raw: &str) -> AssetResult<Vec<&str>> {
    if raw.contains('\0') {
        return Err(AssetError::InvalidReference(raw.to_string()));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(AssetError::PathEscape(raw.to_string()));
                }
            }
            s if is_drive_prefix(s) && segments.is_empty() => {
                return Err(AssetError::PathEscape(raw.to_string()));
            }
            s => segments.push(s),
        }
    }
    Ok(segments)
}

/// `C:` style prefixes would make `Path::join` discard the root on Windows
fn is_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn normalize_root(root: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in root.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
