//! On-disk asset hierarchy

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;

use crate::observability::{Event, Logger};

use super::category::{AssetCategory, CategoryLayout};
use super::errors::{AssetError, AssetResult};
use super::guard::{reference_for, PathGuard};

/// One regular file found under the storage root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    /// Root-relative path with `/` separators
    pub relative: String,
    /// Absolute filesystem path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

impl AssetFile {
    /// Stored reference form of this file
    pub fn reference(&self) -> String {
        reference_for(&self.relative)
    }
}

/// Owner of the storage root and its category subdirectories
#[derive(Debug, Clone)]
pub struct AssetTree {
    guard: PathGuard,
    layout: CategoryLayout,
}

impl AssetTree {
    pub fn new(root: impl AsRef<Path>, layout: CategoryLayout) -> Self {
        Self {
            guard: PathGuard::new(root),
            layout,
        }
    }

    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    pub fn layout(&self) -> &CategoryLayout {
        &self.layout
    }

    /// Create the storage root and every category subdirectory
    pub fn ensure_layout(&self) -> AssetResult<()> {
        for dir in self.layout.dirs() {
            let path = self.root().join(dir);
            fs::create_dir_all(&path).map_err(|e| AssetError::io(&path, e))?;
        }
        Ok(())
    }

    /// Every regular file under the root, sorted by relative path.
    ///
    /// Symbolic links are not followed and not listed. A missing root is an
    /// empty tree.
    pub fn enumerate(&self) -> AssetResult<Vec<AssetFile>> {
        let mut files = Vec::new();
        match fs::symlink_metadata(self.root()) {
            Ok(meta) if meta.is_dir() => {
                collect_files(self.root(), self.root(), &mut files)?;
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(AssetError::io(self.root(), e)),
        }
        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(files)
    }

    /// Whether the referenced asset exists as a regular file
    pub fn exists(&self, reference: &str) -> AssetResult<bool> {
        let path = self.guard.resolve_reference(reference)?;
        match fs::symlink_metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AssetError::io(path, e)),
        }
    }

    /// Read the referenced asset
    pub fn read(&self, reference: &str) -> AssetResult<Vec<u8>> {
        let path = self.guard.resolve_reference(reference)?;
        fs::read(&path).map_err(|e| AssetError::io(path, e))
    }

    /// Delete one referenced asset.
    ///
    /// Returns `false` when the file was already gone.
    pub fn delete(&self, reference: &str) -> AssetResult<bool> {
        let path = self.guard.resolve_reference(reference)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                Logger::info(Event::AssetDeleted.as_str(), &[("reference", reference)]);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Logger::trace(Event::AssetMissing.as_str(), &[("reference", reference)]);
                Ok(false)
            }
            Err(e) => Err(AssetError::io(path, e)),
        }
    }

    /// References whose file is not on disk.
    ///
    /// A reference the guard rejects counts as dangling and is never looked
    /// up on the filesystem.
    pub fn dangling<'r, I>(&self, references: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'r str>,
    {
        let mut dangling = Vec::new();
        for reference in references {
            let present = match self.exists(reference) {
                Ok(present) => present,
                Err(e) => {
                    Logger::warn(
                        Event::AssetRejected.as_str(),
                        &[("reference", reference), ("reason", e.to_string().as_str())],
                    );
                    false
                }
            };
            if !present {
                Logger::warn(Event::AssetDangling.as_str(), &[("reference", reference)]);
                dangling.push(reference.to_string());
            }
        }
        dangling
    }

    /// Remove everything under the root and recreate the category layout
    pub fn wipe_and_recreate(&self) -> AssetResult<()> {
        match fs::remove_dir_all(self.root()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(AssetError::io(self.root(), e)),
        }
        self.ensure_layout()
    }

    /// Store a new upload under `category` with a fresh collision-resistant
    /// name; returns its stored reference.
    pub fn store_upload(
        &self,
        category: AssetCategory,
        original_name: &str,
        bytes: &[u8],
    ) -> AssetResult<String> {
        let relative = format!(
            "{}/{}",
            self.layout.dir_for(category),
            upload_file_name(original_name)
        );
        self.write_entry(&relative, &mut &bytes[..])?;

        let reference = reference_for(&relative);
        Logger::info(
            Event::AssetStored.as_str(),
            &[
                ("reference", reference.as_str()),
                ("bytes", bytes.len().to_string().as_str()),
            ],
        );
        Ok(reference)
    }

    /// Write `content` to a root-relative path, creating parent directories.
    ///
    /// Returns the number of bytes written.
    pub fn write_entry(&self, relative: &str, content: &mut dyn Read) -> AssetResult<u64> {
        let path = self.guard.resolve_relative(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| AssetError::io(parent, e))?;
        }

        let mut file = File::create(&path).map_err(|e| AssetError::io(&path, e))?;
        let written = io::copy(content, &mut file).map_err(|e| AssetError::io(&path, e))?;
        file.flush().map_err(|e| AssetError::io(&path, e))?;
        Ok(written)
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<AssetFile>) -> AssetResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| AssetError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| AssetError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| AssetError::io(&path, e))?;

        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            let size = entry
                .metadata()
                .map_err(|e| AssetError::io(&path, e))?
                .len();
            let relative = relative_name(root, &path);
            out.push(AssetFile {
                relative,
                path,
                size,
            });
        }
    }

    Ok(())
}

fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn unsafe_ext_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[^a-z0-9.-]+").expect("extension pattern is valid"))
}

/// `<millis>_<token><ext>`, the extension reduced to a safe character set
fn upload_file_name(original_name: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let ext = unsafe_ext_chars().replace_all(&ext, "_");

    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();

    format!("{}_{}{}", Utc::now().timestamp_millis(), token, ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree(temp: &TempDir) -> AssetTree {
        let tree = AssetTree::new(temp.path().join("uploads"), CategoryLayout::default());
        tree.ensure_layout().unwrap();
        tree
    }

    #[test]
    fn test_ensure_layout_creates_category_dirs() {
        let temp = TempDir::new().unwrap();
        let tree = tree(&temp);

        for dir in ["vehicles", "receipts", "entry_photos"] {
            assert!(tree.root().join(dir).is_dir());
        }
        assert!(tree.enumerate().unwrap().is_empty());
    }

    #[test]
    fn test_enumerate_is_sorted_and_recursive() {
        let temp = TempDir::new().unwrap();
        let tree = tree(&temp);
        tree.write_entry("receipts/r.pdf", &mut &b"pdf"[..]).unwrap();
        tree.write_entry("entry_photos/2024/b.jpg", &mut &b"jpg"[..]).unwrap();
        tree.write_entry("entry_photos/a.jpg", &mut &b"jpg"[..]).unwrap();

        let names: Vec<String> = tree
            .enumerate()
            .unwrap()
            .into_iter()
            .map(|f| f.relative)
            .collect();
        assert_eq!(
            names,
            vec!["entry_photos/2024/b.jpg", "entry_photos/a.jpg", "receipts/r.pdf"]
        );
    }

    #[test]
    fn test_enumerate_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let tree = AssetTree::new(temp.path().join("absent"), CategoryLayout::default());
        assert!(tree.enumerate().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_enumerate_skips_symlinks() {
        let temp = TempDir::new().unwrap();
        let tree = tree(&temp);
        let outside = temp.path().join("secret.txt");
        fs::write(&outside, b"secret").unwrap();
        std::os::unix::fs::symlink(&outside, tree.root().join("vehicles/link.jpg")).unwrap();

        assert!(tree.enumerate().unwrap().is_empty());
    }

    #[test]
    fn test_store_upload_names_and_reference() {
        let temp = TempDir::new().unwrap();
        let tree = tree(&temp);

        let reference = tree
            .store_upload(AssetCategory::Receipt, "scan (1).P D F", b"data")
            .unwrap();
        assert!(reference.starts_with("uploads/receipts/"));
        assert!(reference.ends_with(".P_D_F"));
        assert_eq!(tree.read(&reference).unwrap(), b"data");

        let second = tree
            .store_upload(AssetCategory::Receipt, "scan (1).P D F", b"data")
            .unwrap();
        assert_ne!(reference, second);
    }

    #[test]
    fn test_upload_without_extension() {
        let name = upload_file_name("README");
        assert!(!name.contains('.'));
        let (millis, token) = name.split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(token.len(), 6);
    }

    #[test]
    fn test_delete_tolerates_missing_file() {
        let temp = TempDir::new().unwrap();
        let tree = tree(&temp);
        let reference = tree
            .store_upload(AssetCategory::VehicleImage, "car.jpg", b"img")
            .unwrap();

        assert!(tree.delete(&reference).unwrap());
        assert!(!tree.delete(&reference).unwrap());
        assert!(!tree.exists(&reference).unwrap());
    }

    #[test]
    fn test_delete_refuses_escape() {
        let temp = TempDir::new().unwrap();
        let tree = tree(&temp);
        let victim = temp.path().join("victim.txt");
        fs::write(&victim, b"keep").unwrap();

        let err = tree.delete("uploads/../victim.txt").unwrap_err();
        assert!(err.is_path_escape());
        assert!(victim.exists());
    }

    #[test]
    fn test_dangling_references() {
        let temp = TempDir::new().unwrap();
        let tree = tree(&temp);
        let present = tree
            .store_upload(AssetCategory::EntryPhoto, "a.jpg", b"x")
            .unwrap();

        let dangling = tree.dangling([
            present.as_str(),
            "uploads/entry_photos/gone.jpg",
            "uploads/../../etc/passwd",
        ]);

        assert_eq!(
            dangling,
            vec!["uploads/entry_photos/gone.jpg", "uploads/../../etc/passwd"]
        );
    }

    #[test]
    fn test_wipe_and_recreate() {
        let temp = TempDir::new().unwrap();
        let tree = tree(&temp);
        tree.write_entry("vehicles/old.jpg", &mut &b"x"[..]).unwrap();
        tree.write_entry("stray/file.bin", &mut &b"x"[..]).unwrap();

        tree.wipe_and_recreate().unwrap();

        assert!(tree.enumerate().unwrap().is_empty());
        assert!(tree.root().join("vehicles").is_dir());
        assert!(!tree.root().join("stray").exists());
    }
}
