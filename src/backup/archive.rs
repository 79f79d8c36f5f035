//! Zip archive creation for backup
//!
//! Layout:
//!
//! ```text
//! backup.zip
//! ├── db.json                  snapshot document
//! └── uploads/
//!     ├── vehicles/...
//!     ├── receipts/...
//!     └── entry_photos/...
//! ```
//!
//! `db.json` is always the first entry; asset entries follow in sorted
//! order so two backups of the same state list identical entries.

use std::fs::{self, File};
#[cfg(unix)]
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Seek, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::assets::{AssetFile, REFERENCE_NAMESPACE};

use super::errors::{BackupError, BackupResult};

/// Name of the snapshot entry inside an archive
pub const SNAPSHOT_ENTRY: &str = "db.json";

/// Counters gathered while writing an archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub assets: usize,
    pub asset_bytes: u64,
}

/// Streams a snapshot document and an asset listing into a zip sink
pub struct ArchiveBuilder<W: Write + Seek> {
    zip: ZipWriter<W>,
    stats: ArchiveStats,
}

impl<W: Write + Seek> ArchiveBuilder<W> {
    pub fn new(sink: W) -> Self {
        Self {
            zip: ZipWriter::new(sink),
            stats: ArchiveStats::default(),
        }
    }

    fn options() -> FileOptions {
        FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644)
    }

    /// Write the snapshot document as `db.json`
    pub fn add_snapshot(&mut self, document: &[u8]) -> BackupResult<()> {
        self.zip
            .start_file(SNAPSHOT_ENTRY, Self::options())
            .map_err(|e| BackupError::archive_failed("could not start db.json entry", e))?;
        self.zip
            .write_all(document)
            .map_err(|e| BackupError::io_error("could not write db.json entry", e))
    }

    /// Copy one asset file into `uploads/<relative>`
    pub fn add_asset(&mut self, asset: &AssetFile) -> BackupResult<()> {
        let entry_name = format!("{}/{}", REFERENCE_NAMESPACE, asset.relative);
        let options = Self::options().large_file(asset.size >= u64::from(u32::MAX));

        let mut file =
            File::open(&asset.path).map_err(|e| BackupError::io_error_at_path(&asset.path, e))?;

        self.zip.start_file(entry_name.as_str(), options).map_err(|e| {
            BackupError::archive_failed(format!("could not start entry {}", entry_name), e)
        })?;
        let copied = io::copy(&mut file, &mut self.zip).map_err(|e| {
            BackupError::io_error(format!("could not write entry {}", entry_name), e)
        })?;

        self.stats.assets += 1;
        self.stats.asset_bytes += copied;
        Ok(())
    }

    /// Write the central directory and hand back the sink
    pub fn finish(mut self) -> BackupResult<(W, ArchiveStats)> {
        let sink = self
            .zip
            .finish()
            .map_err(|e| BackupError::archive_failed("could not finish archive", e))?;
        Ok((sink, self.stats))
    }
}

/// Build a complete archive into `sink`
pub fn write_archive<W: Write + Seek>(
    document: &[u8],
    assets: &[AssetFile],
    sink: W,
) -> BackupResult<(W, ArchiveStats)> {
    let mut builder = ArchiveBuilder::new(sink);
    builder.add_snapshot(document)?;
    for asset in assets {
        builder.add_asset(asset)?;
    }
    builder.finish()
}

/// Build a complete archive at `output_path` and fsync it.
///
/// Returns the stats and the archive size in bytes.
pub fn create_zip_archive(
    document: &[u8],
    assets: &[AssetFile],
    output_path: &Path,
) -> BackupResult<(ArchiveStats, u64)> {
    let file = File::create(output_path).map_err(|e| {
        BackupError::io_error(
            format!("Failed to create archive file: {}", output_path.display()),
            e,
        )
    })?;

    let (writer, stats) = write_archive(document, assets, BufWriter::new(file))?;
    let file = writer.into_inner().map_err(|e| {
        BackupError::io_error("Failed to flush archive buffer", e.into_error())
    })?;

    file.sync_all().map_err(|e| {
        BackupError::io_error(
            format!("Failed to fsync archive: {}", output_path.display()),
            e,
        )
    })?;
    let size = file
        .metadata()
        .map_err(|e| BackupError::io_error_at_path(output_path, e))?
        .len();

    fsync_parent(output_path)?;
    Ok((stats, size))
}

#[cfg(unix)]
fn fsync_parent(path: &Path) -> BackupResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return Ok(()),
    };

    let dir = OpenOptions::new()
        .read(true)
        .open(parent)
        .map_err(|e| BackupError::io_error_at_path(parent, e))?;
    dir.sync_all().map_err(|e| {
        BackupError::io_error(
            format!("Failed to fsync archive directory: {}", parent.display()),
            e,
        )
    })
}

#[cfg(not(unix))]
fn fsync_parent(_path: &Path) -> BackupResult<()> {
    Ok(())
}

/// Delete a partial archive if it exists
pub fn cleanup_partial_archive(archive_path: &Path) {
    if archive_path.exists() {
        let _ = fs::remove_file(archive_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn asset(temp: &TempDir, relative: &str, content: &[u8]) -> AssetFile {
        let path = temp.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        AssetFile {
            relative: relative.to_string(),
            path,
            size: content.len() as u64,
        }
    }

    #[test]
    fn test_snapshot_is_first_entry() {
        let temp = TempDir::new().unwrap();
        let assets = vec![asset(&temp, "vehicles/a.jpg", b"jpeg")];

        let (cursor, stats) =
            write_archive(b"{}", &assets, Cursor::new(Vec::new())).unwrap();
        assert_eq!(stats.assets, 1);
        assert_eq!(stats.asset_bytes, 4);

        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0).unwrap().name(), "db.json");
        assert_eq!(archive.by_index(1).unwrap().name(), "uploads/vehicles/a.jpg");

        let mut content = String::new();
        archive
            .by_name("uploads/vehicles/a.jpg")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "jpeg");
    }

    #[test]
    fn test_create_zip_archive_on_disk() {
        let temp = TempDir::new().unwrap();
        let assets = vec![
            asset(&temp, "receipts/r.pdf", b"pdf"),
            asset(&temp, "entry_photos/x.jpg", b"photo"),
        ];
        let output = temp.path().join("backup.zip");

        let (stats, size) = create_zip_archive(br#"{"a":1}"#, &assets, &output).unwrap();

        assert_eq!(stats.assets, 2);
        assert_eq!(size, fs::metadata(&output).unwrap().len());
        let archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
    }

    #[test]
    fn test_missing_asset_fails() {
        let temp = TempDir::new().unwrap();
        let ghost = AssetFile {
            relative: "vehicles/ghost.jpg".into(),
            path: temp.path().join("ghost.jpg"),
            size: 0,
        };

        let result = write_archive(b"{}", &[ghost], Cursor::new(Vec::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_cleanup_partial_archive() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("partial.zip");
        fs::write(&path, b"partial").unwrap();

        cleanup_partial_archive(&path);
        assert!(!path.exists());

        // Missing file is fine
        cleanup_partial_archive(&path);
    }
}
