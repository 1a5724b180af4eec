//! Unpack, inject metadata, repack, replace.
//!
//! The archive is unpacked into a scoped temporary directory, the metadata
//! file is written at its root, and the tree is zipped into a sibling temp
//! file that atomically replaces the original. The temporary directory is
//! removed on every exit path; on failure the original archive is untouched.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tokio::task;
use tracing::{debug, info, instrument, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::error::PackageError;
use super::metadata::{METADATA_FILE_NAME, PackageMetadata};

const LARGE_FILE_THRESHOLD: u64 = u32::MAX as u64;

/// Rewrites the archive at `archive_path` to carry `metadata`.
///
/// Runs on the blocking pool. Any existing metadata entry is replaced; every
/// other entry is carried over byte-for-byte.
///
/// # Errors
///
/// Returns [`PackageError`] when the archive cannot be read, unpacked,
/// written or moved into place.
#[instrument(skip(metadata), fields(path = %archive_path.display()))]
pub async fn repackage(archive_path: &Path, metadata: &PackageMetadata) -> Result<(), PackageError> {
    let payload = metadata.encode()?;
    let archive = archive_path.to_path_buf();
    task::spawn_blocking(move || rewrite_with_metadata(&archive, &payload))
        .await
        .map_err(|error| PackageError::Task {
            message: error.to_string(),
        })?
}

fn rewrite_with_metadata(archive: &Path, payload: &[u8]) -> Result<(), PackageError> {
    let workspace = tempfile::Builder::new()
        .prefix("ipafetch-repack-")
        .tempdir()
        .map_err(|error| PackageError::io(std::env::temp_dir(), error))?;
    let tree = workspace.path().join("payload");

    let unpacked = unpack(archive, &tree)?;
    debug!(entries = unpacked, "archive unpacked");

    let metadata_path = tree.join(METADATA_FILE_NAME);
    fs::write(&metadata_path, payload).map_err(|error| PackageError::io(&metadata_path, error))?;

    let parent = archive
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::Builder::new()
        .prefix(".processed-")
        .suffix(".ipa")
        .tempfile_in(parent)
        .map_err(|error| PackageError::io(parent, error))?;

    let packed = pack(&tree, staged.as_file_mut(), archive)?;
    staged
        .persist(archive)
        .map_err(|error| PackageError::io(archive, error.error))?;

    info!(entries = packed, "package rewritten with metadata");
    Ok(())
}

/// Extracts every entry of `archive` under `dest`. Returns the entry count.
fn unpack(archive: &Path, dest: &Path) -> Result<usize, PackageError> {
    let file = File::open(archive).map_err(|error| PackageError::io(archive, error))?;
    let mut zip = ZipArchive::new(file).map_err(|error| PackageError::archive(archive, error))?;
    fs::create_dir_all(dest).map_err(|error| PackageError::io(dest, error))?;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|error| PackageError::archive(archive, error))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(name = entry.name(), "skipping archive entry with unsafe path");
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|error| PackageError::io(&out_path, error))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|error| PackageError::io(parent, error))?;
        }
        let mut out_file =
            File::create(&out_path).map_err(|error| PackageError::io(&out_path, error))?;
        io::copy(&mut entry, &mut out_file).map_err(|error| PackageError::io(&out_path, error))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&out_path, fs::Permissions::from_mode(mode | 0o600));
        }
    }

    Ok(zip.len())
}

/// Zips the tree under `root` into `target`. Returns the entry count.
fn pack(root: &Path, target: &mut File, archive: &Path) -> Result<usize, PackageError> {
    let mut entries = Vec::new();
    collect_entries(root, &mut entries)?;

    let mut writer = ZipWriter::new(target);
    for path in &entries {
        let name = entry_name(root, path);
        let metadata = fs::metadata(path).map_err(|error| PackageError::io(path, error))?;
        let options = entry_options(&metadata);

        if metadata.is_dir() {
            writer
                .add_directory(format!("{name}/"), options)
                .map_err(|error| PackageError::archive(archive, error))?;
            continue;
        }

        writer
            .start_file(name, options.large_file(metadata.len() >= LARGE_FILE_THRESHOLD))
            .map_err(|error| PackageError::archive(archive, error))?;
        let mut source = File::open(path).map_err(|error| PackageError::io(path, error))?;
        io::copy(&mut source, &mut writer).map_err(|error| PackageError::io(path, error))?;
    }

    writer
        .finish()
        .map_err(|error| PackageError::archive(archive, error))?;
    Ok(entries.len())
}

fn entry_options(metadata: &fs::Metadata) -> SimpleFileOptions {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options.unix_permissions(metadata.permissions().mode() & 0o7777)
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        options
    }
}

/// Archive entry name: path relative to `root` with `/` separators.
fn entry_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Depth-first walk in name order. Directories precede their contents;
/// entries that are neither files nor directories are skipped.
fn collect_entries(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), PackageError> {
    let mut children = fs::read_dir(dir)
        .map_err(|error| PackageError::io(dir, error))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| PackageError::io(dir, error))?;
    children.sort_by_key(fs::DirEntry::file_name);

    for child in children {
        let path = child.path();
        let file_type = child
            .file_type()
            .map_err(|error| PackageError::io(&path, error))?;
        if file_type.is_dir() {
            out.push(path.clone());
            collect_entries(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        } else {
            debug!(path = %path.display(), "skipping non-regular entry");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::TempDir;

    fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        writer.add_directory("Payload/", options).unwrap();
        for (name, bytes) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut out = Vec::new();
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).unwrap();
            if entry.is_dir() {
                continue;
            }
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).unwrap();
            out.push((entry.name().to_string(), bytes));
        }
        out
    }

    #[test]
    fn test_entry_name_uses_forward_slashes() {
        let root = Path::new("/tmp/root");
        assert_eq!(
            entry_name(root, &root.join("Payload").join("App.app").join("Info.plist")),
            "Payload/App.app/Info.plist"
        );
    }

    #[test]
    fn test_rewrite_replaces_existing_metadata_entry() {
        let tempdir = TempDir::new().unwrap();
        let archive = tempdir.path().join("app.ipa");
        write_archive(
            &archive,
            &[
                ("Payload/App.app/App", b"binary"),
                (METADATA_FILE_NAME, b"stale"),
            ],
        );

        rewrite_with_metadata(&archive, b"fresh").unwrap();

        let entries = read_entries(&archive);
        let metadata: Vec<_> = entries
            .iter()
            .filter(|(name, _)| name == METADATA_FILE_NAME)
            .collect();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata[0].1, b"fresh");
        assert!(
            entries
                .iter()
                .any(|(name, bytes)| name == "Payload/App.app/App" && bytes == b"binary")
        );
    }

    #[test]
    fn test_rewrite_of_corrupt_archive_leaves_original_untouched() {
        let tempdir = TempDir::new().unwrap();
        let archive = tempdir.path().join("broken.ipa");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let result = rewrite_with_metadata(&archive, b"meta");
        assert!(matches!(result, Err(PackageError::Archive { .. })));
        assert_eq!(fs::read(&archive).unwrap(), b"definitely not a zip");

        let leftovers: Vec<_> = fs::read_dir(tempdir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1, "unexpected files: {leftovers:?}");
    }
}
