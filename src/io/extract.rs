//! Archive validation and extraction
//!
//! The payload archive is a zip. Corruption is a distinct error kind
//! from transport failures: the bytes are already fully downloaded, so
//! retrying another source would not help.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt archive: {0}")]
    Corrupt(String),
}

impl From<ZipError> for ExtractError {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::Io(io_err) => ExtractError::Io(io_err),
            other => ExtractError::Corrupt(other.to_string()),
        }
    }
}

/// Validate and unpack `archive_path` into `dest_dir`.
///
/// Opening the archive reads the full central directory, so a truncated
/// or non-zip file is rejected before any entry touches the disk.
/// Returns the extraction root.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<PathBuf, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    fs::create_dir_all(dest_dir)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        // Entries with escaping paths are skipped, not fatal.
        let relative_path = match entry.enclosed_name() {
            Some(path) => path.to_owned(),
            None => continue,
        };

        let absolute_path = dest_dir.join(&relative_path);
        if entry.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }

        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut entry, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
        }
    }

    Ok(dest_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_valid_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("payload.zip");
        write_zip(&archive, &[("aura/theme.css", b"body {}"), ("aura/run.js", b"1;")]);

        let dest = dir.path().join("out");
        let root = extract_archive(&archive, &dest).unwrap();

        assert_eq!(root, dest);
        assert_eq!(fs::read(dest.join("aura/theme.css")).unwrap(), b"body {}");
        assert_eq!(fs::read(dest.join("aura/run.js")).unwrap(), b"1;");
    }

    #[test]
    fn test_corrupt_archive_is_distinct_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();

        let err = extract_archive(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, ExtractError::Corrupt(_)), "got: {err:?}");
    }

    #[test]
    fn test_missing_archive_is_io_error() {
        let dir = tempdir().unwrap();
        let err = extract_archive(&dir.path().join("absent.zip"), &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }
}
