//! Staged CSV writes.
//!
//! Tables are written to a hidden sibling file and renamed over the
//! destination only once fully flushed, so a failed write never leaves a
//! truncated table behind and never clobbers the previous one.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::WriteError;

/// Write a CSV file at `path` via a staging file.
pub(crate) fn write_csv_atomic<F>(path: &Path, fill: F) -> Result<(), WriteError>
where
    F: FnOnce(&mut csv::Writer<File>) -> csv::Result<()>,
{
    let staging = staging_path(path)?;
    let file = File::create(&staging).map_err(|source| WriteError::Create {
        path: staging.clone(),
        source,
    })?;

    let result = finish(path, &staging, file, fill);
    if result.is_err() {
        let _ = std::fs::remove_file(&staging);
    }
    result
}

fn finish<F>(path: &Path, staging: &Path, file: File, fill: F) -> Result<(), WriteError>
where
    F: FnOnce(&mut csv::Writer<File>) -> csv::Result<()>,
{
    let mut writer = csv::Writer::from_writer(file);
    fill(&mut writer).map_err(|source| WriteError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    drop(writer);

    std::fs::rename(staging, path).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn staging_path(path: &Path) -> Result<PathBuf, WriteError> {
    let file_name = path.file_name().ok_or_else(|| WriteError::Create {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
    })?;

    Ok(path.with_file_name(format!(".{}.partial", file_name.to_string_lossy())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        let staged = staging_path(Path::new("/tmp/out/table.csv")).unwrap();
        assert_eq!(staged, PathBuf::from("/tmp/out/.table.csv.partial"));
    }

    #[test]
    fn test_write_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "old\n").unwrap();

        write_csv_atomic(&path, |w| w.write_record(["a", "b"])).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n");
        assert!(!dir.path().join(".t.csv.partial").exists());
    }

    #[test]
    fn test_missing_directory_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("t.csv");

        let err = write_csv_atomic(&path, |w| w.write_record(["a"])).unwrap_err();

        assert!(matches!(err, WriteError::Create { .. }));
        assert!(!path.exists());
    }
}
