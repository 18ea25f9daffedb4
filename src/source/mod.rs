//! Feed retrieval.
//!
//! A [`FeedSource`] hands the pipeline the names of the files it fetched
//! into the work directory, mirroring the endpoint contract: every
//! non-manifest file is fetched and removed from the endpoint, manifest
//! (`*.txt`) files are listed but left behind.

use crate::feed::FeedError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Retrieval collaborator. Implementations fetch everything currently
/// available and report the fetched names; name parsing and grouping are the
/// pipeline's concern.
pub trait FeedSource {
    fn fetch(&mut self) -> Result<Vec<String>, FeedError>;
}

/// Source that drains a local drop directory.
///
/// Fetching moves each non-manifest file into the work directory, so a
/// second fetch sees only files dropped since. Manifests stay in the drop
/// directory untouched.
#[derive(Debug)]
pub struct DropDirSource {
    drop_dir: PathBuf,
    work_dir: PathBuf,
}

impl DropDirSource {
    pub fn new(drop_dir: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            drop_dir: drop_dir.into(),
            work_dir: work_dir.into(),
        }
    }
}

impl FeedSource for DropDirSource {
    fn fetch(&mut self) -> Result<Vec<String>, FeedError> {
        fs::create_dir_all(&self.work_dir)?;

        let mut entries: Vec<_> = fs::read_dir(&self.drop_dir)?.collect::<Result<_, _>>()?;
        // Deterministic listing order
        entries.sort_by_key(|e| e.file_name());

        let mut fetched = Vec::new();
        for entry in entries {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!("Skipping non-UTF-8 file name {:?}", raw);
                    continue;
                }
            };
            if name.ends_with(".txt") {
                info!("Leaving manifest file in drop directory: {}", name);
                continue;
            }

            move_file(&path, &self.work_dir.join(&name))?;
            fetched.push(name);
        }

        info!("{} files fetched from '{}'", fetched.len(), self.drop_dir.display());
        Ok(fetched)
    }
}

fn move_file(src: &Path, dest: &Path) -> Result<(), FeedError> {
    // rename fails across filesystems; fall back to copy + remove
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    fs::copy(src, dest)?;
    fs::remove_file(src)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn drop_file(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"payload").unwrap();
    }

    #[test]
    fn test_fetch_moves_files_and_leaves_manifests() {
        let root = TempDir::new().unwrap();
        let drop_dir = root.path().join("drop");
        let work_dir = root.path().join("work");
        fs::create_dir_all(&drop_dir).unwrap();
        drop_file(&drop_dir, "01-suite_2024-05-01.tsv.gz");
        drop_file(&drop_dir, "suite_2024-05-01-lookup_data.tar.gz");
        drop_file(&drop_dir, "suite_2024-05-01.txt");

        let mut source = DropDirSource::new(&drop_dir, &work_dir);
        let fetched = source.fetch().unwrap();

        assert_eq!(
            fetched,
            vec![
                "01-suite_2024-05-01.tsv.gz".to_string(),
                "suite_2024-05-01-lookup_data.tar.gz".to_string(),
            ]
        );
        // Fetched files moved into the work directory
        assert!(work_dir.join("01-suite_2024-05-01.tsv.gz").exists());
        assert!(!drop_dir.join("01-suite_2024-05-01.tsv.gz").exists());
        // Manifest untouched, never fetched
        assert!(drop_dir.join("suite_2024-05-01.txt").exists());
        assert!(!work_dir.join("suite_2024-05-01.txt").exists());
    }

    #[test]
    fn test_second_fetch_is_empty() {
        let root = TempDir::new().unwrap();
        let drop_dir = root.path().join("drop");
        let work_dir = root.path().join("work");
        fs::create_dir_all(&drop_dir).unwrap();
        drop_file(&drop_dir, "01-suite_2024-05-01.tsv.gz");

        let mut source = DropDirSource::new(&drop_dir, &work_dir);
        assert_eq!(source.fetch().unwrap().len(), 1);
        assert!(source.fetch().unwrap().is_empty());
    }

    #[test]
    fn test_fetch_ignores_subdirectories() {
        let root = TempDir::new().unwrap();
        let drop_dir = root.path().join("drop");
        fs::create_dir_all(drop_dir.join("nested")).unwrap();
        drop_file(&drop_dir, "01-suite_2024-05-01.tsv.gz");

        let mut source = DropDirSource::new(&drop_dir, root.path().join("work"));
        assert_eq!(source.fetch().unwrap().len(), 1);
    }

    #[test]
    fn test_fetch_missing_drop_dir_is_io_error() {
        let root = TempDir::new().unwrap();
        let mut source =
            DropDirSource::new(root.path().join("absent"), root.path().join("work"));
        let err = source.fetch().unwrap_err();
        assert!(matches!(err, FeedError::Io(_)));
    }
}
