//! Partition assembly: concatenation of per-file enriched tables and the
//! workspace that tracks what to delete once a partition exports.
//!
//! Cleanup policy: nothing belonging to a partition is removed until its
//! export has succeeded. On failure the workspace is simply dropped, leaving
//! the compressed sources, decompressed files, and lookup directory in place
//! so the partition can be re-run.

use super::table::Table;
use super::types::FeedError;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Concatenate the enriched tables of one partition, preserving
/// file-then-row order.
pub fn concat(tables: Vec<Table>) -> Result<Table, FeedError> {
    let mut iter = tables.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| FeedError::Enrichment("no enriched tables to assemble".to_string()))?;

    let (columns, mut rows) = first.into_parts();
    for table in iter {
        let (cols, more) = table.into_parts();
        if cols != columns {
            return Err(FeedError::Enrichment(format!(
                "data files disagree on columns ({} vs {})",
                columns.len(),
                cols.len()
            )));
        }
        rows.extend(more);
    }

    Ok(Table::from_parts(columns, rows))
}

/// Files and directories created while processing one partition.
///
/// Paths are recorded as they come into existence. [`cleanup`] consumes the
/// workspace on the success path only; removal failures are logged, never
/// propagated, since the data has already been exported.
///
/// [`cleanup`]: PartitionWorkspace::cleanup
#[derive(Debug, Default)]
pub struct PartitionWorkspace {
    compressed: Vec<PathBuf>,
    decompressed: Vec<PathBuf>,
    lookup_dir: Option<PathBuf>,
}

impl PartitionWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_compressed(&mut self, path: PathBuf) {
        self.compressed.push(path);
    }

    pub fn record_decompressed(&mut self, path: PathBuf) {
        self.decompressed.push(path);
    }

    pub fn record_lookup_dir(&mut self, path: PathBuf) {
        self.lookup_dir = Some(path);
    }

    /// Remove everything the partition left on disk.
    pub fn cleanup(self) {
        let mut removed = 0usize;
        for path in self.compressed.iter().chain(self.decompressed.iter()) {
            match fs::remove_file(path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove '{}': {}", path.display(), e),
            }
        }
        if let Some(dir) = &self.lookup_dir {
            match fs::remove_dir_all(dir) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove lookup dir '{}': {}", dir.display(), e),
            }
        }
        debug!("Cleaned up {} workspace entries", removed);
    }
}
