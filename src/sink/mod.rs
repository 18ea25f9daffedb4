//! Warehouse export.
//!
//! A [`WarehouseSink`] receives one partition table as a destination name
//! plus a sequence of row chunks, append-mode: re-exporting to an existing
//! destination adds rows, never truncates. The pipeline drives the chunking
//! and retry policy; a sink only has to make each individual append stick or
//! fail loudly.

use crate::feed::FeedError;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Export collaborator for assembled partition tables.
pub trait WarehouseSink {
    /// Append one chunk of rows to `destination`. The first append to a new
    /// destination creates it with the column header; later appends must not
    /// repeat the header.
    fn append(
        &mut self,
        destination: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<(), FeedError>;
}

/// Sink that writes each destination to a CSV file under
/// `<out_dir>/<dataset>/<destination>.csv`.
#[derive(Debug)]
pub struct CsvSink {
    out_dir: PathBuf,
    dataset: String,
}

impl CsvSink {
    pub fn new(out_dir: impl Into<PathBuf>, dataset: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            dataset: dataset.into(),
        }
    }

    /// File a destination resolves to.
    pub fn destination_path(&self, destination: &str) -> PathBuf {
        self.out_dir
            .join(&self.dataset)
            .join(format!("{}.csv", destination))
    }
}

impl WarehouseSink for CsvSink {
    fn append(
        &mut self,
        destination: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<(), FeedError> {
        let path = self.destination_path(destination);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                FeedError::Export(format!("failed to create '{}': {}", parent.display(), e))
            })?;
        }

        let is_new = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                FeedError::Export(format!("failed to open '{}': {}", path.display(), e))
            })?;

        let mut writer = csv::Writer::from_writer(file);
        if is_new {
            writer.write_record(columns).map_err(|e| export_err(&path, e))?;
        }
        for row in rows {
            writer.write_record(row).map_err(|e| export_err(&path, e))?;
        }
        writer.flush().map_err(|e| {
            FeedError::Export(format!("failed to flush '{}': {}", path.display(), e))
        })?;

        debug!("Appended {} rows to '{}'", rows.len(), path.display());
        Ok(())
    }
}

fn export_err(path: &Path, e: csv::Error) -> FeedError {
    FeedError::Export(format!("failed to write '{}': {}", path.display(), e))
}
