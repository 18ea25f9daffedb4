//! Core types for the feed pipeline: parsed file names, the partition index,
//! per-run reporting, and the pipeline error taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Role of a retrieved file, derived purely from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileRole {
    /// Multi-file dimension-table bundle (`*-lookup_data.tar.gz`)
    Lookup,
    /// Single-stream row data file (`*.tsv.gz`)
    Data,
}

/// A retrieved file with the fields parsed out of its name.
///
/// Immutable once parsed; the name is kept verbatim so the file can be
/// located in the work directory later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    /// File name as listed by the retrieval collaborator
    pub name: String,
    /// Reporting entity token from the name
    pub reporting_entity: String,
    /// Date token from the name, kept in source format
    pub date: String,
    /// Lookup bundle or data file
    pub role: FileRole,
}

impl RawFile {
    /// Key of the partition this file belongs to.
    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::new(self.reporting_entity.clone(), self.date.clone())
    }
}

/// Grouping key for one partition: all data for one reporting entity on one
/// date.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    pub reporting_entity: String,
    pub date: String,
}

impl PartitionKey {
    pub fn new(reporting_entity: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            reporting_entity: reporting_entity.into(),
            date: date.into(),
        }
    }

    /// Date with separators removed, e.g. `2024-05-01` -> `20240501`.
    pub fn compact_date(&self) -> String {
        self.date.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
    }

    /// Export destination name: `<reportingEntity>_<dateWithoutSeparators>`.
    pub fn destination_name(&self) -> String {
        format!("{}_{}", self.reporting_entity, self.compact_date())
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.reporting_entity, self.date)
    }
}

/// Everything grouped under one partition key.
#[derive(Debug, Clone, Default)]
pub struct PartitionEntry {
    /// The lookup bundle for this partition, if one was retrieved.
    /// A partition is only processable once this is present.
    pub lookup_archive: Option<RawFile>,
    /// Data files in retrieval order. Not sorted; downstream code must not
    /// assume stronger ordering than retrieval order.
    pub data_files: Vec<RawFile>,
}

/// Mapping of `PartitionKey` -> `PartitionEntry`, built once per run.
///
/// Backed by an ordered map so partition iteration is deterministic.
#[derive(Debug, Default)]
pub struct PartitionIndex {
    entries: BTreeMap<PartitionKey, PartitionEntry>,
}

impl PartitionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the entry for a key. First sight of a key
    /// default-constructs its entry; absence is never detected by catching a
    /// lookup failure.
    pub fn entry(&mut self, key: PartitionKey) -> &mut PartitionEntry {
        self.entries.entry(key).or_default()
    }

    pub fn get(&self, key: &PartitionKey) -> Option<&PartitionEntry> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PartitionKey, &PartitionEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Errors that can occur while processing a feed drop.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unrecognized file name: {0}")]
    NameParse(String),

    #[error("archive extraction failed: {0}")]
    Archive(String),

    #[error("lookup table missing: {0}")]
    LookupMissing(String),

    #[error("enrichment failed: {0}")]
    Enrichment(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeedError {
    /// Short kind tag for the per-partition status report.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::NameParse(_) => "name-parse",
            FeedError::Archive(_) => "archive",
            FeedError::LookupMissing(_) => "lookup-missing",
            FeedError::Enrichment(_) => "enrichment",
            FeedError::Export(_) => "export",
            FeedError::Io(_) => "io",
        }
    }
}

/// Per-data-file validation counters, logged after enrichment and folded
/// into the partition outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStats {
    /// Rows in the enriched set
    pub rows: usize,
    /// Columns after enrichment
    pub columns: usize,
    /// `evar*` columns removed (0 unless keep_post_only)
    pub evar_dropped: usize,
    /// `prop*` columns removed (0 unless keep_post_only)
    pub prop_dropped: usize,
    /// Distinct `User_ID` values ("Unique Visitors")
    pub unique_users: usize,
    /// Distinct `Session_ID` values ("Visits")
    pub unique_sessions: usize,
}

/// Outcome of one partition's processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PartitionOutcome {
    Completed {
        reporting_entity: String,
        date: String,
        destination: String,
        data_files: usize,
        rows: usize,
        unique_users: usize,
        unique_sessions: usize,
        evar_dropped: usize,
        prop_dropped: usize,
    },
    Failed {
        reporting_entity: String,
        date: String,
        kind: String,
        message: String,
    },
}

impl PartitionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PartitionOutcome::Completed { .. })
    }

    pub fn failed(key: &PartitionKey, err: &FeedError) -> Self {
        PartitionOutcome::Failed {
            reporting_entity: key.reporting_entity.clone(),
            date: key.date.clone(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// A filename the grouper could not place, kept for the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

/// Structured result of one full run: per-partition status plus the names
/// that never made it into a partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    /// Files the retrieval collaborator handed over
    pub fetched: usize,
    pub skipped: Vec<SkippedFile>,
    pub partitions: Vec<PartitionOutcome>,
}

impl RunReport {
    pub fn completed_count(&self) -> usize {
        self.partitions.iter().filter(|p| p.is_completed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.partitions.len() - self.completed_count()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        (self.finished - self.started).num_milliseconds() as f64 / 1000.0
    }

    /// Print the end-of-run summary block.
    pub fn print_summary(&self) {
        println!("\nRun Complete!");
        println!("=============");
        println!("Files fetched:        {}", self.fetched);
        println!("Names skipped:        {}", self.skipped.len());
        println!("Partitions completed: {}", self.completed_count());
        println!("Partitions failed:    {}", self.failed_count());
        println!("Elapsed time:         {:.1}s", self.elapsed_seconds());

        if !self.partitions.is_empty() {
            println!("\nPartitions:");
            for outcome in &self.partitions {
                match outcome {
                    PartitionOutcome::Completed {
                        destination,
                        data_files,
                        rows,
                        unique_users,
                        unique_sessions,
                        ..
                    } => {
                        println!(
                            "  {}: {} rows from {} file(s), {} visitors, {} visits",
                            destination, rows, data_files, unique_users, unique_sessions
                        );
                    }
                    PartitionOutcome::Failed {
                        reporting_entity,
                        date,
                        kind,
                        message,
                    } => {
                        println!(
                            "  {}/{}: FAILED [{}] {}",
                            reporting_entity, date, kind, message
                        );
                    }
                }
            }
        }

        if !self.skipped.is_empty() {
            println!("\nSkipped names:");
            for skip in &self.skipped {
                println!("  {}: {}", skip.name, skip.reason);
            }
        }
    }
}
