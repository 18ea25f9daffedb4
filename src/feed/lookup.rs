//! Dimension lookup catalog.
//!
//! A lookup bundle unpacks to a flat directory of tab-separated tables, one
//! per categorical dimension, each mapping a short code to a human-readable
//! label. `column_headers.tsv` is the odd one out: its header row carries the
//! schema applied positionally to the headerless data files.
//!
//! Tables are parsed once per partition and cached; enrichment translates
//! three referrer columns and two search-engine columns from single loads.

use super::types::FeedError;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File whose header row names the data-file columns.
pub const COLUMN_HEADERS_FILE: &str = "column_headers.tsv";

/// The one three-column table: short code, an unused middle column, label.
pub const REFERRER_TYPE_FILE: &str = "referrer_type.tsv";

/// One short-code to label mapping.
#[derive(Debug, Clone)]
pub struct DimensionTable {
    name: String,
    map: HashMap<String, String>,
}

impl DimensionTable {
    /// Translate one value. A code with no entry passes through unchanged;
    /// a miss is defined behavior, never an error.
    pub fn translate<'a>(&'a self, value: &'a str) -> &'a str {
        self.map.get(value).map(|s| s.as_str()).unwrap_or(value)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Lazily-loading view over one partition's lookup directory.
#[derive(Debug)]
pub struct LookupCatalog {
    dir: PathBuf,
    tables: HashMap<String, DimensionTable>,
    headers: Option<Vec<String>>,
}

impl LookupCatalog {
    /// Point a catalog at an unpacked lookup directory. No files are read
    /// until a table or the column headers are first requested.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tables: HashMap::new(),
            headers: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Column names for the partition's data files, from the header row of
    /// `column_headers.tsv`.
    pub fn column_headers(&mut self) -> Result<&[String], FeedError> {
        if self.headers.is_none() {
            let headers = read_column_headers(&self.dir)?;
            debug!("Loaded {} column headers", headers.len());
            self.headers = Some(headers);
        }
        Ok(self.headers.as_deref().unwrap_or_default())
    }

    /// The dimension table stored in `file`, loading it on first request.
    pub fn table(&mut self, file: &str) -> Result<&DimensionTable, FeedError> {
        match self.tables.entry(file.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(v) => {
                let table = load_dimension_table(&self.dir, file)?;
                debug!("Loaded lookup table '{}' with {} entries", file, table.len());
                Ok(v.insert(table))
            }
        }
    }
}

fn tsv_reader(dir: &Path, file: &str) -> Result<csv::Reader<File>, FeedError> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(dir.join(file))
        .map_err(|e| FeedError::LookupMissing(format!("'{}': {}", file, e)))
}

fn read_column_headers(dir: &Path) -> Result<Vec<String>, FeedError> {
    let mut reader = tsv_reader(dir, COLUMN_HEADERS_FILE)?;
    let mut records = reader.records();
    let first = records
        .next()
        .transpose()
        .map_err(|e| FeedError::LookupMissing(format!("'{}': {}", COLUMN_HEADERS_FILE, e)))?;
    let headers: Vec<String> = match first {
        Some(record) => record.iter().map(|f| f.to_string()).collect(),
        None => Vec::new(),
    };
    if headers.is_empty() {
        return Err(FeedError::LookupMissing(format!(
            "'{}' has no header row",
            COLUMN_HEADERS_FILE
        )));
    }
    Ok(headers)
}

fn load_dimension_table(dir: &Path, file: &str) -> Result<DimensionTable, FeedError> {
    // referrer_type.tsv carries three columns; the label is the third
    let label_index = if file == REFERRER_TYPE_FILE { 2 } else { 1 };

    let mut reader = tsv_reader(dir, file)?;
    let mut map = HashMap::new();
    for result in reader.records() {
        let record =
            result.map_err(|e| FeedError::LookupMissing(format!("'{}': {}", file, e)))?;
        // Rows too short to carry both code and label are dropped
        match (record.get(0), record.get(label_index)) {
            (Some(code), Some(label)) => {
                map.insert(code.to_string(), label.to_string());
            }
            _ => continue,
        }
    }

    Ok(DimensionTable {
        name: file.to_string(),
        map,
    })
}
