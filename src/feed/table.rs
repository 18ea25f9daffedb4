//! Row-oriented in-memory table.
//!
//! All cells are strings; the feed is TSV and every derived value is string
//! concatenation or a string-to-string mapping, so nothing is gained by
//! typing columns. Mutating operations keep the header and every row at the
//! same width.

use super::types::FeedError;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. The row must have exactly one field per column.
    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), FeedError> {
        if row.len() != self.columns.len() {
            return Err(FeedError::Enrichment(format!(
                "row has {} fields, expected {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column the pipeline cannot proceed without.
    pub fn require_column(&self, name: &str) -> Result<usize, FeedError> {
        self.column_index(name)
            .ok_or_else(|| FeedError::Enrichment(format!("required column '{}' is missing", name)))
    }

    pub fn value(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(|s| s.as_str())
    }

    /// Remove every column whose name starts with `prefix`, from the header
    /// and from every row. Returns the number of columns removed.
    pub fn drop_columns_with_prefix(&mut self, prefix: &str) -> usize {
        let keep: Vec<bool> = self.columns.iter().map(|c| !c.starts_with(prefix)).collect();
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped == 0 {
            return 0;
        }

        let mut it = keep.iter();
        self.columns.retain(|_| *it.next().unwrap());
        for row in &mut self.rows {
            let mut it = keep.iter();
            row.retain(|_| *it.next().unwrap());
        }
        dropped
    }

    /// Rewrite every column name through `f`.
    pub fn rename_columns<F>(&mut self, mut f: F)
    where
        F: FnMut(&str) -> String,
    {
        for name in &mut self.columns {
            *name = f(name);
        }
    }

    /// Replace every value in one column with `f(value)`.
    pub fn map_column<F>(&mut self, index: usize, mut f: F)
    where
        F: FnMut(&str) -> String,
    {
        for row in &mut self.rows {
            row[index] = f(&row[index]);
        }
    }

    /// Append a new column whose value is computed from each full row.
    pub fn add_column<F>(&mut self, name: impl Into<String>, mut f: F)
    where
        F: FnMut(&[String]) -> String,
    {
        self.columns.push(name.into());
        for row in &mut self.rows {
            let value = f(&row[..]);
            row.push(value);
        }
    }

    /// Number of distinct values in one column.
    pub fn distinct_count(&self, index: usize) -> usize {
        let mut seen: HashSet<&str> = HashSet::new();
        for row in &self.rows {
            seen.insert(row[index].as_str());
        }
        seen.len()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<String>>) {
        (self.columns, self.rows)
    }

    /// Reassemble a table from parts produced by [`Table::into_parts`].
    /// Callers guarantee every row already matches the header width.
    pub fn from_parts(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }
}
