//! Filename grouping: classify retrieved file names and build the partition
//! index.
//!
//! The retrieval collaborator hands over a flat, unordered list of names
//! (manifests already excluded). Each name is parsed against the two known
//! grammars and slotted into the `(reporting_entity, date)` partition it
//! belongs to. A name matching neither grammar is skipped with a warning
//! rather than aborting the run; a stray unrelated file must not halt an
//! otherwise healthy drop.

use super::types::{FeedError, FileRole, PartitionIndex, RawFile, SkippedFile};
use tracing::warn;

/// Suffix identifying a lookup-table bundle.
pub const LOOKUP_SUFFIX: &str = "-lookup_data.tar.gz";

/// Suffix identifying a compressed row-data file.
pub const DATA_SUFFIX: &str = ".tsv.gz";

/// Parse one retrieved file name into a [`RawFile`].
///
/// Grammar (fields separated by `_` and `-`):
/// - lookup bundle: `<reportingEntity>_<date>-lookup_data.tar.gz`
/// - data file: `<fileNumber>-<reportingEntity>_<date>.tsv.gz`
pub fn parse_file_name(name: &str) -> Result<RawFile, FeedError> {
    if let Some(stem) = name.strip_suffix(LOOKUP_SUFFIX) {
        // e.g. "mysuite_2024-05-01" -> ("mysuite", "2024-05-01")
        let (entity, date) = stem
            .split_once('_')
            .ok_or_else(|| FeedError::NameParse(name.to_string()))?;
        if entity.is_empty() || date.is_empty() {
            return Err(FeedError::NameParse(name.to_string()));
        }
        return Ok(RawFile {
            name: name.to_string(),
            reporting_entity: entity.to_string(),
            date: date.to_string(),
            role: FileRole::Lookup,
        });
    }

    if let Some(stem) = name.strip_suffix(DATA_SUFFIX) {
        // e.g. "01-mysuite_2024-05-01" -> number "01", entity "mysuite",
        // date "2024-05-01"
        let (numbered, date) = stem
            .split_once('_')
            .ok_or_else(|| FeedError::NameParse(name.to_string()))?;
        let (file_number, entity) = numbered
            .split_once('-')
            .ok_or_else(|| FeedError::NameParse(name.to_string()))?;
        if file_number.is_empty() || entity.is_empty() || date.is_empty() {
            return Err(FeedError::NameParse(name.to_string()));
        }
        return Ok(RawFile {
            name: name.to_string(),
            reporting_entity: entity.to_string(),
            date: date.to_string(),
            role: FileRole::Data,
        });
    }

    Err(FeedError::NameParse(name.to_string()))
}

/// Build the partition index from the retrieved names.
///
/// Data files are appended in the order given (retrieval order). Unparseable
/// names are collected, not fatal. A second lookup bundle for the same key
/// replaces the first: on a re-drop the newest bundle wins.
pub fn group_files(names: &[String]) -> (PartitionIndex, Vec<SkippedFile>) {
    let mut index = PartitionIndex::new();
    let mut skipped = Vec::new();

    for name in names {
        let raw = match parse_file_name(name) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping unrecognized file name '{}'", name);
                skipped.push(SkippedFile {
                    name: name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let key = raw.partition_key();
        let entry = index.entry(key.clone());
        match raw.role {
            FileRole::Lookup => {
                if let Some(prev) = &entry.lookup_archive {
                    warn!(
                        "Duplicate lookup bundle for {}: replacing '{}' with '{}'",
                        key, prev.name, raw.name
                    );
                }
                entry.lookup_archive = Some(raw);
            }
            FileRole::Data => entry.data_files.push(raw),
        }
    }

    (index, skipped)
}
