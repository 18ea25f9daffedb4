//! Pipeline that orchestrates a full feed run: retrieve, group, and then
//! process each partition end to end.
//!
//! Partitions are strictly sequential and isolated: one partition is fully
//! extracted, enriched, assembled, and exported before the next begins, and
//! a failing partition is reported and skipped, never fatal to the run. A
//! partition's staged files are deleted only after its export succeeds; on
//! failure they stay in the work directory for a re-run.

use super::archive;
use super::assemble::{self, PartitionWorkspace};
use super::enrich;
use super::grouping;
use super::lookup::LookupCatalog;
use super::table::Table;
use super::types::{FeedError, PartitionEntry, PartitionKey, PartitionOutcome, RunReport};
use crate::config::Config;
use crate::sink::WarehouseSink;
use crate::source::FeedSource;
use crate::util;
use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

/// Name of the per-partition lookup directory inside the work directory.
const LOOKUP_DIR_NAME: &str = "lookup_tables";

/// Feed pipeline over a retrieval source and a warehouse sink.
pub struct Pipeline {
    config: Config,
    source: Box<dyn FeedSource>,
    sink: Box<dyn WarehouseSink>,
}

impl Pipeline {
    /// Run one full feed pass and report per-partition outcomes.
    pub fn run(&mut self) -> Result<RunReport, FeedError> {
        let started = Utc::now();
        let retries = self.config.processing.max_retries;
        let delay = Duration::from_millis(self.config.processing.retry_delay_ms);

        let source = &mut self.source;
        let names = util::retry("retrieval", retries, delay, || source.fetch())?;

        let (index, skipped) = grouping::group_files(&names);
        info!(
            "Grouped {} files into {} partition(s), {} skipped",
            names.len(),
            index.len(),
            skipped.len()
        );

        let mut partitions = Vec::new();
        for (key, entry) in index.iter() {
            info!("Processing partition {}", key);
            match self.process_partition(key, entry) {
                Ok(outcome) => partitions.push(outcome),
                Err(e) => {
                    warn!("Partition {} failed [{}]: {}", key, e.kind(), e);
                    partitions.push(PartitionOutcome::failed(key, &e));
                }
            }
        }

        let report = RunReport {
            started,
            finished: Utc::now(),
            fetched: names.len(),
            skipped,
            partitions,
        };
        info!(
            "Run finished: {} completed, {} failed",
            report.completed_count(),
            report.failed_count()
        );
        Ok(report)
    }

    /// Process one partition end to end. Cleanup of the staged files happens
    /// only on the success path, after the export.
    fn process_partition(
        &mut self,
        key: &PartitionKey,
        entry: &PartitionEntry,
    ) -> Result<PartitionOutcome, FeedError> {
        let bundle = entry
            .lookup_archive
            .as_ref()
            .ok_or_else(|| FeedError::Archive(format!("no lookup bundle retrieved for {}", key)))?;
        if entry.data_files.is_empty() {
            return Err(FeedError::Archive(format!(
                "no data files retrieved for {}",
                key
            )));
        }

        let work_dir = self.config.processing.work_dir.clone();
        let keep_post_only = self.config.processing.keep_post_only;
        let mut workspace = PartitionWorkspace::new();

        let bundle_path = work_dir.join(&bundle.name);
        let lookup_dir = work_dir.join(LOOKUP_DIR_NAME);
        info!("Unpacking lookup bundle '{}'", bundle.name);
        archive::extract_lookup_bundle(&bundle_path, &lookup_dir)?;
        workspace.record_compressed(bundle_path);
        workspace.record_lookup_dir(lookup_dir.clone());

        let mut catalog = LookupCatalog::open(&lookup_dir);

        info!("{} data file(s) for this partition", entry.data_files.len());
        let mut tables = Vec::new();
        let mut evar_dropped = 0;
        let mut prop_dropped = 0;
        for data_file in &entry.data_files {
            let src = work_dir.join(&data_file.name);
            let decompressed = archive::decompress_data_file(&src)?;
            workspace.record_compressed(src);
            workspace.record_decompressed(decompressed.clone());

            let (table, stats) = enrich::enrich_file(&decompressed, &mut catalog, keep_post_only)?;
            evar_dropped += stats.evar_dropped;
            prop_dropped += stats.prop_dropped;
            tables.push(table);
        }

        let data_files = tables.len();
        let table = assemble::concat(tables)?;
        let rows = table.row_count();
        let unique_sessions = table.distinct_count(table.require_column("Session_ID")?);
        let unique_users = table.distinct_count(table.require_column("User_ID")?);

        let destination = key.destination_name();
        self.export_table(&destination, &table)?;

        workspace.cleanup();
        info!("Completed import for {}", key);

        Ok(PartitionOutcome::Completed {
            reporting_entity: key.reporting_entity.clone(),
            date: key.date.clone(),
            destination,
            data_files,
            rows,
            unique_users,
            unique_sessions,
            evar_dropped,
            prop_dropped,
        })
    }

    /// Append the assembled table to the sink in chunks, retrying each chunk
    /// independently.
    fn export_table(&mut self, destination: &str, table: &Table) -> Result<(), FeedError> {
        let chunk_size = self.config.warehouse.chunk_size.max(1);
        let retries = self.config.processing.max_retries;
        let delay = Duration::from_millis(self.config.processing.retry_delay_ms);
        let columns = table.columns();
        let rows = table.rows();
        let sink = &mut self.sink;

        if rows.is_empty() {
            return util::retry("export", retries, delay, || {
                sink.append(destination, columns, &[])
            });
        }

        let mut chunks = 0;
        for chunk in rows.chunks(chunk_size) {
            util::retry("export", retries, delay, || {
                sink.append(destination, columns, chunk)
            })?;
            chunks += 1;
        }
        info!(
            "Exported {} rows to '{}' in {} chunk(s)",
            rows.len(),
            destination,
            chunks
        );
        Ok(())
    }
}

/// Builder for [`Pipeline`]. The retrieval source and warehouse sink have no
/// defaults and must be provided.
pub struct PipelineBuilder {
    config: Config,
    source: Option<Box<dyn FeedSource>>,
    sink: Option<Box<dyn WarehouseSink>>,
}

impl PipelineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            source: None,
            sink: None,
        }
    }

    pub fn with_source(mut self, source: impl FeedSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_sink(mut self, sink: impl WarehouseSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn build(self) -> anyhow::Result<Pipeline> {
        let source = match self.source {
            Some(source) => source,
            None => anyhow::bail!("A feed source is required. Call with_source() first."),
        };
        let sink = match self.sink {
            Some(sink) => sink,
            None => anyhow::bail!("A warehouse sink is required. Call with_sink() first."),
        };
        Ok(Pipeline {
            config: self.config,
            source,
            sink,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticSource(Vec<String>);

    impl FeedSource for StaticSource {
        fn fetch(&mut self) -> Result<Vec<String>, FeedError> {
            Ok(self.0.clone())
        }
    }

    struct NullSink;

    impl WarehouseSink for NullSink {
        fn append(
            &mut self,
            _destination: &str,
            _columns: &[String],
            _rows: &[Vec<String>],
        ) -> Result<(), FeedError> {
            Ok(())
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.processing.retry_delay_ms = 0;
        config
    }

    #[test]
    fn test_builder_requires_source() {
        let result = PipelineBuilder::new(test_config()).with_sink(NullSink).build();
        assert!(result.is_err());
        assert!(result.err().unwrap().to_string().contains("source"));
    }

    #[test]
    fn test_builder_requires_sink() {
        let result = PipelineBuilder::new(test_config())
            .with_source(StaticSource(Vec::new()))
            .build();
        assert!(result.is_err());
        assert!(result.err().unwrap().to_string().contains("sink"));
    }

    #[test]
    fn test_run_with_no_files_is_empty_report() {
        let mut pipeline = PipelineBuilder::new(test_config())
            .with_source(StaticSource(Vec::new()))
            .with_sink(NullSink)
            .build()
            .unwrap();

        let report = pipeline.run().unwrap();
        assert_eq!(report.fetched, 0);
        assert!(report.skipped.is_empty());
        assert!(report.partitions.is_empty());
    }

    #[test]
    fn test_run_reports_unparseable_names_as_skipped() {
        let mut pipeline = PipelineBuilder::new(test_config())
            .with_source(StaticSource(vec!["stray.bin".to_string()]))
            .with_sink(NullSink)
            .build()
            .unwrap();

        let report = pipeline.run().unwrap();
        assert_eq!(report.fetched, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.partitions.is_empty());
    }

    #[test]
    fn test_partition_without_bundle_fails_but_run_continues() {
        let mut pipeline = PipelineBuilder::new(test_config())
            .with_source(StaticSource(vec!["01-suite_2024-05-01.tsv.gz".to_string()]))
            .with_sink(NullSink)
            .build()
            .unwrap();

        let report = pipeline.run().unwrap();
        assert_eq!(report.partitions.len(), 1);
        match &report.partitions[0] {
            PartitionOutcome::Failed { kind, message, .. } => {
                assert_eq!(kind, "archive");
                assert!(message.contains("lookup bundle"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
