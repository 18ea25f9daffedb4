//! Clickfeed: clickstream feed importer for analytics warehouses
//!
//! An ETL pipeline for raw clickstream feed drops, featuring:
//! - Filename-driven grouping of drops into (reporting entity, date) partitions
//! - Lookup-bundle extraction and cached dimension-table translation
//! - Row enrichment: visitor-type labels, session/user identifiers, column sanitation
//! - Per-partition isolation with deletion deferred until export succeeds
//! - Chunked append-mode export with bounded retries

pub mod config;
pub mod feed;
pub mod sink;
pub mod source;
pub mod util;

pub use config::Config;
pub use feed::{
    FeedError, Pipeline, PipelineBuilder, PartitionKey, PartitionOutcome, RunReport,
};
pub use sink::{CsvSink, WarehouseSink};
pub use source::{DropDirSource, FeedSource};
