//! Feed partition assembly and row enrichment
//!
//! This module turns a raw clickstream feed drop into enriched, exportable
//! partition tables. A drop is a flat pile of files; everything for one
//! reporting entity on one date forms a partition, processed as a unit:
//! unpack that partition's lookup bundle, decompress and enrich each of its
//! data files, concatenate them, and append the result to the warehouse.
//!
//! # Example Usage
//!
//! ```no_run
//! use clickfeed::config::Config;
//! use clickfeed::feed::PipelineBuilder;
//! use clickfeed::sink::CsvSink;
//! use clickfeed::source::DropDirSource;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let source = DropDirSource::new(&config.endpoint.drop_dir, &config.processing.work_dir);
//! let sink = CsvSink::new(&config.warehouse.out_dir, config.warehouse.dataset.clone());
//!
//! let mut pipeline = PipelineBuilder::new(config)
//!     .with_source(source)
//!     .with_sink(sink)
//!     .build()?;
//!
//! let report = pipeline.run()?;
//! report.print_summary();
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! FeedSource ──► Filename Grouper ──► PartitionIndex
//!                                          │ one partition at a time
//!                                          ▼
//!            unpack lookup bundle ──► LookupCatalog
//!                                          │
//!            decompress data file ──► Row Enricher   (per data file)
//!                                          │
//!                                          ▼
//!                  concat ──► chunked append ──► WarehouseSink
//!                                          │
//!                                          ▼
//!                              post-success cleanup
//! ```

pub mod archive;
pub mod assemble;
pub mod enrich;
pub mod grouping;
pub mod lookup;
pub mod pipeline;
pub mod table;
pub mod types;

// Re-export main types
pub use assemble::PartitionWorkspace;
pub use lookup::{DimensionTable, LookupCatalog};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use table::Table;
pub use types::{
    FeedError, FileRole, FileStats, PartitionEntry, PartitionIndex, PartitionKey,
    PartitionOutcome, RawFile, RunReport, SkippedFile,
};
