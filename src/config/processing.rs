//! Partition processing configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Knobs for the per-partition pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Drop raw `evar*`/`prop*` columns, keeping only post-processed data
    pub keep_post_only: bool,
    /// Directory fetched files are staged and extracted in
    pub work_dir: PathBuf,
    /// Attempts per network-facing operation (retrieval, export chunk)
    pub max_retries: usize,
    /// Delay between attempts (milliseconds)
    pub retry_delay_ms: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            keep_post_only: true,
            work_dir: PathBuf::from("work"),
            max_retries: 3,
            retry_delay_ms: 2_000,
        }
    }
}
