//! Warehouse export configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Destination warehouse for assembled partitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Warehouse project identifier
    pub project_id: String,
    /// Path to the credential material used for the export
    pub credential_path: PathBuf,
    /// Dataset every partition table lands in
    pub dataset: String,
    /// Directory the bundled CSV sink writes under
    pub out_dir: PathBuf,
    /// Rows per append chunk
    pub chunk_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            credential_path: PathBuf::new(),
            dataset: "adobe".to_string(),
            out_dir: PathBuf::from("warehouse"),
            chunk_size: 10_000,
        }
    }
}
