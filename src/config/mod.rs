//! Configuration for the clickfeed importer

mod endpoint;
mod logging;
mod processing;
mod warehouse;

pub use endpoint::EndpointConfig;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use processing::ProcessingConfig;
pub use warehouse::WarehouseConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for a clickfeed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Feed endpoint configuration
    #[serde(default)]
    pub endpoint: EndpointConfig,
    /// Warehouse export configuration
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    /// Partition processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            warehouse: WarehouseConfig::default(),
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects every validation error and reports them together so the user
    /// can fix the whole file in one pass.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.endpoint.drop_dir.as_os_str().is_empty() {
            errors.push("endpoint drop_dir must not be empty".to_string());
        }

        if self.warehouse.dataset.is_empty() {
            errors.push("warehouse dataset must not be empty".to_string());
        }
        if self.warehouse.out_dir.as_os_str().is_empty() {
            errors.push("warehouse out_dir must not be empty".to_string());
        }
        if self.warehouse.chunk_size == 0 {
            errors.push("warehouse chunk_size must be positive".to_string());
        }

        if self.processing.work_dir.as_os_str().is_empty() {
            errors.push("processing work_dir must not be empty".to_string());
        }
        if self.processing.max_retries == 0 {
            errors.push("processing max_retries must be positive".to_string());
        }

        if !errors.is_empty() {
            anyhow::bail!("Invalid configuration:\n  - {}", errors.join("\n  - "));
        }

        Ok(())
    }
}
