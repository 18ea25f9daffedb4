//! Feed endpoint configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where feed drops come from.
///
/// Host and credentials identify the remote endpoint; `drop_dir` is the
/// local directory its drops land in, which is what the retrieval source
/// actually drains.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Endpoint host name
    pub host: String,
    /// Endpoint login user
    pub username: String,
    /// Endpoint login password
    pub password: String,
    /// Local directory the endpoint's drops arrive in
    pub drop_dir: PathBuf,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            username: String::new(),
            password: String::new(),
            drop_dir: PathBuf::from("drop"),
        }
    }
}
