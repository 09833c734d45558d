//! Query engine configuration via `query_engine.toml`
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the standard behavior.

use serde::{Deserialize, Serialize};
use std::path::Path;

use docstore_core::{StoreError, StoreResult};

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "query_engine.toml";

/// Configuration of [`crate::DefaultQueryEngine`].
///
/// # Example
///
/// ```toml
/// # Re-run a query by key over its previous result set when the caller
/// # supplies a limbo-free snapshot version (default: true)
/// reuse_limbo_free_results = true
///
/// # Log a warning when a full collection scan returns more documents
/// # than this (default: unset, never warn)
/// # full_scan_warn_threshold = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEngineConfig {
    /// Answer queries from previous results plus newer changes when possible.
    #[serde(default = "default_reuse_limbo_free_results")]
    pub reuse_limbo_free_results: bool,
    /// Result size above which a full collection scan is logged at `warn`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_scan_warn_threshold: Option<usize>,
}

fn default_reuse_limbo_free_results() -> bool {
    true
}

impl Default for QueryEngineConfig {
    fn default() -> Self {
        Self {
            reuse_limbo_free_results: default_reuse_limbo_free_results(),
            full_scan_warn_threshold: None,
        }
    }
}

impl QueryEngineConfig {
    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the text is not valid config TOML.
    pub fn from_toml_str(content: &str) -> StoreResult<Self> {
        toml::from_str(content)
            .map_err(|e| StoreError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            StoreError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StoreResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StoreError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            StoreError::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
