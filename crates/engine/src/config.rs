//! Engine configuration.
//!
//! Bounds for the recursive walks plus the default version name. Every
//! field has a serde default, so an empty TOML document is a valid config.
//!
//! ```toml
//! max_ancestor_depth = 100
//! max_tree_depth = 1000
//! rebuild_chunk_size = 1000
//! default_version = "default"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use taxograph_core::{TaxonomyError, TaxonomyResult, VersionId};

/// Default bound for upward (ancestor) walks.
pub const DEFAULT_MAX_ANCESTOR_DEPTH: usize = 100;

/// Default bound for downward (subtree) walks.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 1_000;

/// Default number of node ids handled per batch-rebuild chunk.
pub const DEFAULT_REBUILD_CHUNK_SIZE: usize = 1_000;

/// Configuration for a [`Taxonomy`](crate::Taxonomy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    /// Maximum number of levels walked upward from a node.
    #[serde(default = "default_max_ancestor_depth")]
    pub max_ancestor_depth: usize,

    /// Maximum number of levels walked downward from a node.
    #[serde(default = "default_max_tree_depth")]
    pub max_tree_depth: usize,

    /// Node ids processed per chunk by [`Taxonomy::rebuild_all_averages`](crate::Taxonomy::rebuild_all_averages).
    #[serde(default = "default_rebuild_chunk_size")]
    pub rebuild_chunk_size: usize,

    /// Version used by callers that do not pick one.
    #[serde(default = "default_version")]
    pub default_version: String,
}

fn default_max_ancestor_depth() -> usize {
    DEFAULT_MAX_ANCESTOR_DEPTH
}

fn default_max_tree_depth() -> usize {
    DEFAULT_MAX_TREE_DEPTH
}

fn default_rebuild_chunk_size() -> usize {
    DEFAULT_REBUILD_CHUNK_SIZE
}

fn default_version() -> String {
    VersionId::DEFAULT.to_string()
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            max_ancestor_depth: DEFAULT_MAX_ANCESTOR_DEPTH,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
            rebuild_chunk_size: DEFAULT_REBUILD_CHUNK_SIZE,
            default_version: default_version(),
        }
    }
}

impl TaxonomyConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> TaxonomyResult<Self> {
        let config: TaxonomyConfig = toml::from_str(s)
            .map_err(|e| TaxonomyError::config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> TaxonomyResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TaxonomyError::config(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to a TOML document.
    pub fn to_toml_string(&self) -> TaxonomyResult<String> {
        toml::to_string(self)
            .map_err(|e| TaxonomyError::config(format!("failed to encode config: {}", e)))
    }

    /// Reject zero bounds and an empty default version.
    pub fn validate(&self) -> TaxonomyResult<()> {
        if self.max_ancestor_depth == 0 {
            return Err(TaxonomyError::config(
                "max_ancestor_depth must be greater than 0",
            ));
        }
        if self.max_tree_depth == 0 {
            return Err(TaxonomyError::config("max_tree_depth must be greater than 0"));
        }
        if self.rebuild_chunk_size == 0 {
            return Err(TaxonomyError::config(
                "rebuild_chunk_size must be greater than 0",
            ));
        }
        if self.default_version.is_empty() {
            return Err(TaxonomyError::config("default_version must not be empty"));
        }
        Ok(())
    }

    /// The configured default version.
    pub fn default_version_id(&self) -> VersionId {
        VersionId::new(self.default_version.clone())
    }
}
