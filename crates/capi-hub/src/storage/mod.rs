//! # Storage Collaborators
//!
//! Two concerns live here:
//!
//! - the **source catalog**, a static read-only lookup of [`SourceDefinition`]s
//!   and [`Plugin`]s loaded once at start-up;
//! - the **response cache**, where every fan-out unit parks its
//!   [`MeasurementResponse`] under `(request id, source code)` until the
//!   orchestrator collects and clears them.

pub mod json;
pub mod memory;

use capi_core::{MeasurementResponse, Plugin, SourceDefinition};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response for {source_code} in request {request_id} already stored")]
    Duplicate {
        request_id: String,
        source_code: String,
    },
}

// =============================================================================
// Response cache
// =============================================================================

/// Per-request response storage, partitioned by source code.
#[async_trait::async_trait]
pub trait ResponseStore: Send + Sync {
    /// Each `(request_id, source_code)` slot is written at most once.
    async fn put_response(
        &self,
        request_id: &str,
        source_code: &str,
        response: &MeasurementResponse,
    ) -> Result<(), StoreError>;

    async fn get_all_responses(&self, request_id: &str) -> Result<Vec<MeasurementResponse>, StoreError>;

    /// Removing a request that has no entries is not an error.
    async fn delete_all(&self, request_id: &str) -> Result<(), StoreError>;
}

// =============================================================================
// Source catalog
// =============================================================================

pub trait SourceCatalog: Send + Sync {
    fn sources(&self) -> Vec<SourceDefinition>;
    fn source_by_code(&self, code: &str) -> Option<SourceDefinition>;
    fn plugin_by_code(&self, code: &str) -> Option<Plugin>;
    fn plugins(&self) -> Vec<Plugin>;
}

/// Catalog read from `<data_dir>/plugins/*.json` and
/// `<data_dir>/sourcedefinitions/*.json`, merged with inline entries.
/// File entries win over inline entries with the same code.
pub struct FileCatalog {
    sources: HashMap<String, SourceDefinition>,
    plugins: HashMap<String, Plugin>,
}

impl FileCatalog {
    pub fn load(
        data_dir: &Path,
        inline_plugins: Vec<Plugin>,
        inline_sources: Vec<SourceDefinition>,
    ) -> Result<Self, StoreError> {
        let mut plugins = inline_plugins;
        plugins.extend(read_dir_json::<Plugin>(&data_dir.join("plugins"))?);
        let mut sources = inline_sources;
        sources.extend(read_dir_json::<SourceDefinition>(&data_dir.join("sourcedefinitions"))?);
        Ok(Self::from_parts(plugins, sources))
    }

    pub fn from_parts(plugins: Vec<Plugin>, sources: Vec<SourceDefinition>) -> Self {
        Self {
            plugins: plugins.into_iter().map(|p| (p.code.clone(), p)).collect(),
            sources: sources.into_iter().map(|s| (s.code.clone(), s)).collect(),
        }
    }
}

impl SourceCatalog for FileCatalog {
    fn sources(&self) -> Vec<SourceDefinition> {
        let mut all: Vec<SourceDefinition> = self.sources.values().cloned().collect();
        all.sort_by(|a, b| a.code.cmp(&b.code));
        all
    }

    fn source_by_code(&self, code: &str) -> Option<SourceDefinition> {
        self.sources.get(code).cloned()
    }

    fn plugin_by_code(&self, code: &str) -> Option<Plugin> {
        self.plugins.get(code).cloned()
    }

    fn plugins(&self) -> Vec<Plugin> {
        let mut all: Vec<Plugin> = self.plugins.values().cloned().collect();
        all.sort_by(|a, b| a.code.cmp(&b.code));
        all
    }
}

/// Every `*.json` file in `dir`, sorted by file name. A missing directory
/// yields nothing; an unparsable file is skipped with a warning.
fn read_dir_json<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StoreError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
        .collect();
    paths.sort();

    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!("Skipping catalog file {:?}: {}", path, e),
        }
    }
    Ok(items)
}
