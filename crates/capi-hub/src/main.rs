use capi_core::{CapabilitySet, ConnectorCapability, Plugin, SourceDefinition};
use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod connectors;
mod query;
mod storage;

use connectors::registry::AdapterRegistry;
use connectors::HttpContext;
use query::Orchestrator;
use storage::json::JsonResponseStore;
use storage::memory::MemoryResponseStore;
use storage::{FileCatalog, ResponseStore};

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser)]
#[command(
    name = "capi-hub",
    version,
    about = "C-API measurement federation gateway"
)]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: String,

    /// Path to config file
    #[arg(long, default_value = "capi-hub.toml")]
    config: PathBuf,

    /// Data directory (overrides storage.data_dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

// =============================================================================
// Config
// =============================================================================

#[derive(Deserialize, Default, Clone)]
struct Config {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    capabilities: Vec<ConnectorCapability>,
    #[serde(default)]
    plugins: Vec<Plugin>,
    #[serde(default)]
    sources: Vec<SourceDefinition>,
}

#[derive(Deserialize, Clone)]
struct ServerConfig {
    /// Bound on one source's part of a fan-out.
    #[serde(default = "default_request_timeout")]
    request_timeout_secs: u64,
    /// HTTP timeout of adapter calls to backends.
    #[serde(default = "default_source_timeout")]
    source_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            source_timeout_secs: default_source_timeout(),
        }
    }
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum CacheKind {
    #[default]
    Memory,
    Json,
}

#[derive(Deserialize, Clone)]
struct StorageConfig {
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    #[serde(default)]
    cache: CacheKind,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cache: CacheKind::default(),
        }
    }
}

fn default_request_timeout() -> u64 {
    180
}
fn default_source_timeout() -> u64 {
    300
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn load_config(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Cannot read config {:?}: {}, using defaults", path, e);
            return Config::default();
        }
    };
    toml::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!("Invalid config {:?}: {}, using defaults", path, e);
        Config::default()
    })
}

impl Config {
    fn capability_set(&self) -> CapabilitySet {
        if self.capabilities.is_empty() {
            CapabilitySet::builtin()
        } else {
            CapabilitySet::new(self.capabilities.clone())
        }
    }
}

// =============================================================================
// Application State
// =============================================================================

pub struct AppState {
    start_time: Instant,
    orchestrator: Orchestrator,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "capi_hub=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(&args.config);
    let data_dir = args.data_dir.clone().unwrap_or_else(|| config.storage.data_dir.clone());

    let catalog = match FileCatalog::load(&data_dir, config.plugins.clone(), config.sources.clone()) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!("Failed to read catalog from {:?}: {}", data_dir, e);
            std::process::exit(1);
        }
    };

    let http = HttpContext::new(Duration::from_secs(config.server.source_timeout_secs))
        .expect("Failed to build HTTP client");
    let registry = Arc::new(AdapterRegistry::new(http));
    let remotes = registry.sync_catalog(&catalog).await;

    let store: Arc<dyn ResponseStore> = match config.storage.cache {
        CacheKind::Memory => Arc::new(MemoryResponseStore::new()),
        CacheKind::Json => Arc::new(JsonResponseStore::new(&data_dir)),
    };
    let capabilities = config.capability_set();
    let source_count = storage::SourceCatalog::sources(&catalog).len();

    let orchestrator = Orchestrator::new(Arc::new(catalog), registry.clone(), store, capabilities)
        .with_request_timeout(Duration::from_secs(config.server.request_timeout_secs));
    let state = Arc::new(AppState {
        start_time: Instant::now(),
        orchestrator,
    });
    let app = api::router(state);

    let addr: SocketAddr = args.bind.parse().expect("Invalid bind address");
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("  C-API hub v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("  API:        http://{}/api/status", addr);
    tracing::info!("  Data:       {:?} ({:?} cache)", data_dir, config.storage.cache);
    tracing::info!("  Sources:    {}", source_count);
    tracing::info!("  Plugins:    {:?} ({} remote)", registry.codes().await, remotes);
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_sections_default_independently() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            cache = "json"

            [[capabilities]]
            field_name = "quantity"
            data_category = "quantity"
            query_type = "stringExact"
            required = true

            [[sources]]
            code = "DD"
            plugin = "ddapi"
            url = "http://backend"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.cache, CacheKind::Json);
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
        assert_eq!(config.server.request_timeout_secs, 180);
        assert_eq!(config.sources[0].plugin, "ddapi");

        let capabilities = config.capability_set();
        assert_eq!(capabilities.required_fields(), vec!["quantity"]);
        assert!(!capabilities.contains("unit"));
    }

    #[test]
    fn test_missing_or_broken_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config(&dir.path().join("absent.toml")).server.source_timeout_secs, 300);

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[server\nrequest_timeout_secs = ").unwrap();
        let config = load_config(&broken);
        assert_eq!(config.server.request_timeout_secs, 180);
        assert_eq!(config.capability_set(), CapabilitySet::builtin());
    }
}
