//! # Adapter Registry
//!
//! Thread-safe lookup from plugin code to the [`SourceAdapter`] serving it.
//! The built-in dialects are always present; every other catalog plugin is
//! reached through a [`RemoteAdapter`].

use super::dd_api::DdApiAdapter;
use super::dd_eco_api::DdEcoApiAdapter;
use super::remote::RemoteAdapter;
use super::z_info::ZInfoAdapter;
use super::{dd_api, dd_eco_api, z_info, HttpContext, SourceAdapter};
use crate::storage::SourceCatalog;
use capi_core::Plugin;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const BUILTIN_PLUGINS: [&str; 3] = [dd_api::PLUGIN_CODE, dd_eco_api::PLUGIN_CODE, z_info::PLUGIN_CODE];

pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn SourceAdapter>>>,
    http: HttpContext,
}

impl AdapterRegistry {
    /// Registry holding the built-in dialects.
    pub fn new(http: HttpContext) -> Self {
        let builtin: [Arc<dyn SourceAdapter>; 3] = [
            Arc::new(DdApiAdapter::new(http.clone())),
            Arc::new(DdEcoApiAdapter::new(http.clone())),
            Arc::new(ZInfoAdapter::new(http.clone())),
        ];
        let adapters = builtin
            .into_iter()
            .map(|a| (a.code().to_string(), a))
            .collect();
        Self {
            adapters: RwLock::new(adapters),
            http,
        }
    }

    pub async fn register(&self, adapter: Arc<dyn SourceAdapter>) {
        let mut adapters = self.adapters.write().await;
        adapters.insert(adapter.code().to_string(), adapter);
    }

    /// Route a non-built-in plugin to its HTTP host. Built-in codes are
    /// left alone and `false` is returned.
    pub async fn register_remote(&self, plugin: &Plugin) -> bool {
        if BUILTIN_PLUGINS.contains(&plugin.code.as_str()) {
            return false;
        }
        if plugin.url.is_empty() {
            tracing::warn!(plugin = %plugin.code, "Plugin has no url, not registered");
            return false;
        }
        tracing::info!(plugin = %plugin.code, url = %plugin.url, "Registered remote plugin");
        self.register(Arc::new(RemoteAdapter::new(plugin, self.http.clone())))
            .await;
        true
    }

    /// Register a remote adapter for every catalog plugin. Returns how many
    /// were added.
    pub async fn sync_catalog(&self, catalog: &dyn SourceCatalog) -> usize {
        let mut added = 0;
        for plugin in catalog.plugins() {
            if self.register_remote(&plugin).await {
                added += 1;
            }
        }
        added
    }

    pub async fn resolve(&self, plugin_code: &str) -> Option<Arc<dyn SourceAdapter>> {
        let adapters = self.adapters.read().await;
        adapters.get(plugin_code).cloned()
    }

    pub async fn codes(&self) -> Vec<String> {
        let adapters = self.adapters.read().await;
        let mut codes: Vec<String> = adapters.keys().cloned().collect();
        codes.sort();
        codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileCatalog;

    fn plugin(code: &str, url: &str) -> Plugin {
        Plugin {
            code: code.into(),
            name: code.into(),
            url: url.into(),
        }
    }

    #[tokio::test]
    async fn test_builtins_and_remotes() {
        let registry = AdapterRegistry::new(HttpContext::with_client(reqwest::Client::new()));
        assert_eq!(registry.codes().await, vec!["ddapi", "ddecoapi", "zinfo"]);
        assert!(registry.resolve("unknown").await.is_none());

        let catalog = FileCatalog::from_parts(
            vec![
                plugin("ddapi", "http://elsewhere"),
                plugin("custom", "http://plugin-host"),
                plugin("broken", ""),
            ],
            Vec::new(),
        );
        assert_eq!(registry.sync_catalog(&catalog).await, 1);
        assert_eq!(registry.resolve("custom").await.unwrap().code(), "custom");
        assert_eq!(registry.resolve("ddapi").await.unwrap().code(), "ddapi");
        assert!(registry.resolve("broken").await.is_none());
    }
}
