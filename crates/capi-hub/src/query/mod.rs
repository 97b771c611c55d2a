//! # Fan-out Orchestrator
//!
//! Validates a measurement request, runs one adapter task per source and
//! aggregates the results.
//!
//! ```text
//! sources + filter ─► validate ─► parse ─► spawn per source ─► barrier
//!                                              │                   │
//!                                              ▼                   ▼
//!                                     ResponseStore.put   get_all + delete_all
//! ```
//!
//! Every task owns exactly one `(request id, source code)` slot of the
//! [`ResponseStore`]. Aggregation starts only after all tasks have
//! finished, so the read-and-delete step never races a writer.

pub mod validate;

use crate::connectors::registry::AdapterRegistry;
use crate::connectors::{ListKind, SourceAdapter};
use crate::storage::{ResponseStore, SourceCatalog};
use capi_core::{
    CapabilitySet, DataBody, ErrorResponse, FilterParser, MeasurementList, MeasurementObject,
    MeasurementResponse, SourceCodeName, SourceDefinition,
};
use futures_util::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use validate::split_sources;

/// Default bound on one source's adapter cycle.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Catalog entry as listed to callers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceSummary {
    pub code: String,
    pub name: String,
}

pub struct Orchestrator {
    catalog: Arc<dyn SourceCatalog>,
    adapters: Arc<AdapterRegistry>,
    store: Arc<dyn ResponseStore>,
    capabilities: CapabilitySet,
    request_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<dyn SourceCatalog>,
        adapters: Arc<AdapterRegistry>,
        store: Arc<dyn ResponseStore>,
        capabilities: CapabilitySet,
    ) -> Self {
        Self {
            catalog,
            adapters,
            store,
            capabilities,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    pub fn sources(&self) -> Vec<SourceSummary> {
        self.catalog
            .sources()
            .into_iter()
            .map(|s| SourceSummary {
                name: if s.name.is_empty() { s.code.clone() } else { s.name },
                code: s.code,
            })
            .collect()
    }

    // =========================================================================
    // Measurements
    // =========================================================================

    /// Validate, fan out and aggregate one measurement request. Any source
    /// or filter error rejects the request before a single backend call.
    pub async fn process(
        &self,
        request_id: &str,
        source_codes: &[String],
        filter: Option<&str>,
    ) -> Result<MeasurementList, ErrorResponse> {
        let mut errors = ErrorResponse::default();
        let outcome = FilterParser::new(&self.capabilities).parse(filter);
        errors.request_error = outcome.errors;
        validate::check_measurement_fields(&outcome.conditions, &mut errors);
        let sources = validate::validate_sources(self.catalog.as_ref(), source_codes, &mut errors);
        if !errors.is_empty() {
            tracing::info!(
                request_id,
                source_errors = errors.source_errors.len(),
                request_errors = errors.request_error.len(),
                "Request rejected"
            );
            return Err(errors);
        }

        let mut units = Vec::new();
        for (source, adapter) in self.resolve(sources).await {
            let body = DataBody::new(source, outcome.conditions.clone(), request_id, self.capabilities.clone());
            let store = self.store.clone();
            let timeout = self.request_timeout;
            let code = body.source_code().to_string();
            let handle = tokio::spawn(async move {
                let response = run_measurements(adapter, &body, timeout).await;
                store_response(store.as_ref(), &body.response_id, body.source_code(), &response).await;
            });
            units.push((code, handle));
        }
        tracing::info!(request_id, sources = units.len(), "Fan-out started");

        let (codes, handles): (Vec<String>, Vec<_>) = units.into_iter().unzip();
        for (code, joined) in codes.iter().zip(join_all(handles).await) {
            if let Err(e) = joined {
                tracing::error!(request_id, source = %code, "Adapter task failed: {}", e);
                let response = MeasurementResponse::failed(code, request_id, 502, format!("Adapter task failed: {}", e));
                store_response(self.store.as_ref(), request_id, code, &response).await;
            }
        }

        let responses = match self.store.get_all_responses(request_id).await {
            Ok(responses) => responses,
            Err(e) => {
                tracing::error!(request_id, "Reading cached responses failed: {}", e);
                Vec::new()
            }
        };
        if let Err(e) = self.store.delete_all(request_id).await {
            tracing::error!(request_id, "Clearing cached responses failed: {}", e);
        }

        let list = MeasurementList::from_responses(responses);
        tracing::info!(
            request_id,
            measurements = list.result.len(),
            failed_sources = list.errors.len(),
            "Request complete"
        );
        Ok(list)
    }

    // =========================================================================
    // Lists
    // =========================================================================

    pub async fn code_names(&self, kind: ListKind, source_codes: &[String]) -> Result<Vec<SourceCodeName>, ErrorResponse> {
        let timeout = self.request_timeout;
        self.fan_out_list(source_codes, move |adapter, body| async move {
            bounded(timeout, adapter.code_names(kind, &body)).await
        })
        .await
    }

    pub async fn measurement_objects(&self, source_codes: &[String]) -> Result<Vec<MeasurementObject>, ErrorResponse> {
        let timeout = self.request_timeout;
        self.fan_out_list(source_codes, move |adapter, body| async move {
            bounded(timeout, adapter.measurement_objects(&body)).await
        })
        .await
    }

    /// Run one list call per source and concatenate the entries. Failing
    /// sources contribute nothing.
    async fn fan_out_list<T, F, Fut>(&self, source_codes: &[String], call: F) -> Result<Vec<T>, ErrorResponse>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn SourceAdapter>, DataBody) -> Fut,
        Fut: Future<Output = (u16, Vec<T>)> + Send + 'static,
    {
        let mut errors = ErrorResponse::default();
        let sources = validate::validate_sources(self.catalog.as_ref(), source_codes, &mut errors);
        if !errors.is_empty() {
            return Err(errors);
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let mut units = Vec::new();
        for (source, adapter) in self.resolve(sources).await {
            let body = DataBody::new(source, Vec::new(), &request_id, self.capabilities.clone());
            units.push((body.source_code().to_string(), tokio::spawn(call(adapter, body))));
        }

        let (codes, handles): (Vec<String>, Vec<_>) = units.into_iter().unzip();
        let mut entries = Vec::new();
        for (code, joined) in codes.iter().zip(join_all(handles).await) {
            match joined {
                Ok((status, items)) if (200..300).contains(&status) => entries.extend(items),
                Ok((status, _)) => tracing::warn!(source = %code, status, "List request failed"),
                Err(e) => tracing::error!(source = %code, "List task failed: {}", e),
            }
        }
        Ok(entries)
    }

    /// Pair each source with its adapter. A catalog plugin without an
    /// adapter yet is registered on first use; sources whose plugin is
    /// still unresolved are skipped.
    async fn resolve(&self, sources: Vec<SourceDefinition>) -> Vec<(SourceDefinition, Arc<dyn SourceAdapter>)> {
        let mut resolved = Vec::with_capacity(sources.len());
        for source in sources {
            let mut adapter = self.adapters.resolve(&source.plugin).await;
            if adapter.is_none() {
                if let Some(plugin) = self.catalog.plugin_by_code(&source.plugin) {
                    if self.adapters.register_remote(&plugin).await {
                        adapter = self.adapters.resolve(&source.plugin).await;
                    }
                }
            }
            match adapter {
                Some(adapter) => resolved.push((source, adapter)),
                None => tracing::warn!(source = %source.code, plugin = %source.plugin, "No adapter for plugin, skipped"),
            }
        }
        resolved
    }
}

async fn run_measurements(adapter: Arc<dyn SourceAdapter>, body: &DataBody, timeout: Duration) -> MeasurementResponse {
    match tokio::time::timeout(timeout, adapter.measurements(body)).await {
        Ok(mut response) => {
            response.source = body.source_code().to_string();
            response.request_id = body.response_id.clone();
            response
        }
        Err(_) => {
            tracing::warn!(source = %body.source_code(), "Source timed out after {:?}", timeout);
            MeasurementResponse::failed(
                body.source_code(),
                &body.response_id,
                504,
                format!("Source did not answer within {} seconds", timeout.as_secs()),
            )
        }
    }
}

async fn bounded<T>(timeout: Duration, call: impl Future<Output = (u16, Vec<T>)>) -> (u16, Vec<T>) {
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or_else(|_| (504, Vec::new()))
}

async fn store_response(store: &dyn ResponseStore, request_id: &str, source_code: &str, response: &MeasurementResponse) {
    if let Err(e) = store.put_response(request_id, source_code, response).await {
        tracing::error!(request_id, source = %source_code, "Caching response failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::HttpContext;
    use crate::storage::memory::MemoryResponseStore;
    use crate::storage::FileCatalog;
    use capi_core::{ErrorType, Measurement, SourceErrorType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Adapter answering from memory.
    struct Fixed {
        code: &'static str,
        calls: AtomicUsize,
        delay: Duration,
        panics: bool,
    }

    impl Fixed {
        fn new(code: &'static str) -> Self {
            Self {
                code,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                panics: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl SourceAdapter for Fixed {
        fn code(&self) -> &str {
            self.code
        }

        async fn measurements(&self, body: &DataBody) -> MeasurementResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.panics {
                panic!("adapter bug");
            }
            let mut response = MeasurementResponse::new(body.source_code(), &body.response_id);
            let mut m = Measurement::new(body.source_code());
            m.value = Some(body.conditions.len() as f64);
            response.measurements.push(m);
            response
        }

        async fn code_names(&self, kind: ListKind, body: &DataBody) -> (u16, Vec<SourceCodeName>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (200, vec![SourceCodeName::new(body.source_code(), kind.as_str(), kind.as_str())])
        }

        async fn measurement_objects(&self, _body: &DataBody) -> (u16, Vec<MeasurementObject>) {
            (500, Vec::new())
        }
    }

    struct Setup {
        orchestrator: Orchestrator,
        store: Arc<MemoryResponseStore>,
        ok: Arc<Fixed>,
    }

    async fn setup(slow: Fixed) -> Setup {
        let catalog = FileCatalog::from_parts(
            Vec::new(),
            vec![
                SourceDefinition::new("A", "ok", "http://a"),
                SourceDefinition::new("B", "ok", "http://b"),
                SourceDefinition::new("S", slow.code, "http://s"),
                SourceDefinition::new("N", "nowhere", "http://n"),
            ],
        );
        let registry = Arc::new(AdapterRegistry::new(HttpContext::with_client(reqwest::Client::new())));
        let ok = Arc::new(Fixed::new("ok"));
        registry.register(ok.clone()).await;
        registry.register(Arc::new(slow)).await;
        let store = Arc::new(MemoryResponseStore::new());
        let orchestrator = Orchestrator::new(Arc::new(catalog), registry, store.clone(), CapabilitySet::builtin())
            .with_request_timeout(Duration::from_millis(200));
        Setup { orchestrator, store, ok }
    }

    fn codes(raw: &str) -> Vec<String> {
        split_sources(Some(raw))
    }

    #[tokio::test]
    async fn test_fan_out_aggregates_and_clears_cache() {
        let s = setup(Fixed::new("slow")).await;
        let list = s
            .orchestrator
            .process("r1", &codes("A,B,N"), Some("quantity:eq:'Q1';measurementdate:ge:'2024-01-01'"))
            .await
            .unwrap();
        let mut sources: Vec<&str> = list.result.iter().map(|m| m.source.as_str()).collect();
        sources.sort();
        assert_eq!(sources, vec!["A", "B"]);
        assert!(list.result.iter().all(|m| m.value == Some(2.0)));
        assert_eq!(list.statistics.len(), 2);
        assert!(list.errors.is_empty());
        assert_eq!(s.ok.calls.load(Ordering::SeqCst), 2);
        assert_eq!(s.store.pending_requests().await, 0);
    }

    #[tokio::test]
    async fn test_rejected_request_makes_no_calls() {
        let s = setup(Fixed::new("slow")).await;
        let err = s
            .orchestrator
            .process("r2", &codes("A,A"), Some("quantity:eq:'Q1'"))
            .await
            .unwrap_err();
        assert_eq!(err.source_errors.len(), 1);
        assert_eq!(err.source_errors[0].error, SourceErrorType::Duplicate);

        let err = s
            .orchestrator
            .process("r3", &codes("A"), Some("unknownfield:eq:'X'"))
            .await
            .unwrap_err();
        assert_eq!(err.request_error.len(), 1);
        assert_eq!(err.request_error[0].kind, ErrorType::UnknownField);
        assert!(err.source_errors.is_empty());

        let err = s.orchestrator.process("r4", &codes("A"), None).await.unwrap_err();
        assert_eq!(err.request_error[0].kind, ErrorType::FilterRequired);

        assert_eq!(s.ok.calls.load(Ordering::SeqCst), 0);
        assert_eq!(s.store.pending_requests().await, 0);
    }

    #[tokio::test]
    async fn test_timeout_and_panic_are_isolated() {
        let mut slow = Fixed::new("slow");
        slow.delay = Duration::from_secs(5);
        let s = setup(slow).await;
        let list = s
            .orchestrator
            .process("r5", &codes("A,S"), Some("unit:eq:'mg/l'"))
            .await
            .unwrap();
        assert_eq!(list.result.len(), 1);
        assert_eq!(list.errors.len(), 1);
        assert!(list.errors[0].starts_with("S (504)"));

        let mut broken = Fixed::new("slow");
        broken.panics = true;
        let s = setup(broken).await;
        let list = s
            .orchestrator
            .process("r6", &codes("S,B"), Some("unit:eq:'mg/l'"))
            .await
            .unwrap();
        assert_eq!(list.result.len(), 1);
        assert!(list.errors[0].starts_with("S (502)"));
        assert_eq!(s.store.pending_requests().await, 0);
    }

    #[tokio::test]
    async fn test_lists() {
        let s = setup(Fixed::new("slow")).await;
        let units = s.orchestrator.code_names(ListKind::Units, &codes("A,S")).await.unwrap();
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| u.code == "units"));

        assert!(s.orchestrator.measurement_objects(&codes("A")).await.unwrap().is_empty());
        let err = s.orchestrator.code_names(ListKind::Units, &[]).await.unwrap_err();
        assert_eq!(err.source_errors[0].error, SourceErrorType::Missing);
    }

    #[tokio::test]
    async fn test_sources_listing() {
        let s = setup(Fixed::new("slow")).await;
        let codes: Vec<String> = s.orchestrator.sources().into_iter().map(|s| s.code).collect();
        assert_eq!(codes, vec!["A", "B", "N", "S"]);
    }
}
