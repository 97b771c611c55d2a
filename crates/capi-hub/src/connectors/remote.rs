//! # Remote Plugin Adapter
//!
//! Forwards the [`DataBody`] of any non-built-in plugin to the plugin's own
//! HTTP host. The host answers with the same wire models the built-in
//! adapters produce, so decoding is a plain JSON read.

use super::{HttpContext, ListKind, SourceAdapter};
use capi_core::{DataBody, MeasurementObject, MeasurementResponse, Plugin, SourceCodeName, Statistics};
use serde::de::DeserializeOwned;

pub struct RemoteAdapter {
    code: String,
    base_url: String,
    http: HttpContext,
}

impl RemoteAdapter {
    pub fn new(plugin: &Plugin, http: HttpContext) -> Self {
        Self {
            code: plugin.code.clone(),
            base_url: plugin.url.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// POST the body to `{url}/{operation}` and decode the answer.
    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        body: &DataBody,
        stats: &mut Statistics,
    ) -> Result<T, (u16, String)> {
        let url = format!("{}/{}", self.base_url, operation);
        let fetched = self
            .http
            .post_json(&url, body, stats)
            .await
            .map_err(|e| (e.status(), e.to_string()))?;
        if !fetched.is_success() {
            return Err((fetched.status, format!("Plugin {} answered {}", self.code, fetched.status)));
        }
        serde_json::from_str(&fetched.body)
            .map_err(|e| (502, format!("Plugin {} sent an unreadable answer: {}", self.code, e)))
    }
}

#[async_trait::async_trait]
impl SourceAdapter for RemoteAdapter {
    fn code(&self) -> &str {
        &self.code
    }

    async fn measurements(&self, body: &DataBody) -> MeasurementResponse {
        let mut stats = Statistics {
            source: body.source_code().to_string(),
            ..Default::default()
        };
        match self.call::<MeasurementResponse>("measurements", body, &mut stats).await {
            Ok(mut response) => {
                response.statistics.number_of_requests += stats.number_of_requests;
                response.statistics.source = body.source_code().to_string();
                response.source = body.source_code().to_string();
                response.request_id = body.response_id.clone();
                response
            }
            Err((status, error)) => {
                tracing::warn!(plugin = %self.code, source = %body.source_code(), status, "{}", error);
                let mut response =
                    MeasurementResponse::failed(body.source_code(), &body.response_id, status, error);
                response.statistics = stats;
                response
            }
        }
    }

    async fn code_names(&self, kind: ListKind, body: &DataBody) -> (u16, Vec<SourceCodeName>) {
        let mut stats = Statistics::default();
        match self.call(kind.as_str(), body, &mut stats).await {
            Ok(entries) => (200, entries),
            Err((status, error)) => {
                tracing::warn!(plugin = %self.code, list = %kind, status, "{}", error);
                (status, Vec::new())
            }
        }
    }

    async fn measurement_objects(&self, body: &DataBody) -> (u16, Vec<MeasurementObject>) {
        let mut stats = Statistics::default();
        match self.call("measurementobjects", body, &mut stats).await {
            Ok(objects) => (200, objects),
            Err((status, error)) => {
                tracing::warn!(plugin = %self.code, status, "{}", error);
                (status, Vec::new())
            }
        }
    }
}
