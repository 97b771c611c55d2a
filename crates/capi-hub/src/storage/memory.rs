//! In-process response cache.

use super::{ResponseStore, StoreError};
use capi_core::MeasurementResponse;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryResponseStore {
    requests: RwLock<HashMap<String, HashMap<String, MeasurementResponse>>>,
}

impl MemoryResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests that still hold entries.
    #[cfg(test)]
    pub async fn pending_requests(&self) -> usize {
        self.requests.read().await.len()
    }
}

#[async_trait::async_trait]
impl ResponseStore for MemoryResponseStore {
    async fn put_response(
        &self,
        request_id: &str,
        source_code: &str,
        response: &MeasurementResponse,
    ) -> Result<(), StoreError> {
        let mut requests = self.requests.write().await;
        let slots = requests.entry(request_id.to_string()).or_default();
        if slots.contains_key(source_code) {
            return Err(StoreError::Duplicate {
                request_id: request_id.to_string(),
                source_code: source_code.to_string(),
            });
        }
        slots.insert(source_code.to_string(), response.clone());
        Ok(())
    }

    async fn get_all_responses(&self, request_id: &str) -> Result<Vec<MeasurementResponse>, StoreError> {
        let requests = self.requests.read().await;
        let mut responses: Vec<MeasurementResponse> = requests
            .get(request_id)
            .map(|slots| slots.values().cloned().collect())
            .unwrap_or_default();
        responses.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(responses)
    }

    async fn delete_all(&self, request_id: &str) -> Result<(), StoreError> {
        self.requests.write().await.remove(request_id);
        Ok(())
    }
}
