//! # File-backed Response Cache
//!
//! One JSON document per slot at `<root>/results/<request id>/<source>.json`.
//! Path components are escaped so a code can never leave its directory and
//! two codes never share a file.

use super::{ResponseStore, StoreError};
use capi_core::MeasurementResponse;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub struct JsonResponseStore {
    root: PathBuf,
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9.-]").unwrap())
}

/// Escape every byte outside `[A-Za-z0-9.-]` as `_XX`, plus a leading dot.
/// `_` itself is escaped, so distinct codes never share a file name.
fn sanitize(component: &str) -> String {
    let escaped = unsafe_chars().replace_all(component, |caps: &Captures| {
        caps[0].bytes().map(|b| format!("_{:02X}", b)).collect::<String>()
    });
    match escaped.strip_prefix('.') {
        Some(rest) => format!("_2E{}", rest),
        None if escaped.is_empty() => "_".to_string(),
        None => escaped.into_owned(),
    }
}

impl JsonResponseStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join("results"),
        }
    }

    fn request_dir(&self, request_id: &str) -> PathBuf {
        self.root.join(sanitize(request_id))
    }
}

#[async_trait::async_trait]
impl ResponseStore for JsonResponseStore {
    async fn put_response(
        &self,
        request_id: &str,
        source_code: &str,
        response: &MeasurementResponse,
    ) -> Result<(), StoreError> {
        let dir = self.request_dir(request_id);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.json", sanitize(source_code)));
        if tokio::fs::try_exists(&path).await? {
            return Err(StoreError::Duplicate {
                request_id: request_id.to_string(),
                source_code: source_code.to_string(),
            });
        }
        let body = serde_json::to_vec(response)?;
        tokio::fs::write(&path, body).await?;
        Ok(())
    }

    async fn get_all_responses(&self, request_id: &str) -> Result<Vec<MeasurementResponse>, StoreError> {
        let dir = self.request_dir(request_id);
        if !tokio::fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut responses = Vec::with_capacity(paths.len());
        for path in paths {
            let body = tokio::fs::read(&path).await?;
            responses.push(serde_json::from_slice(&body)?);
        }
        Ok(responses)
    }

    async fn delete_all(&self, request_id: &str) -> Result<(), StoreError> {
        let dir = self.request_dir(request_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
