//! # Source Adapter Framework
//!
//! Every backend dialect the hub federates implements [`SourceAdapter`].
//! One adapter instance serves all sources of its plugin; the per-call
//! [`DataBody`] carries the source definition, the parsed conditions and the
//! capability set.
//!
//! An adapter never fails towards the orchestrator. Logon failures,
//! transport errors and backend problems all end up as `errors` plus
//! `http_status` on the [`MeasurementResponse`], or as the status half of a
//! list result.

pub mod dd_api;
pub mod dd_eco_api;
pub mod registry;
pub mod remote;
pub mod z_info;

use crate::auth::{apply_credentials, SourceLogon};
use capi_core::geo::{RdNewToWgs84, Reprojector};
use capi_core::translate::to_generic;
use capi_core::{
    DataBody, DataCategory, Map, Measurement, MeasurementObject, MeasurementResponse,
    SourceCodeName, SourceDefinition, Statistics,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on pages fetched for one native query.
pub const MAX_PAGES: usize = 10_000;

// =============================================================================
// Core Trait
// =============================================================================

/// Flat code lists every adapter can enumerate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Compartments,
    Parameters,
    Quantities,
    Units,
}

impl ListKind {
    pub const ALL: [ListKind; 4] = [
        ListKind::Compartments,
        ListKind::Parameters,
        ListKind::Quantities,
        ListKind::Units,
    ];

    pub fn category(self) -> DataCategory {
        match self {
            Self::Compartments => DataCategory::Compartment,
            Self::Parameters => DataCategory::Parameter,
            Self::Quantities => DataCategory::Quantity,
            Self::Units => DataCategory::Unit,
        }
    }

    /// Path segment used by the HTTP surface and by remote plugins.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compartments => "compartments",
            Self::Parameters => "parameters",
            Self::Quantities => "quantities",
            Self::Units => "units",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == raw)
    }
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Plugin code this adapter is registered under.
    fn code(&self) -> &str;

    /// Run the full logon, query, paginate, decode and filter cycle.
    async fn measurements(&self, body: &DataBody) -> MeasurementResponse;

    async fn code_names(&self, kind: ListKind, body: &DataBody) -> (u16, Vec<SourceCodeName>);

    async fn measurement_objects(&self, body: &DataBody) -> (u16, Vec<MeasurementObject>);
}

// =============================================================================
// Shared HTTP plumbing
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Missing {0} configuration section")]
    MissingSection(&'static str),
    #[error("Request exception: {0}")]
    Transport(#[from] reqwest::Error),
}

impl AdapterError {
    pub fn status(&self) -> u16 {
        match self {
            Self::MissingSection(_) => 501,
            Self::Transport(e) if e.is_timeout() => 504,
            Self::Transport(_) => 502,
        }
    }
}

pub fn is_auth_failure(status: u16) -> bool {
    status == 401 || status == 403
}

/// A fully read backend answer.
#[derive(Debug)]
pub struct Fetched {
    pub status: u16,
    pub body: String,
}

impl Fetched {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client, logon service and reprojector shared by all adapters.
#[derive(Clone)]
pub struct HttpContext {
    client: reqwest::Client,
    logon: Arc<SourceLogon>,
    reprojector: Arc<dyn Reprojector>,
}

impl HttpContext {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            logon: Arc::new(SourceLogon::new(client.clone())),
            client,
            reprojector: Arc::new(RdNewToWgs84),
        }
    }

    pub fn reprojector(&self) -> &dyn Reprojector {
        self.reprojector.as_ref()
    }

    /// Bearer token (if any) or the failing status.
    pub async fn logon(&self, source: &SourceDefinition) -> Result<Option<String>, u16> {
        match self.logon.authenticate(source).await {
            (200, token) => Ok(token),
            (status, _) => Err(status),
        }
    }

    pub async fn get(
        &self,
        source: &SourceDefinition,
        url: &str,
        query: &[(String, String)],
        token: Option<&str>,
        stats: &mut Statistics,
    ) -> Result<Fetched, AdapterError> {
        let request = apply_credentials(source, self.client.get(url).query(query), token);
        Self::send(request, stats).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        stats: &mut Statistics,
    ) -> Result<Fetched, AdapterError> {
        Self::send(self.client.post(url).json(body), stats).await
    }

    async fn send(request: reqwest::RequestBuilder, stats: &mut Statistics) -> Result<Fetched, AdapterError> {
        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        stats.response_time_ms += start.elapsed().as_millis() as u64;
        stats.number_of_requests += 1;
        stats.total_byte_count += body.len() as u64;
        Ok(Fetched { status, body })
    }
}

// =============================================================================
// Decoding helpers
// =============================================================================

/// Translate a backend value into the generic vocabulary and store it on the
/// property its (possibly remapped) category selects. Returns false when
/// the category has no typed property.
pub fn assign_property(measurement: &mut Measurement, maps: &[Map], category: DataCategory, raw: &str) -> bool {
    let (category, name) = to_generic(maps, category, raw);
    match category {
        DataCategory::Compartment => measurement.compartment = Some(name),
        DataCategory::Parameter => measurement.parameter = Some(name),
        DataCategory::Quantity => measurement.quantity = Some(name),
        DataCategory::Unit => measurement.unit = Some(name),
        DataCategory::MeasurementObject => measurement.measurement_object = Some(name),
        DataCategory::Value => match name.trim().parse::<f64>() {
            Ok(v) => measurement.value = Some(v),
            Err(_) => return false,
        },
        DataCategory::MeasurementDate => match capi_core::parser::value::parse_date_text(&name) {
            Some(d) => measurement.measurement_date = Some(d),
            None => return false,
        },
        DataCategory::Other => return false,
    }
    true
}

/// Deduplicated `(source, code, name)` entries for one list kind, in
/// first-seen order.
pub fn code_names_of(source: &str, kind: ListKind, entries: &[(DataCategory, String)]) -> Vec<SourceCodeName> {
    let mut seen = std::collections::HashSet::new();
    entries
        .iter()
        .filter(|(category, _)| *category == kind.category())
        .filter(|(_, name)| seen.insert(name.clone()))
        .map(|(_, name)| SourceCodeName::new(source, name, name))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_property_follows_translation() {
        let maps = vec![Map::new(
            DataCategory::Parameter,
            "T",
            DataCategory::Quantity,
            "temperature",
        )];
        let mut m = Measurement::new("A");
        assert!(assign_property(&mut m, &maps, DataCategory::Quantity, "temperature"));
        assert_eq!(m.parameter.as_deref(), Some("T"));
        assert!(m.quantity.is_none());

        assert!(assign_property(&mut m, &[], DataCategory::Value, "3.25"));
        assert_eq!(m.value, Some(3.25));
        assert!(!assign_property(&mut m, &[], DataCategory::Value, "n/a"));
        assert!(assign_property(&mut m, &[], DataCategory::MeasurementDate, "2024-03-01T10:00:00Z"));
        assert!(m.measurement_date.is_some());
        assert!(!assign_property(&mut m, &[], DataCategory::Other, "x"));
    }

    #[test]
    fn test_code_names_dedup_per_kind() {
        let entries = vec![
            (DataCategory::Unit, "mg/l".to_string()),
            (DataCategory::Quantity, "CONCTTE".to_string()),
            (DataCategory::Unit, "mg/l".to_string()),
            (DataCategory::Unit, "ug/l".to_string()),
        ];
        let units = code_names_of("A", ListKind::Units, &entries);
        assert_eq!(
            units,
            vec![SourceCodeName::new("A", "mg/l", "mg/l"), SourceCodeName::new("A", "ug/l", "ug/l")]
        );
        assert!(code_names_of("A", ListKind::Compartments, &entries).is_empty());
    }

    #[test]
    fn test_list_kind_paths() {
        for kind in ListKind::ALL {
            assert_eq!(ListKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ListKind::parse("measurementobjects"), None);
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(AdapterError::MissingSection("DD-API").status(), 501);
        assert!(is_auth_failure(403));
        assert!(!is_auth_failure(404));
    }
}
