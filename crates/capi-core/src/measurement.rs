//! # Measurement Models
//!
//! The canonical record every source is decoded into, the per-source
//! response that travels between adapter and orchestrator, and the
//! envelopes returned to callers.

use crate::parser::ParserError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

/// GeoJSON-style geometry. Only points carry a usable coordinate for
/// spatial filtering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: vec![x, y],
        }
    }

    /// `(x, y)` when this is a point with at least two ordinates.
    pub fn as_point(&self) -> Option<(f64, f64)> {
        if !self.kind.eq_ignore_ascii_case("point") {
            return None;
        }
        match self.coordinates.as_slice() {
            [x, y, ..] => Some((*x, *y)),
            _ => None,
        }
    }
}

/// One decoded measurement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compartment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_date: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_object: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Geometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<JsonMap<String, Value>>,
}

impl Measurement {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Default::default()
        }
    }

    /// Store an unrecognized backend property verbatim.
    pub fn add_extra(&mut self, key: &str, value: Value) {
        self.additional_data
            .get_or_insert_with(JsonMap::new)
            .insert(key.to_string(), value);
    }
}

/// Cost of serving one source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub source: String,
    #[serde(rename = "responseTimeInMilliSeconds")]
    pub response_time_ms: u64,
    pub total_byte_count: u64,
    pub number_of_requests: u64,
}

/// Everything one adapter produced for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementResponse {
    pub source: String,
    pub request_id: String,
    #[serde(default)]
    pub measurements: Vec<Measurement>,
    #[serde(default)]
    pub statistics: Statistics,
    #[serde(default)]
    pub errors: Vec<String>,
    pub http_status: u16,
}

impl MeasurementResponse {
    pub fn new(source: &str, request_id: &str) -> Self {
        Self {
            source: source.to_string(),
            request_id: request_id.to_string(),
            statistics: Statistics {
                source: source.to_string(),
                ..Default::default()
            },
            http_status: 200,
            ..Default::default()
        }
    }

    /// A response carrying only a failure.
    pub fn failed(source: &str, request_id: &str, http_status: u16, error: impl Into<String>) -> Self {
        let mut response = Self::new(source, request_id);
        response.http_status = http_status;
        response.errors.push(error.into());
        response
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status)
    }
}

/// Aggregate returned for a measurement query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementList {
    pub result: Vec<Measurement>,
    pub statistics: Vec<Statistics>,
    /// Per-source failures, prefixed with the source code.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl MeasurementList {
    /// Concatenate per-source responses. Order across sources is not defined.
    pub fn from_responses(responses: Vec<MeasurementResponse>) -> Self {
        let mut list = Self::default();
        for response in responses {
            list.errors.extend(
                response
                    .errors
                    .iter()
                    .map(|e| format!("{} ({}): {}", response.source, response.http_status, e)),
            );
            list.statistics.push(response.statistics);
            list.result.extend(response.measurements);
        }
        list
    }
}

/// Entry of a list operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceCodeName {
    pub source: String,
    pub code: String,
    pub name: String,
}

impl SourceCodeName {
    pub fn new(source: &str, code: &str, name: &str) -> Self {
        Self {
            source: source.to_string(),
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

/// A measurement location.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MeasurementObject {
    pub source: String,
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
}

/// What was wrong with a requested source code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SourceErrorType {
    Unknown,
    Duplicate,
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceError {
    pub source: String,
    pub error: SourceErrorType,
}

/// Rejection envelope for a request that failed validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub source_errors: Vec<SourceError>,
    pub request_error: Vec<ParserError>,
}

impl ErrorResponse {
    pub fn is_empty(&self) -> bool {
        self.source_errors.is_empty() && self.request_error.is_empty()
    }

    pub fn source(&mut self, source: &str, error: SourceErrorType) {
        self.source_errors.push(SourceError {
            source: source.to_string(),
            error,
        });
    }
}
