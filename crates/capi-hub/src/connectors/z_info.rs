//! # Z-Info Adapter
//!
//! Legacy query-string dialect. A measurement request is a stored query
//! (`SPCID`) plus a `vraag` argument of positional `$name$=value` segments:
//!
//! ```text
//! ?SPCID=meetwaarden&vraag=$par$=Cu;$ist$=*;$begindatum$=2024-01-01
//! ```
//!
//! Every required parameter defaults to `*`. Wildcards express contains,
//! prefix and suffix, `|` separates alternatives. There is no paging.

use super::{assign_property, is_auth_failure, AdapterError, HttpContext, ListKind, SourceAdapter};
use capi_core::filter::retain_matching;
use capi_core::source::{EndPointFieldNameDescriptionName, ZInfoConfigurationSection};
use capi_core::translate::to_source;
use capi_core::{
    CompareMethod, Condition, DataBody, DataCategory, Measurement, MeasurementObject,
    MeasurementResponse, SourceCodeName, SourceDefinition,
};
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value};
use std::collections::HashSet;

pub const PLUGIN_CODE: &str = "zinfo";

const WILDCARD: &str = "*";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Deserialize)]
struct Answer {
    #[serde(default)]
    waarden: Vec<JsonMap<String, Value>>,
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// =============================================================================
// Query building
// =============================================================================

/// Ordered `$name$=value` segments. A segment carries at most one
/// condition; defaults may be replaced, pushed values may not.
#[derive(Debug, Default, PartialEq)]
struct Vraag {
    segments: Vec<(String, String)>,
    pushed: HashSet<String>,
}

impl Vraag {
    fn set(&mut self, name: &str, value: String) {
        match self.segments.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value,
            None => self.segments.push((name.to_string(), value)),
        }
    }

    fn is_free(&self, name: &str) -> bool {
        !self.pushed.contains(name)
    }

    /// Sets `name` unless an earlier condition already holds it.
    fn push(&mut self, name: &str, value: String) -> bool {
        if !self.is_free(name) {
            return false;
        }
        self.set(name, value);
        self.pushed.insert(name.to_string());
        true
    }

    fn render(&self) -> String {
        self.segments
            .iter()
            .map(|(k, v)| format!("${}$={}", k, v))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Glob for a string operator, or `None` when the dialect cannot express it.
fn glob(method: CompareMethod, condition: &Condition, translate: impl Fn(&str) -> String) -> Option<String> {
    match method {
        CompareMethod::Eq => condition.as_str().map(&translate),
        CompareMethod::Like => condition.as_str().map(|v| format!("*{}*", translate(v))),
        CompareMethod::StartsWith => condition.as_str().map(|v| format!("{}*", translate(v))),
        CompareMethod::EndsWith => condition.as_str().map(|v| format!("*{}", translate(v))),
        CompareMethod::In => condition
            .as_string_array()
            .map(|values| values.iter().map(|v| translate(v.as_str())).collect::<Vec<_>>().join("|")),
        _ => None,
    }
}

fn native_parameter<'a>(section: &'a ZInfoConfigurationSection, field: &str, category: DataCategory) -> Option<&'a str> {
    section
        .input_parameter_map
        .iter()
        .find(|e| e.capi_name == field || e.data_category == category)
        .and_then(|e| e.z_info_name.first())
        .map(String::as_str)
}

/// The `vraag` argument and the conditions left for the residual filter.
fn build_query(body: &DataBody, section: &ZInfoConfigurationSection) -> (Vraag, Vec<Condition>) {
    let capabilities = &body.connector_capabilities;
    let mut vraag = Vraag::default();
    for name in &section.z_info_required_query_parameters {
        vraag.set(name, WILDCARD.to_string());
    }
    let mut residual = Vec::new();

    for condition in &body.conditions {
        let field = condition.field_name.as_str();
        let category = capabilities.category_for_field(field);
        let method = condition.compare_method;
        let pushed = match category {
            DataCategory::Compartment | DataCategory::Parameter | DataCategory::Quantity | DataCategory::Unit => {
                let translate = |v: &str| to_source(body.maps(), category, v).1;
                match (native_parameter(section, field, category), glob(method, condition, translate)) {
                    (Some(parameter), Some(value)) => vraag.push(parameter, value),
                    _ => false,
                }
            }
            DataCategory::MeasurementObject if method == CompareMethod::Eq => {
                match condition.as_str().and_then(|v| v.split_once('_')) {
                    Some((ist, dps)) if vraag.is_free("ist") && vraag.is_free("dps") => {
                        vraag.push("ist", ist.to_string());
                        vraag.push("dps", dps.to_string());
                        true
                    }
                    _ => false,
                }
            }
            DataCategory::MeasurementDate => {
                let day = condition.as_date().map(|d| d.format(DATE_FORMAT).to_string());
                let (start, end) = (&section.start_date_parameter, &section.end_date_parameter);
                match (method, day) {
                    (CompareMethod::Eq, Some(day))
                        if !start.is_empty() && !end.is_empty() && vraag.is_free(start) && vraag.is_free(end) =>
                    {
                        vraag.push(start, day.clone());
                        vraag.push(end, day);
                        true
                    }
                    (CompareMethod::Ge, Some(day)) if !start.is_empty() => vraag.push(start, day),
                    (CompareMethod::Le, Some(day)) if !end.is_empty() => vraag.push(end, day),
                    // Bounds are inclusive natively; exclusive ones are also re-checked.
                    (CompareMethod::Gt, Some(day)) if !start.is_empty() => {
                        vraag.push(start, day);
                        false
                    }
                    (CompareMethod::Lt, Some(day)) if !end.is_empty() => {
                        vraag.push(end, day);
                        false
                    }
                    _ => false,
                }
            }
            _ => false,
        };
        if !pushed {
            residual.push(condition.clone());
        }
    }
    (vraag, residual)
}

// =============================================================================
// Adapter
// =============================================================================

pub struct ZInfoAdapter {
    http: HttpContext,
}

impl ZInfoAdapter {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }

    fn section<'a>(&self, body: &'a DataBody) -> Result<&'a ZInfoConfigurationSection, AdapterError> {
        body.source_definition
            .z_info_configuration_section
            .as_ref()
            .ok_or(AdapterError::MissingSection("Z-Info"))
    }

    fn decode(&self, body: &DataBody, section: &ZInfoConfigurationSection, record: &JsonMap<String, Value>) -> Measurement {
        let maps = body.maps();
        let mut measurement = Measurement::new(body.source_code());
        for (name, value) in record {
            let entry = section
                .input_parameter_map
                .iter()
                .filter(|e| e.data_category != DataCategory::Other)
                .find(|e| e.z_info_name.iter().any(|n| n == name));
            let assigned = match (entry, text(Some(value))) {
                (Some(e), Some(raw)) => assign_property(&mut measurement, maps, e.data_category, &raw),
                _ => false,
            };
            if !assigned && !value.is_null() {
                measurement.add_extra(name, value.clone());
            }
        }
        let ist = text(record.get("ist"));
        let dps = text(record.get("dps"));
        if ist.is_some() || dps.is_some() {
            measurement.measurement_object = Some(format!(
                "{}_{}",
                ist.unwrap_or_default(),
                dps.unwrap_or_default()
            ));
        }
        measurement
    }

    /// Rows of one stored query.
    async fn fetch_rows(
        &self,
        source: &SourceDefinition,
        end_point: &str,
    ) -> Result<Vec<JsonMap<String, Value>>, u16> {
        let token = self.http.logon(source).await?;
        let query = vec![("SPCID".to_string(), end_point.to_string())];
        let mut stats = Default::default();
        let fetched = self
            .http
            .get(source, source.base_url(), &query, token.as_deref(), &mut stats)
            .await
            .map_err(|e| e.status())?;
        if !fetched.is_success() {
            return Err(fetched.status);
        }
        Ok(serde_json::from_str::<Answer>(&fetched.body)
            .map(|a| a.waarden)
            .unwrap_or_default())
    }

    fn list_request<'a>(
        section: &'a ZInfoConfigurationSection,
        kind: ListKind,
    ) -> Option<&'a EndPointFieldNameDescriptionName> {
        match kind {
            ListKind::Compartments => section.compartment_request.as_ref(),
            ListKind::Parameters => section.parameter_request.as_ref(),
            ListKind::Quantities => section.quantity_request.as_ref(),
            ListKind::Units => section.unit_request.as_ref(),
        }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for ZInfoAdapter {
    fn code(&self) -> &str {
        PLUGIN_CODE
    }

    async fn measurements(&self, body: &DataBody) -> MeasurementResponse {
        let source = &body.source_definition;
        let failed = |status: u16, error: String| MeasurementResponse::failed(&source.code, &body.response_id, status, error);
        let section = match self.section(body) {
            Ok(section) => section,
            Err(e) => return failed(e.status(), e.to_string()),
        };
        let Some(stored_query) = section.measurement_request.as_deref() else {
            return failed(501, "Missing Z-Info measurement request".to_string());
        };
        let token = match self.http.logon(source).await {
            Ok(token) => token,
            Err(status) => return failed(status, "Authentication failed".to_string()),
        };

        let (vraag, residual) = build_query(body, section);
        let query = vec![
            ("SPCID".to_string(), stored_query.to_string()),
            ("vraag".to_string(), vraag.render()),
        ];
        tracing::debug!(source = %source.code, vraag = %vraag.render(), "Z-Info query");

        let mut response = MeasurementResponse::new(&source.code, &body.response_id);
        match self
            .http
            .get(source, source.base_url(), &query, token.as_deref(), &mut response.statistics)
            .await
        {
            Ok(fetched) if is_auth_failure(fetched.status) => {
                response.http_status = fetched.status;
                response.errors.push("Authentication failed".to_string());
            }
            Ok(fetched) if !fetched.is_success() => {
                response.http_status = fetched.status;
                response.errors.push(format!("HTTP {}", fetched.status));
            }
            Ok(fetched) => {
                if let Ok(answer) = serde_json::from_str::<Answer>(&fetched.body) {
                    response
                        .measurements
                        .extend(answer.waarden.iter().map(|r| self.decode(body, section, r)));
                }
            }
            Err(e) => {
                tracing::warn!(source = %source.code, "Z-Info request failed: {}", e);
                response.http_status = e.status();
                response.errors.push(e.to_string());
            }
        }

        retain_matching(&mut response.measurements, &residual, &body.connector_capabilities);
        tracing::info!(
            source = %source.code,
            measurements = response.measurements.len(),
            "Z-Info request complete"
        );
        response
    }

    async fn code_names(&self, kind: ListKind, body: &DataBody) -> (u16, Vec<SourceCodeName>) {
        let Some(request) = body
            .source_definition
            .z_info_configuration_section
            .as_ref()
            .and_then(|s| Self::list_request(s, kind))
        else {
            return (200, Vec::new());
        };
        let source = &body.source_definition;
        match self.fetch_rows(source, &request.end_point).await {
            Ok(rows) => {
                let entries = rows
                    .iter()
                    .map(|row| {
                        SourceCodeName::new(
                            &source.code,
                            &text(row.get(&request.field_name)).unwrap_or_default(),
                            &text(row.get(&request.description_name)).unwrap_or_default(),
                        )
                    })
                    .collect();
                (200, entries)
            }
            Err(status) => (status, Vec::new()),
        }
    }

    async fn measurement_objects(&self, body: &DataBody) -> (u16, Vec<MeasurementObject>) {
        let Some(request) = body
            .source_definition
            .z_info_configuration_section
            .as_ref()
            .and_then(|s| s.measurement_object_request.as_ref())
        else {
            return (200, Vec::new());
        };
        let source = &body.source_definition;
        match self.fetch_rows(source, &request.end_point).await {
            Ok(rows) => {
                let objects = rows
                    .iter()
                    .map(|row| {
                        let dps = text(row.get("dps")).unwrap_or_default();
                        let ist = text(row.get("ist")).unwrap_or_default();
                        let description = text(row.get("dpsOmschr")).unwrap_or_default();
                        MeasurementObject {
                            source: source.code.clone(),
                            code: format!("{}_{}", dps, ist),
                            name: format!("{}_{}_{}", dps, ist, description),
                            geometry: None,
                        }
                    })
                    .collect();
                (200, objects)
            }
            Err(status) => (status, Vec::new()),
        }
    }
}
