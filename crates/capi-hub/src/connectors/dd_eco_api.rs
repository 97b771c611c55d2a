//! # DD-ECO-API Adapter
//!
//! REST dialect that speaks the same `field:op:value;` filter language the
//! hub accepts, so conditions are pushed down almost verbatim: field names
//! are translated to the source vocabulary and values re-serialized.
//!
//! With `useCapabilities` the backend is asked which `(field, operator)`
//! pairs it can evaluate; the rest run through the residual filter.

use super::{
    assign_property, is_auth_failure, AdapterError, HttpContext, ListKind, SourceAdapter, MAX_PAGES,
};
use capi_core::filter::retain_matching;
use capi_core::geo::{needs_reprojection, point_in_degrees};
use capi_core::source::DdEcoApiConfigurationSection;
use capi_core::translate::{to_generic, to_source};
use capi_core::{
    CompareMethod, CompareValue, Condition, DataBody, Geometry, Measurement, MeasurementObject,
    MeasurementResponse, SourceCodeName, SourceDefinition,
};
use serde::Deserialize;
use serde_json::Value;

pub const PLUGIN_CODE: &str = "ddecoapi";

/// Property carrying the record's geometry.
const GEOGRAPHY_PROPERTY: &str = "measurementgeography";

// =============================================================================
// Wire models
// =============================================================================

#[derive(Deserialize)]
struct Links {
    next: Option<String>,
}

#[derive(Deserialize)]
struct ListResponse<T> {
    paging: Option<Links>,
    result: Option<Vec<T>>,
}

#[derive(Deserialize)]
struct CodeEntry {
    code: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct MeasurementObjectEntry {
    code: Option<String>,
    name: Option<String>,
    geography: Option<Value>,
}

/// Entry of `/measurements/filters`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Filter {
    field_name: String,
    comparer: String,
}

#[derive(Deserialize)]
struct Problem {
    title: Option<String>,
    status: Option<u16>,
}

// =============================================================================
// Filter string
// =============================================================================

/// Render one condition in the backend's filter syntax, including the
/// trailing separator.
fn render_condition(body: &DataBody, condition: &Condition) -> String {
    let category = body.connector_capabilities.category_for_field(&condition.field_name);
    let maps = body.maps();
    let (_, field) = to_source(maps, category, &condition.field_name);
    let translate = |v: &str| to_source(maps, category, v).1;
    let value = match &condition.value {
        CompareValue::String(s) => CompareValue::String(translate(s)),
        CompareValue::ArrayOfString(values) => {
            CompareValue::ArrayOfString(values.iter().map(|v| translate(v)).collect())
        }
        CompareValue::Date(d) => return format!("{}:{}:'{}';", field, condition.compare_method, d.format("%Y-%m-%d")),
        other => other.clone(),
    };
    format!("{}:{}:{};", field, condition.compare_method, value.to_filter_literal())
}

/// Split conditions into the filter string and the residual set.
fn partition(body: &DataBody, accepted: Option<&[(String, CompareMethod)]>) -> (String, Vec<Condition>) {
    let mut filter = String::new();
    let mut residual = Vec::new();
    for condition in &body.conditions {
        let pushable = accepted.map_or(true, |pairs| {
            pairs
                .iter()
                .any(|(field, method)| *field == condition.field_name && *method == condition.compare_method)
        });
        if pushable {
            filter.push_str(&render_condition(body, condition));
        } else {
            residual.push(condition.clone());
        }
    }
    (filter, residual)
}

// =============================================================================
// Decoding
// =============================================================================

fn geometry_of(value: &Value, adapter: &DdEcoApiAdapter) -> Option<Geometry> {
    let geometry: Geometry = match value {
        Value::String(text) => serde_json::from_str(text).ok()?,
        other => serde_json::from_value(other.clone()).ok()?,
    };
    Some(match geometry.as_point() {
        Some((x, y)) if needs_reprojection(x, y) => point_in_degrees(x, y, adapter.http.reprojector()),
        _ => geometry,
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// =============================================================================
// Adapter
// =============================================================================

pub struct DdEcoApiAdapter {
    http: HttpContext,
}

impl DdEcoApiAdapter {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }

    fn section<'a>(&self, body: &'a DataBody) -> Result<&'a DdEcoApiConfigurationSection, AdapterError> {
        body.source_definition
            .dd_eco_api_configuration_section
            .as_ref()
            .ok_or(AdapterError::MissingSection("DD-ECO-API"))
    }

    /// `(field, operator)` pairs the backend filters on natively. `None`
    /// means every condition is pushed down.
    async fn accepted_filters(
        &self,
        source: &SourceDefinition,
        section: &DdEcoApiConfigurationSection,
        token: Option<&str>,
        response: &mut MeasurementResponse,
    ) -> Option<Vec<(String, CompareMethod)>> {
        if !section.use_capabilities {
            return None;
        }
        let url = format!("{}/measurements/filters", source.base_url());
        let filters = match self.http.get(source, &url, &[], token, &mut response.statistics).await {
            Ok(fetched) if fetched.is_success() => {
                serde_json::from_str::<Vec<Filter>>(&fetched.body).unwrap_or_default()
            }
            Ok(fetched) => {
                tracing::warn!(source = %source.code, status = fetched.status, "Filter capabilities unavailable");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(source = %source.code, "Filter capabilities unavailable: {}", e);
                Vec::new()
            }
        };
        Some(
            filters
                .into_iter()
                .filter_map(|f| {
                    CompareMethod::parse(&f.comparer.to_ascii_lowercase())
                        .map(|method| (f.field_name.to_ascii_lowercase(), method))
                })
                .collect(),
        )
    }

    fn decode(&self, body: &DataBody, section: &DdEcoApiConfigurationSection, record: &Value) -> Option<Measurement> {
        let object = record.as_object()?;
        let maps = body.maps();
        let mut measurement = Measurement::new(body.source_code());

        for (name, value) in object {
            if name == GEOGRAPHY_PROPERTY {
                measurement.coordinate = geometry_of(value, self);
                continue;
            }
            let definition = section
                .field_definitions
                .iter()
                .find(|d| to_generic(maps, d.data_category, name).1 == d.field_name);
            let assigned = match (definition, scalar_text(value)) {
                (Some(d), Some(text)) => assign_property(&mut measurement, maps, d.data_category, &text),
                _ => false,
            };
            if !assigned && !value.is_null() {
                measurement.add_extra(name, value.clone());
            }
        }
        Some(measurement)
    }

    /// `{kind}` code list, paged until a short page.
    async fn paged_codes(&self, path: &str, body: &DataBody) -> (u16, Vec<SourceCodeName>) {
        let section = match self.section(body) {
            Ok(section) => section,
            Err(e) => return (e.status(), Vec::new()),
        };
        let source = &body.source_definition;
        let token = match self.http.logon(source).await {
            Ok(token) => token,
            Err(status) => return (status, Vec::new()),
        };
        let url = format!("{}/{}", source.base_url(), path);
        let mut stats = Default::default();
        let mut entries = Vec::new();

        for page in 1..=MAX_PAGES {
            let query = vec![
                ("page".to_string(), page.to_string()),
                ("pagesize".to_string(), section.page_size.to_string()),
                ("nocount".to_string(), "true".to_string()),
            ];
            let fetched = match self.http.get(source, &url, &query, token.as_deref(), &mut stats).await {
                Ok(fetched) => fetched,
                Err(e) => return (e.status(), Vec::new()),
            };
            if !fetched.is_success() {
                return (fetched.status, entries);
            }
            let Ok(data) = serde_json::from_str::<ListResponse<CodeEntry>>(&fetched.body) else {
                break;
            };
            let result = data.result.unwrap_or_default();
            let count = result.len();
            entries.extend(result.into_iter().map(|e| {
                SourceCodeName::new(
                    &source.code,
                    e.code.as_deref().unwrap_or_default(),
                    e.name.as_deref().unwrap_or_default(),
                )
            }));
            if count < section.page_size || count == 0 {
                break;
            }
        }
        (200, entries)
    }

    /// Parameters come from a single unpaged call.
    async fn parameters(&self, body: &DataBody) -> (u16, Vec<SourceCodeName>) {
        if let Err(e) = self.section(body) {
            return (e.status(), Vec::new());
        }
        let source = &body.source_definition;
        let token = match self.http.logon(source).await {
            Ok(token) => token,
            Err(status) => return (status, Vec::new()),
        };
        let url = format!("{}/parameters/minimal", source.base_url());
        let mut stats = Default::default();
        match self.http.get(source, &url, &[], token.as_deref(), &mut stats).await {
            Ok(fetched) if fetched.is_success() => {
                let result = serde_json::from_str::<ListResponse<CodeEntry>>(&fetched.body)
                    .ok()
                    .and_then(|r| r.result)
                    .unwrap_or_default();
                let entries = result
                    .into_iter()
                    .map(|e| {
                        SourceCodeName::new(
                            &source.code,
                            e.code.as_deref().unwrap_or_default(),
                            e.name.as_deref().unwrap_or_default(),
                        )
                    })
                    .collect();
                (200, entries)
            }
            Ok(fetched) => (fetched.status, Vec::new()),
            Err(e) => (e.status(), Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for DdEcoApiAdapter {
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
        if section.field_definitions.is_empty() && !section.use_capabilities {
            return failed(501, "No field definitions configured and capabilities disabled".to_string());
        }
        let token = match self.http.logon(source).await {
            Ok(token) => token,
            Err(status) => return failed(status, "Authentication failed".to_string()),
        };

        let mut response = MeasurementResponse::new(&source.code, &body.response_id);
        let accepted = self
            .accepted_filters(source, section, token.as_deref(), &mut response)
            .await;
        let (filter, residual) = partition(body, accepted.as_deref());
        tracing::debug!(source = %source.code, filter = %filter, residual = residual.len(), "DD-ECO-API query");

        let url = format!("{}/measurements", source.base_url());
        for page in 1..=MAX_PAGES {
            let mut query = Vec::with_capacity(3);
            if !filter.is_empty() {
                query.push(("filter".to_string(), filter.clone()));
            }
            query.push(("page".to_string(), page.to_string()));
            query.push(("pagesize".to_string(), section.page_size.to_string()));

            let fetched = match self
                .http
                .get(source, &url, &query, token.as_deref(), &mut response.statistics)
                .await
            {
                Ok(fetched) => fetched,
                Err(e) => {
                    tracing::warn!(source = %source.code, page, "DD-ECO-API request failed: {}", e);
                    response.http_status = e.status();
                    response.errors.push(e.to_string());
                    break;
                }
            };
            if is_auth_failure(fetched.status) {
                response.http_status = fetched.status;
                response.errors.push("Authentication failed".to_string());
                break;
            }
            if !fetched.is_success() {
                let problem = serde_json::from_str::<Problem>(&fetched.body).ok();
                let title = problem.as_ref().and_then(|p| p.title.clone());
                response
                    .errors
                    .push(title.unwrap_or_else(|| format!("Response: {}", fetched.body)));
                response.http_status = problem.and_then(|p| p.status).unwrap_or(fetched.status);
                break;
            }

            let Ok(data) = serde_json::from_str::<ListResponse<Value>>(&fetched.body) else {
                break;
            };
            let Some(records) = data.result else {
                break;
            };
            response
                .measurements
                .extend(records.iter().filter_map(|r| self.decode(body, section, r)));
            if data.paging.and_then(|p| p.next).map_or(true, |n| n.is_empty()) {
                break;
            }
        }

        retain_matching(&mut response.measurements, &residual, &body.connector_capabilities);
        tracing::info!(
            source = %source.code,
            measurements = response.measurements.len(),
            "DD-ECO-API request complete"
        );
        response
    }

    async fn code_names(&self, kind: ListKind, body: &DataBody) -> (u16, Vec<SourceCodeName>) {
        match kind {
            ListKind::Parameters => self.parameters(body).await,
            other => self.paged_codes(other.as_str(), body).await,
        }
    }

    async fn measurement_objects(&self, body: &DataBody) -> (u16, Vec<MeasurementObject>) {
        let section = match self.section(body) {
            Ok(section) => section,
            Err(e) => return (e.status(), Vec::new()),
        };
        let source = &body.source_definition;
        let token = match self.http.logon(source).await {
            Ok(token) => token,
            Err(status) => return (status, Vec::new()),
        };
        let url = format!("{}/measurementobjects", source.base_url());
        let mut stats = Default::default();
        let mut objects = Vec::new();

        for page in 1..=MAX_PAGES {
            let query = vec![
                ("page".to_string(), page.to_string()),
                ("pagesize".to_string(), section.page_size.to_string()),
            ];
            let fetched = match self.http.get(source, &url, &query, token.as_deref(), &mut stats).await {
                Ok(fetched) => fetched,
                Err(e) => return (e.status(), Vec::new()),
            };
            if !fetched.is_success() {
                return (fetched.status, objects);
            }
            let Ok(data) = serde_json::from_str::<ListResponse<MeasurementObjectEntry>>(&fetched.body) else {
                break;
            };
            let result = data.result.unwrap_or_default();
            let count = result.len();
            for entry in result {
                objects.push(MeasurementObject {
                    source: source.code.clone(),
                    code: entry.code.unwrap_or_default(),
                    name: entry.name.unwrap_or_default(),
                    geometry: entry.geography.as_ref().and_then(|g| geometry_of(g, self)),
                });
            }
            if count < section.page_size || count == 0 {
                break;
            }
        }
        (200, objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::testing::serve;
    use axum::extract::Query;
    use axum::{routing::get, Json, Router};
    use capi_core::source::FieldDefinition;
    use capi_core::{CapabilitySet, DataCategory, FilterParser, Map};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn body(url: &str, filter: &str, use_capabilities: bool) -> DataBody {
        let mut source = SourceDefinition::new("ECO", PLUGIN_CODE, url);
        source.dd_eco_api_configuration_section = Some(DdEcoApiConfigurationSection {
            field_definitions: vec![
                FieldDefinition { field_name: "parameter".into(), data_category: DataCategory::Parameter },
                FieldDefinition { field_name: "value".into(), data_category: DataCategory::Value },
                FieldDefinition { field_name: "measurementdate".into(), data_category: DataCategory::MeasurementDate },
                FieldDefinition { field_name: "measurementobject".into(), data_category: DataCategory::MeasurementObject },
            ],
            page_size: 2,
            use_capabilities,
        });
        source.map_data = vec![
            Map::new(DataCategory::Parameter, "parameter", DataCategory::Parameter, "taxon"),
            Map::new(DataCategory::Parameter, "Cu", DataCategory::Parameter, "copper"),
        ];
        let caps = CapabilitySet::builtin();
        let outcome = FilterParser::new(&caps).allow_empty(true).parse(Some(filter));
        assert!(outcome.is_valid(), "{:?}", outcome.errors);
        DataBody::new(source, outcome.conditions, "req-1", caps)
    }

    #[test]
    fn test_render_translates_field_and_value() {
        let b = body("http://eco", "parameter:in:['Cu','Zn'];value:gt:2.5;measurementdate:ge:'2024-03-01T10:00:00Z'", false);
        let (filter, residual) = partition(&b, None);
        assert_eq!(
            filter,
            "taxon:in:['copper','Zn'];value:gt:2.5;measurementdate:ge:'2024-03-01';"
        );
        assert!(residual.is_empty());
    }

    #[test]
    fn test_partition_respects_accepted_pairs() {
        let b = body("http://eco", "parameter:eq:'Cu';value:gt:2.5", true);
        let accepted = vec![("parameter".to_string(), CompareMethod::Eq)];
        let (filter, residual) = partition(&b, Some(accepted.as_slice()));
        assert_eq!(filter, "taxon:eq:'copper';");
        assert_eq!(residual.len(), 1);
        assert_eq!(residual[0].field_name, "value");
    }

    #[tokio::test]
    async fn test_measurements_decode_and_residual() {
        let seen: Arc<Mutex<Vec<HashMap<String, String>>>> = Arc::default();
        let log = seen.clone();
        let router = Router::new()
            .route(
                "/measurements/filters",
                get(|| async { Json(json!([{ "fieldName": "parameter", "comparer": "Eq" }])) }),
            )
            .route(
                "/measurements",
                get(move |Query(q): Query<HashMap<String, String>>| {
                    let log = log.clone();
                    async move {
                        let page = q.get("page").cloned().unwrap_or_default();
                        log.lock().unwrap().push(q);
                        if page == "1" {
                            Json(json!({
                                "paging": { "next": "/measurements?page=2" },
                                "result": [
                                    { "taxon": "copper", "value": 1.0, "measurementdate": "2024-01-02T00:00:00Z", "measurementobject": "NL01", "quality": "00",
                                      "measurementgeography": { "type": "Point", "coordinates": [5.1, 52.1] } },
                                    { "taxon": "copper", "value": 4.0, "measurementobject": "NL02", "remark": null }
                                ]
                            }))
                        } else {
                            Json(json!({ "paging": { "next": "" }, "result": [ { "taxon": "copper", "value": 9.5 } ] }))
                        }
                    }
                }),
            );
        let url = serve(router).await;
        let adapter = DdEcoApiAdapter::new(HttpContext::with_client(reqwest::Client::new()));
        let response = adapter
            .measurements(&body(&url, "parameter:eq:'Cu';value:gt:2", true))
            .await;

        assert_eq!(response.http_status, 200, "{:?}", response.errors);
        let values: Vec<f64> = response.measurements.iter().filter_map(|m| m.value).collect();
        assert_eq!(values, vec![4.0, 9.5]);
        assert_eq!(response.measurements[0].parameter.as_deref(), Some("Cu"));
        assert_eq!(response.measurements[0].measurement_object.as_deref(), Some("NL02"));
        assert!(response.measurements[0].additional_data.is_none());
        assert_eq!(response.statistics.number_of_requests, 3);

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].get("filter").map(String::as_str), Some("taxon:eq:'copper';"));
        assert_eq!(requests[0].get("pagesize").map(String::as_str), Some("2"));
    }

    #[tokio::test]
    async fn test_unknown_properties_become_additional_data() {
        let b = body("http://eco", "", false);
        let adapter = DdEcoApiAdapter::new(HttpContext::with_client(reqwest::Client::new()));
        let section = b.source_definition.dd_eco_api_configuration_section.clone().unwrap();
        let record = json!({
            "taxon": "copper",
            "quality": "00",
            "measurementgeography": "{\"type\":\"Point\",\"coordinates\":[155000.0,463000.0]}"
        });
        let m = adapter.decode(&b, &section, &record).unwrap();
        assert_eq!(m.parameter.as_deref(), Some("Cu"));
        assert_eq!(m.additional_data.unwrap()["quality"], "00");
        let (lon, lat) = m.coordinate.unwrap().as_point().unwrap();
        assert!((lon - 5.387).abs() < 0.001 && (lat - 52.155).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_code_lists() {
        let router = Router::new()
            .route(
                "/units",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    assert_eq!(q.get("nocount").map(String::as_str), Some("true"));
                    let result = if q.get("page").map(String::as_str) == Some("1") {
                        json!([{ "code": "mg/l", "name": "milligram" }, { "code": "ug/l", "name": "microgram" }])
                    } else {
                        json!([])
                    };
                    Json(json!({ "result": result }))
                }),
            )
            .route(
                "/parameters/minimal",
                get(|| async { Json(json!({ "result": [{ "code": "Cu", "name": "koper", "taxontype": null }] })) }),
            )
            .route(
                "/measurementobjects",
                get(|| async {
                    Json(json!({ "result": [{ "code": "NL01", "name": "Lobith", "geography": { "type": "Point", "coordinates": [6.1, 51.8] } }] }))
                }),
            );
        let url = serve(router).await;
        let adapter = DdEcoApiAdapter::new(HttpContext::with_client(reqwest::Client::new()));
        let b = body(&url, "", false);

        let (status, units) = adapter.code_names(ListKind::Units, &b).await;
        assert_eq!(status, 200);
        assert_eq!(units[1], SourceCodeName::new("ECO", "ug/l", "microgram"));
        let (_, parameters) = adapter.code_names(ListKind::Parameters, &b).await;
        assert_eq!(parameters, vec![SourceCodeName::new("ECO", "Cu", "koper")]);
        let (_, objects) = adapter.measurement_objects(&b).await;
        assert_eq!(objects[0].geometry, Some(Geometry::point(6.1, 51.8)));
    }

    #[tokio::test]
    async fn test_missing_definitions_without_capabilities() {
        let mut b = body("http://127.0.0.1:9", "", false);
        b.source_definition
            .dd_eco_api_configuration_section
            .as_mut()
            .unwrap()
            .field_definitions
            .clear();
        let adapter = DdEcoApiAdapter::new(HttpContext::with_client(reqwest::Client::new()));
        assert_eq!(adapter.measurements(&b).await.http_status, 501);
        b.source_definition.dd_eco_api_configuration_section = None;
        assert_eq!(adapter.code_names(ListKind::Units, &b).await.0, 501);
    }

    #[tokio::test]
    async fn test_auth_failure_is_reported() {
        let router = Router::new().route("/measurements", get(|| async { axum::http::StatusCode::FORBIDDEN }));
        let url = serve(router).await;
        let adapter = DdEcoApiAdapter::new(HttpContext::with_client(reqwest::Client::new()));
        let response = adapter.measurements(&body(&url, "parameter:eq:'Cu'", false)).await;
        assert_eq!(response.http_status, 403);
        assert_eq!(response.errors, vec!["Authentication failed".to_string()]);
        assert!(response.measurements.is_empty());
        assert_eq!(response.statistics.number_of_requests, 1);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_recorded() {
        let adapter = DdEcoApiAdapter::new(HttpContext::with_client(reqwest::Client::new()));
        let response = adapter.measurements(&body("http://127.0.0.1:9", "parameter:eq:'Cu'", false)).await;
        assert_eq!(response.http_status, 502);
        assert_eq!(response.errors.len(), 1);
        assert!(response.measurements.is_empty());
    }
}
