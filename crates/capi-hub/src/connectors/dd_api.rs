//! # DD-API Adapter
//!
//! REST dialect that only understands equality filters on a handful of
//! query parameters. Everything else is evaluated on the decoded records.
//!
//! - `eq` on a category with a native filter becomes `name=value`, provided
//!   the source lists that filter in `supportedQueryParameters`;
//! - the first pushable `in` condition fans out into one query per value;
//! - measurement-date bounds become `startTime` / `endTime`;
//! - pages are followed through `paging.next`.

use super::{
    assign_property, code_names_of, is_auth_failure, AdapterError, HttpContext, ListKind,
    SourceAdapter, MAX_PAGES,
};
use capi_core::filter::retain_matching;
use capi_core::geo::{needs_reprojection, point_in_degrees};
use capi_core::source::DdApiConfigurationSection;
use capi_core::translate::to_source;
use capi_core::{
    CompareMethod, Condition, DataBody, DataCategory, DataType, Geometry, Measurement,
    MeasurementObject, MeasurementResponse, SourceCodeName,
};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

pub const PLUGIN_CODE: &str = "ddapi";

// =============================================================================
// Wire models
// =============================================================================

#[derive(Deserialize)]
struct Paging {
    next: Option<String>,
}

fn has_next(paging: &Option<Paging>) -> bool {
    paging
        .as_ref()
        .and_then(|p| p.next.as_deref())
        .map_or(false, |n| !n.is_empty())
}

#[derive(Deserialize)]
struct TimeSeriesResponse {
    paging: Option<Paging>,
    results: Option<Vec<TimeSeries>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeSeries {
    location: Option<Location>,
    observation_type: Option<ObservationType>,
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Deserialize)]
struct Location {
    geometry: Option<Value>,
    properties: Option<LocationProperties>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationProperties {
    location_id: Option<String>,
    location_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationType {
    quantity: Option<String>,
    unit: Option<String>,
    compartment: Option<String>,
    parameter_code: Option<String>,
}

#[derive(Deserialize)]
struct Event {
    timestamp: Option<DateTime<FixedOffset>>,
    value: Option<f64>,
}

#[derive(Deserialize)]
struct ObservationTypeResponse {
    paging: Option<Paging>,
    results: Option<Vec<ObservationType>>,
}

#[derive(Deserialize)]
struct LocationResponse {
    results: Option<Vec<Location>>,
}

/// RFC 7807 body returned on failures.
#[derive(Deserialize)]
struct Problem {
    title: Option<String>,
    status: Option<u16>,
}

// =============================================================================
// Query planning
// =============================================================================

fn native_filter(category: DataCategory) -> Option<&'static str> {
    match category {
        DataCategory::MeasurementObject => Some("locationCode"),
        DataCategory::Parameter => Some("parameterCode"),
        DataCategory::Quantity => Some("quantityName"),
        DataCategory::Unit => Some("unit"),
        _ => None,
    }
}

type Query = Vec<(String, String)>;

/// Native queries to run, plus the conditions left for the residual filter.
#[derive(Debug, PartialEq)]
struct QueryPlan {
    queries: Vec<Query>,
    residual: Vec<Condition>,
}

fn plan(body: &DataBody, section: &DdApiConfigurationSection) -> QueryPlan {
    let capabilities = &body.connector_capabilities;
    let native = |field: &str, value: &str| -> Option<(String, String)> {
        let category = capabilities.category_for_field(field);
        let (category, name) = to_source(body.maps(), category, value);
        let filter = native_filter(category)?;
        section
            .supported_query_parameters
            .iter()
            .any(|p| p == filter)
            .then(|| (filter.to_string(), name))
    };

    let mut base = Query::new();
    let mut expansion: Option<Vec<(String, String)>> = None;
    let mut residual = Vec::new();
    // A native key carries one condition; later ones on the same key stay residual.
    let mut taken: HashSet<String> = HashSet::new();

    for condition in &body.conditions {
        let field = condition.field_name.as_str();
        let pushed = match condition.compare_method {
            CompareMethod::Eq if condition.data_type() == DataType::String => {
                match condition.as_str().and_then(|v| native(field, v)) {
                    Some(pair) if taken.insert(pair.0.clone()) => {
                        base.push(pair);
                        true
                    }
                    _ => false,
                }
            }
            CompareMethod::In if expansion.is_none() => {
                let pairs: Option<Vec<_>> = condition
                    .as_string_array()
                    .unwrap_or_default()
                    .iter()
                    .map(|v| native(field, v))
                    .collect();
                match pairs {
                    Some(pairs) if !pairs.is_empty() && pairs.iter().all(|(k, _)| !taken.contains(k)) => {
                        taken.extend(pairs.iter().map(|(k, _)| k.clone()));
                        expansion = Some(pairs);
                        true
                    }
                    _ => false,
                }
            }
            method @ (CompareMethod::Ge | CompareMethod::Gt | CompareMethod::Le | CompareMethod::Lt)
                if capabilities.category_for_field(field) == DataCategory::MeasurementDate =>
            {
                let key = match method {
                    CompareMethod::Ge | CompareMethod::Gt => "startTime",
                    _ => "endTime",
                };
                match condition.as_date() {
                    Some(d) if taken.insert(key.to_string()) => {
                        base.push((key.to_string(), d.to_rfc3339_opts(SecondsFormat::Secs, true)));
                        true
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

    let queries = match expansion {
        None => vec![base],
        Some(pairs) => {
            let mut queries: Vec<Query> = Vec::with_capacity(pairs.len());
            for pair in pairs {
                let mut query = base.clone();
                query.push(pair);
                if !queries.contains(&query) {
                    queries.push(query);
                }
            }
            queries
        }
    };
    QueryPlan { queries, residual }
}

// =============================================================================
// Adapter
// =============================================================================

pub struct DdApiAdapter {
    http: HttpContext,
}

impl DdApiAdapter {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }

    fn point(&self, geometry: Option<&Value>) -> Option<Geometry> {
        let coords = geometry?.get("coordinates")?.as_array()?;
        let x = coords.first()?.as_f64()?;
        let y = coords.get(1)?.as_f64()?;
        Some(point_in_degrees(x, y, self.http.reprojector()))
    }

    fn decode(&self, body: &DataBody, series: &TimeSeries) -> Vec<Measurement> {
        let maps = body.maps();
        let mut template = Measurement::new(body.source_code());
        if let Some(kind) = &series.observation_type {
            let typed = [
                (DataCategory::Compartment, &kind.compartment),
                (DataCategory::Quantity, &kind.quantity),
                (DataCategory::Parameter, &kind.parameter_code),
                (DataCategory::Unit, &kind.unit),
            ];
            for (category, value) in typed {
                if let Some(value) = value {
                    assign_property(&mut template, maps, category, value);
                }
            }
        }
        if let Some(location) = &series.location {
            if let Some(code) = location.properties.as_ref().and_then(|p| p.location_id.as_deref()) {
                assign_property(&mut template, maps, DataCategory::MeasurementObject, code);
            }
            template.coordinate = self.point(location.geometry.as_ref());
        }

        series
            .events
            .iter()
            .map(|event| Measurement {
                measurement_date: event.timestamp,
                value: event.value,
                ..template.clone()
            })
            .collect()
    }

    fn section<'a>(&self, body: &'a DataBody) -> Result<&'a DdApiConfigurationSection, AdapterError> {
        body.source_definition
            .dd_api_configuration_section
            .as_ref()
            .ok_or(AdapterError::MissingSection("DD-API"))
    }

    /// Every `(category, generic name)` the observation types mention.
    async fn observation_types(&self, body: &DataBody) -> Result<Vec<(DataCategory, String)>, u16> {
        let section = self.section(body).map_err(|e| e.status())?;
        let source = &body.source_definition;
        let token = self.http.logon(source).await?;
        let url = format!("{}/observationTypes", source.base_url());
        let mut stats = Default::default();
        let mut entries = Vec::new();

        for page in 1..=MAX_PAGES {
            let query = paged(Vec::new(), page, section.page_size);
            let fetched = self
                .http
                .get(source, &url, &query, token.as_deref(), &mut stats)
                .await
                .map_err(|e| e.status())?;
            if !fetched.is_success() {
                return Err(fetched.status);
            }
            let Ok(data) = serde_json::from_str::<ObservationTypeResponse>(&fetched.body) else {
                break;
            };
            for kind in data.results.unwrap_or_default() {
                let typed = [
                    (DataCategory::Compartment, kind.compartment),
                    (DataCategory::Unit, kind.unit),
                    (DataCategory::Parameter, kind.parameter_code),
                    (DataCategory::Quantity, kind.quantity),
                ];
                for (category, value) in typed {
                    if let Some(value) = value {
                        entries.push(capi_core::translate::to_generic(body.maps(), category, &value));
                    }
                }
            }
            if !has_next(&data.paging) {
                break;
            }
        }
        Ok(entries)
    }
}

fn paged(mut query: Query, page: usize, page_size: usize) -> Query {
    query.push(("page".to_string(), page.to_string()));
    query.push(("pageSize".to_string(), page_size.to_string()));
    query
}

#[async_trait::async_trait]
impl SourceAdapter for DdApiAdapter {
    fn code(&self) -> &str {
        PLUGIN_CODE
    }

    async fn measurements(&self, body: &DataBody) -> MeasurementResponse {
        let source = &body.source_definition;
        let section = match self.section(body) {
            Ok(section) => section,
            Err(e) => return MeasurementResponse::failed(&source.code, &body.response_id, e.status(), e.to_string()),
        };
        let token = match self.http.logon(source).await {
            Ok(token) => token,
            Err(status) => {
                return MeasurementResponse::failed(&source.code, &body.response_id, status, "Authentication failed")
            }
        };

        let plan = plan(body, section);
        let url = format!("{}/timeseries", source.base_url());
        let mut response = MeasurementResponse::new(&source.code, &body.response_id);

        'queries: for query in &plan.queries {
            for page in 1..=MAX_PAGES {
                let params = paged(query.clone(), page, section.page_size);
                let fetched = match self
                    .http
                    .get(source, &url, &params, token.as_deref(), &mut response.statistics)
                    .await
                {
                    Ok(fetched) => fetched,
                    Err(e) => {
                        tracing::warn!(source = %source.code, page, "DD-API request failed: {}", e);
                        response.http_status = e.status();
                        response.errors.push(e.to_string());
                        break 'queries;
                    }
                };

                if is_auth_failure(fetched.status) {
                    response.http_status = fetched.status;
                    response.errors.push("Authentication failed".to_string());
                    break 'queries;
                }
                if !fetched.is_success() {
                    let problem = serde_json::from_str::<Problem>(&fetched.body).ok();
                    let title = problem.as_ref().and_then(|p| p.title.clone());
                    response.errors.push(title.unwrap_or_else(|| format!("HTTP {}", fetched.status)));
                    response.http_status = problem.and_then(|p| p.status).unwrap_or(fetched.status);
                    break;
                }

                let Ok(data) = serde_json::from_str::<TimeSeriesResponse>(&fetched.body) else {
                    tracing::debug!(source = %source.code, page, "Undecodable DD-API page, stopping");
                    break;
                };
                let Some(results) = data.results else {
                    break;
                };
                for series in &results {
                    response.measurements.extend(self.decode(body, series));
                }
                if !has_next(&data.paging) {
                    break;
                }
            }
        }

        retain_matching(&mut response.measurements, &plan.residual, &body.connector_capabilities);
        tracing::info!(
            source = %source.code,
            queries = plan.queries.len(),
            measurements = response.measurements.len(),
            "DD-API request complete"
        );
        response
    }

    async fn code_names(&self, kind: ListKind, body: &DataBody) -> (u16, Vec<SourceCodeName>) {
        match self.observation_types(body).await {
            Ok(entries) => (200, code_names_of(body.source_code(), kind, &entries)),
            Err(status) => (status, Vec::new()),
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
        let url = format!("{}/locations", source.base_url());
        let mut stats = Default::default();
        let mut objects = Vec::new();

        for page in 1..=MAX_PAGES {
            let query = paged(Vec::new(), page, section.page_size);
            let fetched = match self.http.get(source, &url, &query, token.as_deref(), &mut stats).await {
                Ok(fetched) => fetched,
                Err(e) => return (e.status(), objects),
            };
            if !fetched.is_success() {
                return (fetched.status, objects);
            }
            let Ok(data) = serde_json::from_str::<LocationResponse>(&fetched.body) else {
                break;
            };
            let results = data.results.unwrap_or_default();
            let count = results.len();
            for location in results {
                let properties = location.properties.as_ref();
                let geometry = location
                    .geometry
                    .and_then(|g| serde_json::from_value::<Geometry>(g).ok())
                    .map(|g| match g.as_point() {
                        Some((x, y)) if needs_reprojection(x, y) => {
                            point_in_degrees(x, y, self.http.reprojector())
                        }
                        _ => g,
                    });
                objects.push(MeasurementObject {
                    source: source.code.clone(),
                    code: properties.and_then(|p| p.location_id.clone()).unwrap_or_default(),
                    name: properties.and_then(|p| p.location_name.clone()).unwrap_or_default(),
                    geometry,
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
    use axum::extract::Query as QueryParams;
    use axum::http::StatusCode;
    use axum::{routing::get, Json, Router};
    use capi_core::{CapabilitySet, CompareValue, FilterParser, Map, SourceDefinition};
    use serde_json::json;
    use std::collections::HashMap;

    fn body(url: &str, filter: &str, supported: &[&str]) -> DataBody {
        let mut source = SourceDefinition::new("DDL", PLUGIN_CODE, url);
        source.dd_api_configuration_section = Some(DdApiConfigurationSection {
            supported_query_parameters: supported.iter().map(|s| s.to_string()).collect(),
            page_size: 2,
        });
        source.map_data = vec![Map::new(
            DataCategory::Unit,
            "mg/l",
            DataCategory::Unit,
            "milligram per liter",
        )];
        let caps = CapabilitySet::builtin();
        let outcome = FilterParser::new(&caps).allow_empty(true).parse(Some(filter));
        assert!(outcome.is_valid(), "{:?}", outcome.errors);
        DataBody::new(source, outcome.conditions, "req-1", caps)
    }

    #[test]
    fn test_plan_pushes_supported_equalities() {
        let b = body(
            "http://ddl",
            "unit:eq:'mg/l';quantity:eq:'CONCTTE';value:gt:3;measurementdate:ge:'2024-01-01'",
            &["unit"],
        );
        let plan = plan(&b, b.source_definition.dd_api_configuration_section.as_ref().unwrap());
        assert_eq!(
            plan.queries,
            vec![vec![
                ("unit".to_string(), "milligram per liter".to_string()),
                ("startTime".to_string(), "2024-01-01T00:00:00Z".to_string()),
            ]]
        );
        let residual: Vec<&str> = plan.residual.iter().map(|c| c.field_name.as_str()).collect();
        assert_eq!(residual, vec!["quantity", "value"]);
    }

    #[test]
    fn test_plan_expands_in_and_dedups() {
        let mut b = body("http://ddl", "measurementobject:in:['A','B']", &["locationCode"]);
        b.source_definition.map_data.push(Map::new(
            DataCategory::MeasurementObject,
            "B",
            DataCategory::MeasurementObject,
            "A",
        ));
        let plan = plan(&b, b.source_definition.dd_api_configuration_section.as_ref().unwrap());
        assert_eq!(plan.queries, vec![vec![("locationCode".to_string(), "A".to_string())]]);
        assert!(plan.residual.is_empty());
    }

    #[test]
    fn test_plan_keeps_unsupported_in_as_residual() {
        let b = body("http://ddl", "parameter:in:['Cu','Zn']", &["locationCode"]);
        let plan = plan(&b, b.source_definition.dd_api_configuration_section.as_ref().unwrap());
        assert_eq!(plan.queries, vec![Vec::new()]);
        assert_eq!(plan.residual.len(), 1);
        assert!(matches!(plan.residual[0].value, CompareValue::ArrayOfString(_)));
    }

    #[test]
    fn test_plan_pushes_one_condition_per_key() {
        let b = body(
            "http://ddl",
            "quantity:eq:'A';quantity:eq:'B';measurementdate:ge:'2024-01-01';measurementdate:gt:'2024-06-01'",
            &["quantityName"],
        );
        let plan = plan(&b, b.source_definition.dd_api_configuration_section.as_ref().unwrap());
        assert_eq!(
            plan.queries,
            vec![vec![
                ("quantityName".to_string(), "A".to_string()),
                ("startTime".to_string(), "2024-01-01T00:00:00Z".to_string()),
            ]]
        );
        let residual: Vec<String> = plan.residual.iter().map(|c| c.to_string()).collect();
        assert_eq!(residual.len(), 2);
        assert_eq!(residual[0], "quantity:eq:'B'");
        assert!(residual[1].starts_with("measurementdate:gt:"));

        let b = body("http://ddl", "quantity:in:['A','B'];quantity:eq:'C'", &["quantityName"]);
        let plan = super::plan(&b, b.source_definition.dd_api_configuration_section.as_ref().unwrap());
        assert_eq!(plan.queries.len(), 2);
        assert!(plan.queries.iter().all(|q| q.len() == 1));
        assert_eq!(plan.residual.len(), 1);
        assert_eq!(plan.residual[0].to_string(), "quantity:eq:'C'");
    }

    fn series(location: &str, unit: &str, values: &[f64]) -> serde_json::Value {
        json!({
            "location": {
                "geometry": { "type": "Point", "coordinates": [121400.0, 487400.0] },
                "properties": { "locationId": location, "locationName": location }
            },
            "observationType": { "quantity": "CONCTTE", "unit": unit, "compartment": "OW", "parameterCode": "Cu" },
            "events": values.iter().map(|v| json!({ "timestamp": "2024-02-01T10:00:00+01:00", "value": v })).collect::<Vec<_>>()
        })
    }

    async fn backend() -> String {
        let router = Router::new()
            .route(
                "/timeseries",
                get(|QueryParams(q): QueryParams<HashMap<String, String>>| async move {
                    let page = q.get("page").cloned().unwrap_or_default();
                    assert_eq!(q.get("pageSize").map(String::as_str), Some("2"));
                    match (q.get("locationCode").map(String::as_str), page.as_str()) {
                        (Some("DENOD"), "1") => Json(json!({
                            "paging": { "next": "/timeseries?page=2" },
                            "results": [series("DENOD", "milligram per liter", &[1.0, 5.0])]
                        })),
                        (Some("DENOD"), _) => Json(json!({
                            "paging": { "next": null },
                            "results": [series("DENOD", "ug/l", &[7.0])]
                        })),
                        _ => Json(json!({ "paging": {}, "results": [series("OTHER", "ug/l", &[9.0])] })),
                    }
                }),
            )
            .route(
                "/observationTypes",
                get(|| async {
                    Json(json!({
                        "results": [
                            { "quantity": "CONCTTE", "unit": "milligram per liter", "compartment": "OW", "parameterCode": "Cu" },
                            { "quantity": "T", "unit": "oC", "compartment": "OW" }
                        ]
                    }))
                }),
            )
            .route(
                "/locations",
                get(|QueryParams(q): QueryParams<HashMap<String, String>>| async move {
                    let results = if q.get("page").map(String::as_str) == Some("1") {
                        json!([
                            { "geometry": { "type": "Point", "coordinates": [5.0, 52.0] }, "properties": { "locationId": "L1", "locationName": "One" } },
                            { "properties": { "locationId": "L2", "locationName": "Two" } }
                        ])
                    } else {
                        json!([{ "properties": { "locationId": "L3", "locationName": "Three" } }])
                    };
                    Json(json!({ "results": results }))
                }),
            );
        serve(router).await
    }

    #[tokio::test]
    async fn test_measurements_paginate_decode_and_filter() {
        let url = backend().await;
        let adapter = DdApiAdapter::new(HttpContext::with_client(reqwest::Client::new()));
        let b = body(&url, "measurementobject:eq:'DENOD';value:ge:2", &["locationCode"]);

        let response = adapter.measurements(&b).await;
        assert_eq!(response.http_status, 200);
        assert!(response.errors.is_empty());
        assert_eq!(response.statistics.number_of_requests, 2);
        assert!(response.statistics.total_byte_count > 0);

        let values: Vec<f64> = response.measurements.iter().filter_map(|m| m.value).collect();
        assert_eq!(values, vec![5.0, 7.0]);
        let first = &response.measurements[0];
        assert_eq!(first.unit.as_deref(), Some("mg/l"));
        assert_eq!(first.measurement_object.as_deref(), Some("DENOD"));
        assert_eq!(first.source, "DDL");
        let (lon, lat) = first.coordinate.as_ref().unwrap().as_point().unwrap();
        assert!((lon - 4.89).abs() < 0.01 && (lat - 52.37).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_auth_failure_is_terminal() {
        let router = Router::new().route("/timeseries", get(|| async { StatusCode::FORBIDDEN }));
        let url = serve(router).await;
        let adapter = DdApiAdapter::new(HttpContext::with_client(reqwest::Client::new()));
        let response = adapter.measurements(&body(&url, "", &[])).await;
        assert_eq!(response.http_status, 403);
        assert_eq!(response.errors, vec!["Authentication failed".to_string()]);
        assert!(response.measurements.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_recorded() {
        let adapter = DdApiAdapter::new(HttpContext::with_client(reqwest::Client::new()));
        let response = adapter.measurements(&body("http://127.0.0.1:9", "", &[])).await;
        assert_eq!(response.http_status, 502);
        assert_eq!(response.errors.len(), 1);
        assert!(response.measurements.is_empty());
    }

    #[tokio::test]
    async fn test_problem_body_is_reported() {
        let router = Router::new().route(
            "/timeseries",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "title": "Unknown location", "status": 400 })),
                )
            }),
        );
        let url = serve(router).await;
        let adapter = DdApiAdapter::new(HttpContext::with_client(reqwest::Client::new()));
        let response = adapter.measurements(&body(&url, "", &[])).await;
        assert_eq!(response.http_status, 400);
        assert_eq!(response.errors, vec!["Unknown location".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_section_is_not_implemented() {
        let adapter = DdApiAdapter::new(HttpContext::with_client(reqwest::Client::new()));
        let mut b = body("http://127.0.0.1:9", "", &[]);
        b.source_definition.dd_api_configuration_section = None;
        let response = adapter.measurements(&b).await;
        assert_eq!(response.http_status, 501);
        assert_eq!(adapter.code_names(ListKind::Units, &b).await, (501, Vec::new()));
    }

    #[tokio::test]
    async fn test_lists() {
        let url = backend().await;
        let adapter = DdApiAdapter::new(HttpContext::with_client(reqwest::Client::new()));
        let b = body(&url, "", &[]);

        let (status, units) = adapter.code_names(ListKind::Units, &b).await;
        assert_eq!(status, 200);
        let codes: Vec<&str> = units.iter().map(|u| u.code.as_str()).collect();
        assert_eq!(codes, vec!["mg/l", "oC"]);
        let (_, compartments) = adapter.code_names(ListKind::Compartments, &b).await;
        assert_eq!(compartments.len(), 1);

        let (status, objects) = adapter.measurement_objects(&b).await;
        assert_eq!(status, 200);
        let codes: Vec<&str> = objects.iter().map(|o| o.code.as_str()).collect();
        assert_eq!(codes, vec!["L1", "L2", "L3"]);
        assert_eq!(objects[0].geometry, Some(Geometry::point(5.0, 52.0)));
        assert!(objects[1].geometry.is_none());
    }
}
