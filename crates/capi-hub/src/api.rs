//! # API Handlers
//!
//! Thin axum layer over the [`Orchestrator`](crate::query::Orchestrator).
//! Validation failures answer 400 with an [`ErrorResponse`] body.

use crate::connectors::ListKind;
use crate::query::{split_sources, SourceSummary};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use capi_core::{CapabilitySet, DataBody, ErrorResponse, MeasurementList, MeasurementObject, SourceCodeName};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

type Rejection = (StatusCode, Json<ErrorResponse>);

fn rejected(errors: ErrorResponse) -> Rejection {
    (StatusCode::BAD_REQUEST, Json(errors))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/measurements", get(measurements))
        .route("/api/compartments", get(compartments))
        .route("/api/parameters", get(parameters))
        .route("/api/quantities", get(quantities))
        .route("/api/units", get(units))
        .route("/api/measurementobjects", get(measurement_objects))
        .route("/api/sources", get(sources))
        .route("/api/capabilities", get(capabilities))
        .route("/plugins/:code/:operation", post(plugin_operation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// Measurements
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct MeasurementParams {
    pub sources: Option<String>,
    pub request: Option<String>,
}

pub async fn measurements(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MeasurementParams>,
) -> Result<Json<MeasurementList>, Rejection> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let sources = split_sources(params.sources.as_deref());
    state
        .orchestrator
        .process(&request_id, &sources, params.request.as_deref())
        .await
        .map(Json)
        .map_err(rejected)
}

// =============================================================================
// Lists
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SourcesParams {
    pub sources: Option<String>,
}

async fn code_list(state: &AppState, kind: ListKind, params: SourcesParams) -> Result<Json<Vec<SourceCodeName>>, Rejection> {
    let sources = split_sources(params.sources.as_deref());
    state
        .orchestrator
        .code_names(kind, &sources)
        .await
        .map(Json)
        .map_err(rejected)
}

pub async fn compartments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SourcesParams>,
) -> Result<Json<Vec<SourceCodeName>>, Rejection> {
    code_list(&state, ListKind::Compartments, params).await
}

pub async fn parameters(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SourcesParams>,
) -> Result<Json<Vec<SourceCodeName>>, Rejection> {
    code_list(&state, ListKind::Parameters, params).await
}

pub async fn quantities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SourcesParams>,
) -> Result<Json<Vec<SourceCodeName>>, Rejection> {
    code_list(&state, ListKind::Quantities, params).await
}

pub async fn units(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SourcesParams>,
) -> Result<Json<Vec<SourceCodeName>>, Rejection> {
    code_list(&state, ListKind::Units, params).await
}

pub async fn measurement_objects(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SourcesParams>,
) -> Result<Json<Vec<MeasurementObject>>, Rejection> {
    let sources = split_sources(params.sources.as_deref());
    state
        .orchestrator
        .measurement_objects(&sources)
        .await
        .map(Json)
        .map_err(rejected)
}

// =============================================================================
// Catalog
// =============================================================================

pub async fn sources(State(state): State<Arc<AppState>>) -> Json<Vec<SourceSummary>> {
    Json(state.orchestrator.sources())
}

pub async fn capabilities(State(state): State<Arc<AppState>>) -> Json<CapabilitySet> {
    Json(state.orchestrator.capabilities().clone())
}

#[derive(Debug, Serialize)]
pub struct HubStatus {
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub sources: usize,
    pub plugins: Vec<String>,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<HubStatus> {
    Json(HubStatus {
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        sources: state.orchestrator.sources().len(),
        plugins: state.orchestrator.adapters().codes().await,
    })
}

// =============================================================================
// Plugin host
// =============================================================================

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}

/// Run one adapter operation for another hub. The answer has the same
/// shape a remote plugin is expected to return.
pub async fn plugin_operation(
    State(state): State<Arc<AppState>>,
    Path((code, operation)): Path<(String, String)>,
    Json(body): Json<DataBody>,
) -> Result<Response, (StatusCode, String)> {
    let adapter = state
        .orchestrator
        .adapters()
        .resolve(&code)
        .await
        .ok_or((StatusCode::NOT_FOUND, format!("Plugin '{}' not found", code)))?;

    tracing::debug!(plugin = %code, operation = %operation, source = %body.source_code(), "Plugin call");
    let response = match operation.as_str() {
        "measurements" => Json(adapter.measurements(&body).await).into_response(),
        "measurementobjects" => {
            let (status, objects) = adapter.measurement_objects(&body).await;
            (status_code(status), Json(objects)).into_response()
        }
        other => match ListKind::parse(other) {
            Some(kind) => {
                let (status, entries) = adapter.code_names(kind, &body).await;
                (status_code(status), Json(entries)).into_response()
            }
            None => {
                return Err((
                    StatusCode::NOT_FOUND,
                    format!("Unknown plugin operation '{}'", operation),
                ))
            }
        },
    };
    Ok(response)
}
