//! HTTP route handlers

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use broker::Broker;
use bytes::Bytes;
use contracts::{ContractError, KvStore, Pipeline, PipelinePatch, PipelineStatistic};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;

/// Shared application state.
pub struct AppState<S> {
    pub broker: Broker<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            broker: self.broker.clone(),
        }
    }
}

/// Query of `GET /api/v1/pipelines/{id}/datapoints`
#[derive(Debug, Deserialize)]
pub struct PopParams {
    pub consumer: Option<String>,
    pub limit: Option<usize>,
}

/// Handle GET /health
pub async fn health<S: KvStore + Sync + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<Value>, ApiError> {
    state.broker.health().await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Handle GET /api/v1/pipelines
pub async fn list_pipelines<S: KvStore + Sync + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<Pipeline>>, ApiError> {
    Ok(Json(state.broker.list_pipelines().await?))
}

/// Handle POST /api/v1/pipelines
pub async fn create_pipeline<S: KvStore + Sync + 'static>(
    State(state): State<AppState<S>>,
    body: Result<Json<Pipeline>, JsonRejection>,
) -> Result<(StatusCode, Json<Pipeline>), ApiError> {
    let Json(pipeline) = body.map_err(body_error)?;
    let created = state.broker.create_pipeline(pipeline).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Handle GET /api/v1/pipelines/{id}
pub async fn get_pipeline<S: KvStore + Sync + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<Pipeline>, ApiError> {
    Ok(Json(state.broker.get_pipeline(&id).await?))
}

/// Handle PUT /api/v1/pipelines/{id}
pub async fn update_pipeline<S: KvStore + Sync + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    body: Result<Json<PipelinePatch>, JsonRejection>,
) -> Result<Json<Pipeline>, ApiError> {
    let Json(patch) = body.map_err(body_error)?;
    Ok(Json(state.broker.update_pipeline(&id, patch).await?))
}

/// Handle DELETE /api/v1/pipelines/{id}
pub async fn delete_pipeline<S: KvStore + Sync + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.broker.delete_pipeline(&id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

/// Handle GET /api/v1/pipelines/{id}/statistics
pub async fn get_statistics<S: KvStore + Sync + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<PipelineStatistic>, ApiError> {
    Ok(Json(state.broker.get_statistics(&id).await?))
}

/// Handle GET /api/v1/pipelines/{id}/datapoints
///
/// Payloads are returned as strings; invalid UTF-8 is replaced lossily.
pub async fn pop_datapoints<S: KvStore + Sync + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    params: Result<Query<PopParams>, QueryRejection>,
) -> Result<Json<Vec<String>>, ApiError> {
    let Query(params) =
        params.map_err(|e| ApiError(ContractError::validation("query", e.body_text())))?;
    let consumer = params
        .consumer
        .ok_or_else(|| ContractError::validation("consumer", "query parameter 'consumer' is required"))?;

    let batch = state
        .broker
        .pop_datapoints(&id, &consumer, params.limit)
        .await?;
    Ok(Json(
        batch
            .iter()
            .map(|payload| String::from_utf8_lossy(payload).into_owned())
            .collect(),
    ))
}

/// Handle POST /api/v1/pipelines/{id}/datapoints
///
/// The raw body is the payload. Accepted means queued, not yet written.
pub async fn push_datapoint<S: KvStore + Sync + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    state.broker.push_datapoint(&id, body).await?;
    let location = format!("/api/v1/pipelines/{id}/datapoints");
    Ok((
        StatusCode::ACCEPTED,
        [(header::LOCATION, location)],
        Json(json!({ "status": "accepted" })),
    ))
}

fn body_error(rejection: JsonRejection) -> ApiError {
    ApiError(ContractError::validation("body", rejection.body_text()))
}
