// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! HTTP surface for producers and the dashboard

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::alerts::{Alert, AlertId, AlertState};
use crate::core::{Engine, EngineStats};
use crate::db::DailySummary;
use crate::detection::{Domain, FusionOutcome};
use crate::error::{IngressError, LifecycleError};
use crate::ingress::IngressPayload;
use crate::nodes::NodeLiveness;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Rejected(#[from] IngressError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Lifecycle(LifecycleError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Lifecycle(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        let body = serde_json::json!({ "ok": false, "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub ok: bool,
    pub node: String,
    pub event: String,
    pub duplicate: bool,
    pub outcome: &'static str,
    pub alert_id: Option<AlertId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertQuery {
    pub domain: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GuestMode {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub stats: EngineStats,
}

/// Run engine work that writes through to SQLite on the blocking pool
async fn blocking<T, F>(engine: &Arc<Engine>, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&Engine) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(engine);
    tokio::task::spawn_blocking(move || work(&engine))
        .await
        .map_err(|e| ApiError::Internal(format!("engine task failed: {}", e)))?
}

async fn submit_event(State(engine): State<Arc<Engine>>, Json(payload): Json<IngressPayload>) -> ApiResult<EventResponse> {
    let accepted = blocking(&engine, move |engine| Ok(engine.submit_payload(payload)?)).await?;
    let outcome = match &accepted.outcome {
        FusionOutcome::Ignored => "ignored",
        FusionOutcome::Pending { .. } => "pending",
        FusionOutcome::Created(_) => "created",
        FusionOutcome::Merged(_) => "merged",
        FusionOutcome::Suppressed { .. } => "suppressed",
    };

    Ok(Json(EventResponse {
        ok: true,
        node: accepted.event.node.to_string(),
        event: accepted.event.kind.to_string(),
        duplicate: accepted.duplicate,
        outcome,
        alert_id: accepted.outcome.alert().map(|a| a.id),
    }))
}

async fn list_alerts(State(engine): State<Arc<Engine>>, Query(query): Query<AlertQuery>) -> ApiResult<Vec<Alert>> {
    let domain = match query.domain.as_deref().filter(|d| !d.is_empty()) {
        Some(raw) => Some(Domain::parse(raw).ok_or_else(|| ApiError::BadRequest(format!("unknown domain '{}'", raw)))?),
        None => None,
    };
    let state = match query.state.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(AlertState::parse(raw).ok_or_else(|| ApiError::BadRequest(format!("unknown state '{}'", raw)))?),
        None => None,
    };
    Ok(Json(engine.list_alerts(domain, state)))
}

async fn get_alert(State(engine): State<Arc<Engine>>, Path(id): Path<AlertId>) -> ApiResult<Alert> {
    engine
        .alert(id)
        .map(Json)
        .ok_or(ApiError::Lifecycle(LifecycleError::NotFound(id)))
}

async fn acknowledge_alert(State(engine): State<Arc<Engine>>, Path(id): Path<AlertId>) -> ApiResult<Alert> {
    blocking(&engine, move |engine| Ok(engine.acknowledge(id)?)).await.map(Json)
}

async fn resolve_alert(State(engine): State<Arc<Engine>>, Path(id): Path<AlertId>) -> ApiResult<Alert> {
    blocking(&engine, move |engine| Ok(engine.resolve(id)?)).await.map(Json)
}

async fn list_nodes(State(engine): State<Arc<Engine>>) -> Json<Vec<NodeLiveness>> {
    Json(engine.nodes())
}

async fn get_guest_mode(State(engine): State<Arc<Engine>>) -> Json<GuestMode> {
    Json(GuestMode {
        enabled: engine.guest_mode(),
    })
}

async fn set_guest_mode(State(engine): State<Arc<Engine>>, Json(body): Json<GuestMode>) -> ApiResult<GuestMode> {
    blocking(&engine, move |engine| Ok(engine.set_guest_mode(body.enabled)?)).await?;
    Ok(Json(GuestMode {
        enabled: engine.guest_mode(),
    }))
}

async fn daily_summary(State(engine): State<Arc<Engine>>, Query(query): Query<SummaryQuery>) -> ApiResult<DailySummary> {
    let date = match query.date.as_deref().filter(|d| !d.is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("invalid date '{}', expected YYYY-MM-DD", raw)))?,
        None => engine.clock().now().date_naive(),
    };
    engine
        .summary(date)?
        .map(Json)
        .ok_or_else(|| ApiError::Unavailable("database disabled".to_string()))
}

async fn health(State(engine): State<Arc<Engine>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        version: crate::VERSION,
        stats: engine.stats(),
    })
}

/// Build the API router around a shared engine
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/api/events", post(submit_event))
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts/:id", get(get_alert))
        .route("/api/alerts/:id/ack", post(acknowledge_alert))
        .route("/api/alerts/:id/resolve", post(resolve_alert))
        .route("/api/nodes", get(list_nodes))
        .route("/api/settings/guest_mode", get(get_guest_mode).post(set_guest_mode))
        .route("/api/summary", get(daily_summary))
        .route("/api/health", get(health))
        .with_state(engine)
}
