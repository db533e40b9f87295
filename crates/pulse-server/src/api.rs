use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pulse_core::event::Alert;
use pulse_core::snapshot::Snapshot;

use crate::auth::authorize_submitter;
use crate::error::AppError;
use crate::state::AppState;

/// How many alerts the alerts endpoint returns.
const ALERTS_ENDPOINT_LIMIT: usize = 50;

/// Request body for submitting events: one loose object or a batch of them.
/// Payloads stay untyped here; normalization happens inside the store.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SubmitBody {
    Batch(Vec<Value>),
    Single(Value),
}

/// Response for accepted submissions.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub accepted: usize,
    pub ids: Vec<String>,
}

/// POST /api/events — accept one event or a batch.
pub async fn submit_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    authorize_submitter(&state.auth, &headers)?;

    let payloads = match body {
        SubmitBody::Single(v) => vec![v],
        SubmitBody::Batch(v) => v,
    };

    if payloads.is_empty() {
        return Err(AppError::BadRequest("No events provided".to_string()));
    }

    let batch_limit = state.config.limits.event_batch_limit;
    if payloads.len() > batch_limit {
        return Err(AppError::BadRequest(format!(
            "Batch too large: {} (max {batch_limit})",
            payloads.len()
        )));
    }

    let mut ids = Vec::with_capacity(payloads.len());
    let mut store = state.store.write().await;
    for payload in &payloads {
        ids.push(store.ingest(payload).id);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            accepted: ids.len(),
            ids,
        }),
    ))
}

/// GET /api/events — the current snapshot.
pub async fn get_snapshot(State(state): State<AppState>) -> Json<Snapshot> {
    let store = state.store.read().await;
    Json(store.snapshot())
}

/// Response for the alerts endpoint.
#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
}

/// GET /api/alerts — newest alerts.
pub async fn get_alerts(State(state): State<AppState>) -> Json<AlertsResponse> {
    let store = state.store.read().await;
    Json(AlertsResponse {
        alerts: store.alerts(ALERTS_ENDPOINT_LIMIT),
    })
}
