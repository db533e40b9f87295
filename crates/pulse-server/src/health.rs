use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;
use crate::store::StoreStats;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub now: DateTime<Utc>,
    pub sse_subscribers: usize,
    pub store: StoreStats,
}

/// GET /api/health — server status, viewer count, and store counters.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let sse = state.sse_subscriber_count.load(Ordering::Relaxed);
    let store = {
        let store = state.store.read().await;
        store.stats()
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        now: Utc::now(),
        sse_subscribers: sse,
        store,
    })
}
