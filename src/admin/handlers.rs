use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::pairing::bucket::BucketDepth;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub live_connections: usize,
    pub waiting_requests: usize,
    pub pending_timeouts: usize,
    pub timeout_secs: u64,
    pub complete_delay_ms: u64,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let engine = state.coordinator.engine();
    let settings = engine.settings().load();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        live_connections: state.coordinator.registry().len(),
        waiting_requests: engine.queues().waiting(),
        pending_timeouts: engine.timers().pending(),
        timeout_secs: settings.timeout_secs,
        complete_delay_ms: settings.complete_delay_ms,
    })
}

/// Per-bucket queue depth, sorted by bucket.
pub async fn get_queues(State(state): State<AppState>) -> Json<Vec<BucketDepth>> {
    Json(state.coordinator.engine().queues().snapshot())
}
