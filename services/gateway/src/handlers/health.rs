use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Json};

use crate::state::AppState;

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Render counters plus event source statistics.
pub async fn metrics(State(state): State<AppState>) -> Json<BTreeMap<String, u64>> {
    let mut exported = state.metrics.export();
    exported.insert("events_published".to_string(), state.source.events_published());
    exported.insert("events_dropped".to_string(), state.source.events_dropped());
    exported.insert("subscribers".to_string(), state.source.subscriber_count() as u64);
    Json(exported)
}
