use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /status` — no auth. Body shape and the healthy/degraded rule are
/// defined entirely by [`relay_registry::Registry::status_report`]; this
/// handler only adds the HTTP status code on top (200 either way — clients
/// read the `status` field, the code itself is not meaningful here).
pub async fn status(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let report = state.registry.status_report((*state.version).clone(), (*state.client_version).clone()).await;
    (StatusCode::OK, Json(json!(report)))
}
