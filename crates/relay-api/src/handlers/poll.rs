use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::Value;

use relay_domain::DataKind;
use relay_store::Item;

use crate::auth::{require_initialized, resolve_sdk_key};
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /sdk/flags` — PHP SDK poll: every flag, keyed by flag key.
pub async fn all_flags(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    let env = resolve_sdk_key(&state, &headers).await?;
    require_initialized(&env).await?;
    let items = env.store().all(DataKind::Flags).await?;
    Ok(Json(serde_json::to_value(items).unwrap_or(Value::Object(Default::default()))))
}

/// `GET /sdk/flags/{key}` — PHP SDK poll: one flag.
pub async fn one_flag(State(state): State<AppState>, Path(key): Path<String>, headers: HeaderMap) -> Result<Json<Item>, ApiError> {
    let env = resolve_sdk_key(&state, &headers).await?;
    require_initialized(&env).await?;
    match env.store().get(DataKind::Flags, &key).await? {
        Some(item @ Item::Flag(_)) => Ok(Json(item)),
        _ => Err(ApiError::not_found("unknown flag")),
    }
}

/// `GET /sdk/segments/{key}` — PHP SDK poll: one segment.
pub async fn one_segment(State(state): State<AppState>, Path(key): Path<String>, headers: HeaderMap) -> Result<Json<Item>, ApiError> {
    let env = resolve_sdk_key(&state, &headers).await?;
    require_initialized(&env).await?;
    match env.store().get(DataKind::Segments, &key).await? {
        Some(item @ Item::Segment(_)) => Ok(Json(item)),
        _ => Err(ApiError::not_found("unknown segment")),
    }
}
