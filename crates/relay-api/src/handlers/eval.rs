use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use relay_domain::{Flag, User};
use relay_eval::{evaluate, EvalDetail, Reason};

use crate::auth::{check_secure_mode, require_initialized, resolve_env_id, resolve_mobile_key};
use crate::error::ApiError;
use crate::snapshot::StoreSnapshot;
use crate::state::AppState;
use crate::user::decode_user_b64;

#[derive(Debug, Deserialize)]
pub struct SecureModeQuery {
    h: Option<String>,
}

/// One flag's evaluation result in the `evalx` (with-metadata) shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvalxEntry {
    value: Value,
    variation: Option<usize>,
    version: u64,
    reason: Reason,
    track_events: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug_events_until_date: Option<i64>,
}

/// Decode the user carried by a request: a base64url path segment on GET,
/// or a JSON body on REPORT. REPORT with any other content type is a 415
/// per §6.
async fn extract_user(method: &Method, headers: &HeaderMap, path_user: Option<&str>, body: Bytes) -> Result<User, ApiError> {
    if let Some(encoded) = path_user {
        return decode_user_b64(encoded);
    }
    if *method == Method::GET {
        return Err(ApiError::bad_request("missing user"));
    }
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
    if !content_type.starts_with("application/json") {
        return Err(ApiError::unsupported_media_type("REPORT body must be application/json"));
    }
    serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("malformed user JSON"))
}

/// Evaluate every flag in `snapshot` that passes `visible_to`, in whatever
/// order the store's iteration yields (client-side endpoints have no
/// notion of flag ordering).
fn evaluate_flags(snapshot: &StoreSnapshot, user: &User, visible_to: impl Fn(&Flag) -> bool) -> Vec<(String, Flag, EvalDetail)> {
    snapshot
        .flags()
        .iter()
        .filter(|(_, flag)| visible_to(flag))
        .map(|(key, flag)| {
            let detail = evaluate(flag, user, snapshot);
            (key.clone(), flag.clone(), detail)
        })
        .collect()
}

fn render_values(results: &[(String, Flag, EvalDetail)]) -> Value {
    let map: HashMap<&str, &Value> = results.iter().map(|(key, _, detail)| (key.as_str(), &detail.value)).collect();
    serde_json::to_value(map).unwrap_or(Value::Object(Default::default()))
}

fn render_meta(results: &[(String, Flag, EvalDetail)]) -> Value {
    let map: HashMap<&str, EvalxEntry> = results
        .iter()
        .map(|(key, flag, detail)| {
            (
                key.as_str(),
                EvalxEntry {
                    value: detail.value.clone(),
                    variation: detail.variation_index,
                    version: flag.version,
                    reason: detail.reason.clone(),
                    track_events: flag.track_events
                        || matches!(detail.reason, Reason::RuleMatch { in_experiment: true, .. })
                        || matches!(detail.reason, Reason::Fallthrough { in_experiment } if in_experiment || flag.track_events_fallthrough),
                    debug_events_until_date: flag.debug_events_until_date,
                },
            )
        })
        .collect();
    serde_json::to_value(map).unwrap_or(Value::Object(Default::default()))
}

async fn evaluate_for_js(state: &AppState, env_id: &str, user: User, secure_hash: Option<&str>, with_reasons: bool) -> Result<Value, ApiError> {
    let env = resolve_env_id(state, env_id).await?;
    require_initialized(&env).await?;
    check_secure_mode(&env, &user.key, secure_hash).await?;
    let snapshot = StoreSnapshot::load(env.store().as_ref()).await?;
    let results = evaluate_flags(&snapshot, &user, |f| f.client_side_availability.using_environment_id);
    Ok(if with_reasons { render_meta(&results) } else { render_values(&results) })
}

async fn evaluate_for_mobile(state: &AppState, headers: &HeaderMap, user: User, with_reasons: bool) -> Result<Value, ApiError> {
    let env = resolve_mobile_key(state, headers).await?;
    require_initialized(&env).await?;
    let snapshot = StoreSnapshot::load(env.store().as_ref()).await?;
    let results = evaluate_flags(&snapshot, &user, |f| f.client_side_availability.using_mobile_key);
    Ok(if with_reasons { render_meta(&results) } else { render_values(&results) })
}

/// `GET /sdk/eval/{envId}/users/{user}` — values only.
pub async fn js_eval_values_by_path(
    State(state): State<AppState>,
    Path((env_id, user_b64)): Path<(String, String)>,
    Query(q): Query<SecureModeQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = decode_user_b64(&user_b64)?;
    Ok(Json(evaluate_for_js(&state, &env_id, user, q.h.as_deref(), false).await?))
}

/// `REPORT /sdk/eval/{envId}/user` — values only, user in the body.
pub async fn js_eval_values_by_body(
    State(state): State<AppState>,
    Path(env_id): Path<String>,
    Query(q): Query<SecureModeQuery>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let user = extract_user(&method, &headers, None, body).await?;
    Ok(Json(evaluate_for_js(&state, &env_id, user, q.h.as_deref(), false).await?))
}

/// `GET /sdk/evalx/{envId}/users/{user}` — values with metadata.
pub async fn js_evalx_by_path(
    State(state): State<AppState>,
    Path((env_id, user_b64)): Path<(String, String)>,
    Query(q): Query<SecureModeQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = decode_user_b64(&user_b64)?;
    Ok(Json(evaluate_for_js(&state, &env_id, user, q.h.as_deref(), true).await?))
}

/// `REPORT /sdk/evalx/{envId}/user` — values with metadata, user in the body.
pub async fn js_evalx_by_body(
    State(state): State<AppState>,
    Path(env_id): Path<String>,
    Query(q): Query<SecureModeQuery>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let user = extract_user(&method, &headers, None, body).await?;
    Ok(Json(evaluate_for_js(&state, &env_id, user, q.h.as_deref(), true).await?))
}

/// `GET /msdk/eval/users/{user}` — mobile, values only.
pub async fn mobile_eval_values_by_path(
    State(state): State<AppState>,
    Path(user_b64): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user = decode_user_b64(&user_b64)?;
    Ok(Json(evaluate_for_mobile(&state, &headers, user, false).await?))
}

/// `REPORT /msdk/eval/user` — mobile, values only, user in the body.
pub async fn mobile_eval_values_by_body(State(state): State<AppState>, method: Method, headers: HeaderMap, body: Bytes) -> Result<Json<Value>, ApiError> {
    let user = extract_user(&method, &headers, None, body).await?;
    Ok(Json(evaluate_for_mobile(&state, &headers, user, false).await?))
}

/// `GET /msdk/evalx/users/{user}` — mobile, values with metadata.
pub async fn mobile_evalx_by_path(
    State(state): State<AppState>,
    Path(user_b64): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user = decode_user_b64(&user_b64)?;
    Ok(Json(evaluate_for_mobile(&state, &headers, user, true).await?))
}

/// `REPORT /msdk/evalx/user` — mobile, values with metadata, user in the body.
pub async fn mobile_evalx_by_body(State(state): State<AppState>, method: Method, headers: HeaderMap, body: Bytes) -> Result<Json<Value>, ApiError> {
    let user = extract_user(&method, &headers, None, body).await?;
    Ok(Json(evaluate_for_mobile(&state, &headers, user, true).await?))
}
