use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::{resolve_env_id, resolve_mobile_key, resolve_sdk_key};
use crate::error::ApiError;
use crate::state::AppState;

/// 1x1 transparent GIF served by the tracking-pixel endpoint.
const TRANSPARENT_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0x21,
    0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44,
    0x01, 0x00, 0x3b,
];

/// A body is either a batch (array) or a single pre-serialized event
/// (diagnostic payloads, and the gif pixel's single tracked event). Both
/// shapes are queued the same way.
fn into_batch(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        other => vec![other],
    }
}

fn parse_body(bytes: &Bytes) -> Result<Vec<Value>, ApiError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|_| ApiError::bad_request("malformed event JSON"))?;
    Ok(into_batch(value))
}

/// `POST /bulk`, `/diagnostic` — server-side event forwarding (§4.4, §6).
pub async fn server_events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<StatusCode, ApiError> {
    let env = resolve_sdk_key(&state, &headers).await?;
    env.publish_batch(parse_body(&body)?).await;
    Ok(StatusCode::ACCEPTED)
}

/// `POST /mobile`, `/mobile/events`, `/mobile/events/bulk`, `/mobile/events/diagnostic`.
pub async fn mobile_events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<StatusCode, ApiError> {
    let env = resolve_mobile_key(&state, &headers).await?;
    env.publish_batch(parse_body(&body)?).await;
    Ok(StatusCode::ACCEPTED)
}

/// `POST /events/bulk/{envId}`, `/events/diagnostic/{envId}` — browser events.
pub async fn js_events(State(state): State<AppState>, Path(env_id): Path<String>, body: Bytes) -> Result<StatusCode, ApiError> {
    let env = resolve_env_id(&state, &env_id).await?;
    env.publish_batch(parse_body(&body)?).await;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
pub struct PixelQuery {
    d: Option<String>,
}

/// `GET /a/{envId}.gif?d=<base64>` — the tracking-pixel event path used by
/// environments where opening an SSE/XHR connection isn't viable. The
/// event is queued the same as any other, and a static transparent GIF is
/// returned regardless of whether decoding succeeded, so a malformed `d`
/// never surfaces as a broken image.
pub async fn tracking_pixel(State(state): State<AppState>, Path(env_id_gif): Path<String>, Query(q): Query<PixelQuery>) -> Result<([(&'static str, &'static str); 1], &'static [u8]), ApiError> {
    let env_id = env_id_gif.strip_suffix(".gif").unwrap_or(&env_id_gif);
    let env = resolve_env_id(&state, env_id).await?;

    if let Some(encoded) = q.d {
        if let Ok(bytes) = URL_SAFE.decode(&encoded).or_else(|_| URL_SAFE_NO_PAD.decode(&encoded)) {
            if let Ok(event) = serde_json::from_slice::<Value>(&bytes) {
                env.publish_batch(vec![event]).await;
            }
        }
    }

    Ok(([("content-type", "image/gif")], TRANSPARENT_GIF))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn into_batch_wraps_a_single_object() {
        let batch = into_batch(json!({"kind": "custom"}));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn into_batch_passes_an_array_through() {
        let batch = into_batch(json!([{"kind": "custom"}, {"kind": "identify"}]));
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn parse_body_rejects_malformed_json() {
        let bytes = Bytes::from_static(b"not json");
        assert!(parse_body(&bytes).is_err());
    }
}
