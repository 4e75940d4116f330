use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream};

use relay_stream::{Dialect, SubscriberStream};

use crate::auth::{require_initialized, resolve_env_id, resolve_mobile_key, resolve_sdk_key};
use crate::error::ApiError;
use crate::state::AppState;

fn to_sse_stream(sub: SubscriberStream) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(sub, |mut sub| async move {
        match sub.next().await {
            Some(Ok(event)) => Some((Ok(event), sub)),
            Some(Err(error)) => {
                tracing::warn!(%error, "stream frame could not be serialized, ending connection");
                None
            }
            None => None,
        }
    })
}

/// Build the SSE response for a subscriber stream with the headers §6
/// requires on every one of these routes: `Content-Type`/`Cache-Control`
/// come from axum's `Sse` type itself; `X-Accel-Buffering: no` has to be
/// added by hand so an nginx-fronted deployment doesn't buffer the stream.
fn sse_response(sub: SubscriberStream) -> Response {
    let mut response = Sse::new(to_sse_stream(sub)).into_response();
    response.headers_mut().insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

/// `GET /all` — server-side stream, full dataset.
pub async fn server_all(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let env = resolve_sdk_key(&state, &headers).await?;
    require_initialized(&env).await?;
    let sub = SubscriberStream::new(env.store(), Dialect::ServerAll, env.stream_config, env.shutdown_signal());
    Ok(sse_response(sub))
}

/// `GET /flags` — server-side stream, flags only.
pub async fn server_flags(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let env = resolve_sdk_key(&state, &headers).await?;
    require_initialized(&env).await?;
    let sub = SubscriberStream::new(env.store(), Dialect::ServerFlagsOnly, env.stream_config, env.shutdown_signal());
    Ok(sse_response(sub))
}

/// `GET /mping` — mobile ping stream.
pub async fn mobile_ping(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let env = resolve_mobile_key(&state, &headers).await?;
    require_initialized(&env).await?;
    let sub = SubscriberStream::new(env.store(), Dialect::MobilePing, env.stream_config, env.shutdown_signal());
    Ok(sse_response(sub))
}

/// `GET /ping/{envId}` — JS client ping stream.
pub async fn js_ping(State(state): State<AppState>, Path(env_id): Path<String>) -> Result<Response, ApiError> {
    let env = resolve_env_id(&state, &env_id).await?;
    require_initialized(&env).await?;
    let sub = SubscriberStream::new(env.store(), Dialect::JsPing, env.stream_config, env.shutdown_signal());
    Ok(sse_response(sub))
}

/// `GET/REPORT /eval/{envId}` — JS eval stream. Per the external interface
/// this dialect is implemented as a ping: clients re-fetch evaluation
/// results over REST rather than receiving them inline.
pub async fn js_eval_stream(State(state): State<AppState>, Path(env_id): Path<String>) -> Result<Response, ApiError> {
    let env = resolve_env_id(&state, &env_id).await?;
    require_initialized(&env).await?;
    let sub = SubscriberStream::new(env.store(), Dialect::JsPing, env.stream_config, env.shutdown_signal());
    Ok(sse_response(sub))
}

/// `GET/REPORT /eval/{envId}/{user}` — same ping dialect; the path-carried
/// user has no bearing on what's streamed, it exists only so GET callers
/// that already have a user handy don't need a separate route shape.
pub async fn js_eval_stream_with_user(
    State(state): State<AppState>,
    Path((env_id, _user)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let env = resolve_env_id(&state, &env_id).await?;
    require_initialized(&env).await?;
    let sub = SubscriberStream::new(env.store(), Dialect::JsPing, env.stream_config, env.shutdown_signal());
    Ok(sse_response(sub))
}
