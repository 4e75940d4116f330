use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, on, post, MethodFilter};
use axum::Router;
use relay_registry::Registry;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// The `REPORT` method carried by JS/mobile SDKs posting a user object as a
/// request body instead of a base64 path segment — axum has no built-in
/// constant for it.
fn report() -> MethodFilter {
    MethodFilter::try_from(Method::from_bytes(b"REPORT").expect("REPORT is a valid HTTP token")).expect("REPORT is a valid method filter")
}

/// CORS for the browser-facing routes (§6): mirror the request's `Origin`
/// (a configurable allowlist is not wired in — every environment trusts
/// its own envId as the access control boundary instead), and expose the
/// LaunchDarkly-specific request headers JS SDKs attach.
fn cors_layer() -> CorsLayer {
    let report_method = Method::from_bytes(b"REPORT").expect("REPORT is a valid HTTP token");
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::OPTIONS, report_method])
        .allow_headers([
            HeaderValue::from_static("content-type"),
            HeaderValue::from_static("x-launchdarkly-user-agent"),
            HeaderValue::from_static("x-launchdarkly-payload-id"),
            HeaderValue::from_static("x-launchdarkly-wrapper"),
            HeaderValue::from_static("x-launchdarkly-event-schema"),
        ])
}

/// Assemble the full downstream HTTP surface of §6 into one router, the
/// way `build_app` wires handler modules into routes in the source
/// project this one is modeled on.
pub fn build_app(registry: Arc<Registry>, version: impl Into<String>, client_version: impl Into<String>) -> Router {
    let state = AppState {
        registry,
        version: Arc::new(version.into()),
        client_version: Arc::new(client_version.into()),
    };

    Router::new()
        // Health
        .route("/status", get(handlers::status::status))
        // Server-side streams
        .route("/all", get(handlers::stream::server_all))
        .route("/flags", get(handlers::stream::server_flags))
        // PHP SDK polling
        .route("/sdk/flags", get(handlers::poll::all_flags))
        .route("/sdk/flags/:key", get(handlers::poll::one_flag))
        .route("/sdk/segments/:key", get(handlers::poll::one_segment))
        // JS/browser evaluation
        .route("/sdk/eval/:env_id/users/:user", get(handlers::eval::js_eval_values_by_path))
        .route("/sdk/eval/:env_id/user", on(report(), handlers::eval::js_eval_values_by_body))
        .route("/sdk/evalx/:env_id/users/:user", get(handlers::eval::js_evalx_by_path))
        .route("/sdk/evalx/:env_id/user", on(report(), handlers::eval::js_evalx_by_body))
        // Mobile evaluation
        .route("/msdk/eval/users/:user", get(handlers::eval::mobile_eval_values_by_path))
        .route("/msdk/eval/user", on(report(), handlers::eval::mobile_eval_values_by_body))
        .route("/msdk/evalx/users/:user", get(handlers::eval::mobile_evalx_by_path))
        .route("/msdk/evalx/user", on(report(), handlers::eval::mobile_evalx_by_body))
        // Mobile ping / JS ping / JS eval stream (ping dialect)
        .route("/mping", get(handlers::stream::mobile_ping))
        .route("/ping/:env_id", get(handlers::stream::js_ping))
        .route("/eval/:env_id", get(handlers::stream::js_eval_stream).on(report(), handlers::stream::js_eval_stream))
        .route("/eval/:env_id/:user", get(handlers::stream::js_eval_stream_with_user))
        // Server event forwarding
        .route("/bulk", post(handlers::events::server_events))
        .route("/diagnostic", post(handlers::events::server_events))
        // Mobile event forwarding
        .route("/mobile", post(handlers::events::mobile_events))
        .route("/mobile/events", post(handlers::events::mobile_events))
        .route("/mobile/events/bulk", post(handlers::events::mobile_events))
        .route("/mobile/events/diagnostic", post(handlers::events::mobile_events))
        // JS/browser event forwarding
        .route("/events/bulk/:env_id", post(handlers::events::js_events))
        .route("/events/diagnostic/:env_id", post(handlers::events::js_events))
        // Tracking pixel — the envId segment carries a literal `.gif`
        // suffix (`/a/<envId>.gif`); matchit captures the whole segment,
        // so the handler strips the suffix itself.
        .route("/a/:env_id_gif", get(handlers::events::tracking_pixel))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
