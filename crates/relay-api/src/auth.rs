use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use relay_registry::{Credential, Environment};
use sha2::Sha256;

use crate::error::ApiError;
use crate::state::AppState;

/// Extract the raw credential carried in `Authorization`. Server and mobile
/// SDKs both send the key verbatim; a `Bearer ` prefix is accepted too since
/// some HTTP clients (and load balancers in front of this service) add one.
fn credential_from_headers(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    Some(raw.strip_prefix("Bearer ").unwrap_or(raw).to_string())
}

/// Resolve the environment carrying the SDK key in `Authorization`. 401 if
/// the header is missing or the key is unknown to any environment.
pub async fn resolve_sdk_key(state: &AppState, headers: &HeaderMap) -> Result<Arc<Environment>, ApiError> {
    let key = credential_from_headers(headers).ok_or_else(|| ApiError::unauthorized("missing SDK key"))?;
    state
        .registry
        .get_environment(&Credential::SdkKey(key))
        .await
        .ok_or_else(|| ApiError::unauthorized("unknown SDK key"))
}

/// Resolve the environment carrying the mobile key in `Authorization`. 401
/// if missing or unknown.
pub async fn resolve_mobile_key(state: &AppState, headers: &HeaderMap) -> Result<Arc<Environment>, ApiError> {
    let key = credential_from_headers(headers).ok_or_else(|| ApiError::unauthorized("missing mobile key"))?;
    state
        .registry
        .get_environment(&Credential::MobileKey(key))
        .await
        .ok_or_else(|| ApiError::unauthorized("unknown mobile key"))
}

/// Resolve the environment named by a URL-carried envId. 404 (not 401) on
/// an unknown id, since browser SDKs treat the id as part of the route
/// rather than a credential.
pub async fn resolve_env_id(state: &AppState, env_id: &str) -> Result<Arc<Environment>, ApiError> {
    state
        .registry
        .get_environment(&Credential::EnvironmentId(env_id.to_string()))
        .await
        .ok_or_else(|| ApiError::not_found("unknown environment id"))
}

/// 503 unless the environment's store has received at least one full
/// dataset. Checked on every evaluation/poll/stream-replay path, never on
/// event-forwarding (queued events are accepted regardless).
pub async fn require_initialized(env: &Environment) -> Result<(), ApiError> {
    if env.store().initialized().await {
        Ok(())
    } else {
        Err(ApiError::service_unavailable("environment is not yet initialized"))
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Secure-mode check for JS/browser endpoints: `provided` must equal
/// HMAC-SHA256(sdkKey, userKey) in lowercase hex. Only enforced when the
/// environment has secure mode enabled; callers skip this otherwise.
pub async fn check_secure_mode(env: &Environment, user_key: &str, provided: Option<&str>) -> Result<(), ApiError> {
    if !env.secure_mode {
        return Ok(());
    }
    let provided = provided.ok_or_else(|| ApiError::bad_request("missing secure mode hash"))?;
    let sdk_key = env.identifiers().await.sdk_key;
    let mut mac = HmacSha256::new_from_slice(sdk_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(user_key.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    if expected.eq_ignore_ascii_case(provided) {
        Ok(())
    } else {
        Err(ApiError::bad_request("secure mode hash mismatch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn strips_bearer_prefix_when_present() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer sdk-abc"));
        assert_eq!(credential_from_headers(&headers), Some("sdk-abc".to_string()));
    }

    #[test]
    fn accepts_raw_key_with_no_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("sdk-abc"));
        assert_eq!(credential_from_headers(&headers), Some("sdk-abc".to_string()));
    }

    #[test]
    fn missing_header_yields_none() {
        assert_eq!(credential_from_headers(&HeaderMap::new()), None);
    }
}
