use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use relay_domain::User;

use crate::error::ApiError;

/// Decode the base64url-encoded JSON user carried in a GET endpoint's path
/// segment. Accepts both padded and unpadded encodings since SDKs disagree
/// on which they send.
pub fn decode_user_b64(encoded: &str) -> Result<User, ApiError> {
    let bytes = URL_SAFE
        .decode(encoded)
        .or_else(|_| URL_SAFE_NO_PAD.decode(encoded))
        .map_err(|_| ApiError::bad_request("malformed user encoding"))?;
    serde_json::from_slice(&bytes).map_err(|_| ApiError::bad_request("malformed user JSON"))
}

/// Decode the JSON user carried in a REPORT request body. 415 on any
/// content type other than `application/json`.
pub fn decode_user_report(headers: &HeaderMap, body: &Bytes) -> Result<User, ApiError> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
    if !content_type.starts_with("application/json") {
        return Err(ApiError::unsupported_media_type("REPORT body must be application/json"));
    }
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("malformed user JSON"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn decodes_padded_and_unpadded_base64() {
        let user = User::new("user-a");
        let json = serde_json::to_vec(&user).unwrap();
        let padded = base64::engine::general_purpose::URL_SAFE.encode(&json);
        let unpadded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&json);

        assert_eq!(decode_user_b64(&padded).unwrap().key, "user-a");
        assert_eq!(decode_user_b64(&unpadded).unwrap().key, "user-a");
    }

    #[test]
    fn rejects_garbage_encoding() {
        assert!(decode_user_b64("not valid base64!!").is_err());
    }

    #[test]
    fn report_body_requires_json_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let body = Bytes::from_static(b"{\"key\":\"u\"}");
        let err = decode_user_report(&headers, &body).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn report_body_decodes_with_json_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = Bytes::from_static(b"{\"key\":\"u\"}");
        let user = decode_user_report(&headers, &body).unwrap();
        assert_eq!(user.key, "u");
    }
}
