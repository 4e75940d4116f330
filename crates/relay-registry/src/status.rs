use std::collections::HashMap;

use chrono::{DateTime, Utc};
use relay_ingest::ConnectionState;
use serde::Serialize;

/// Mask everything but the last five hex digits of a secret, keeping its
/// alphabetic prefix visible (§7: `sdk-****...abcde`). Separators within
/// the body (dashes, etc.) are left untouched; only hex digits are masked,
/// and only hex digits before the last five of them.
pub fn obscure_key(key: &str) -> String {
    let prefix_len = key
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_alphabetic())
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let (prefix, remainder) = key.split_at(prefix_len);
    let prefix_len = remainder
        .char_indices()
        .take_while(|(_, c)| !c.is_ascii_alphanumeric())
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let (separator, body) = remainder.split_at(prefix_len);

    let hex_count = body.chars().filter(char::is_ascii_hexdigit).count();
    let mask_count = hex_count.saturating_sub(5);

    let mut out = String::with_capacity(key.len());
    out.push_str(prefix);
    out.push_str(separator);
    let mut seen = 0usize;
    for c in body.chars() {
        if c.is_ascii_hexdigit() {
            if seen < mask_count {
                out.push('*');
            } else {
                out.push(c);
            }
            seen += 1;
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatusJson {
    pub state: &'static str,
    pub state_since: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_id: Option<String>,
    pub status: &'static str,
    pub connection_status: ConnectionStatusJson,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: &'static str,
    pub version: String,
    pub client_version: String,
    pub environments: HashMap<String, EnvironmentStatus>,
}

pub fn connection_state_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Initializing => "initializing",
        ConnectionState::Connected => "connected",
        ConnectionState::Interrupted => "interrupted",
        ConnectionState::Failed => "failed",
    }
}

pub fn is_healthy(state: ConnectionState, initialized: bool) -> bool {
    state == ConnectionState::Connected && initialized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_alphabetic_prefix() {
        let obscured = obscure_key("sdk-1234567890abcdef1234567890abcdef");
        assert!(obscured.starts_with("sdk-"));
    }

    #[test]
    fn keeps_the_last_five_hex_digits_visible() {
        let obscured = obscure_key("sdk-1234567890abcde");
        assert!(obscured.ends_with("bcde") || obscured.ends_with("abcde"));
    }

    #[test]
    fn masks_everything_but_the_last_five_hex_digits() {
        let obscured = obscure_key("mob-00000000000000000000abcde");
        let hex_suffix: String = obscured.chars().rev().take(5).collect::<String>().chars().rev().collect();
        assert_eq!(hex_suffix, "abcde");
        assert!(obscured.contains('*'));
    }

    #[test]
    fn short_keys_are_left_entirely_unmasked() {
        let obscured = obscure_key("sdk-abcde");
        assert_eq!(obscured, "sdk-abcde");
    }
}
