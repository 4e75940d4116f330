use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// Why a variation was selected. Mirrors the `reason` object surfaced on
/// evalx endpoints; the plain eval endpoints discard everything but `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    Off,
    Fallthrough {
        #[serde(default, rename = "inExperiment", skip_serializing_if = "is_false")]
        in_experiment: bool,
    },
    TargetMatch,
    RuleMatch {
        #[serde(rename = "ruleIndex")]
        rule_index: usize,
        #[serde(rename = "ruleId")]
        rule_id: String,
        #[serde(default, rename = "inExperiment", skip_serializing_if = "is_false")]
        in_experiment: bool,
    },
    PrerequisiteFailed {
        #[serde(rename = "prerequisiteKey")]
        prerequisite_key: String,
    },
    Error {
        #[serde(rename = "errorKind")]
        error_kind: EvalError,
    },
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Serialize for EvalError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            EvalError::MalformedFlag => "MALFORMED_FLAG",
            EvalError::UserNotSpecified => "USER_NOT_SPECIFIED",
            EvalError::FlagNotFound => "FLAG_NOT_FOUND",
            EvalError::ClientNotReady => "CLIENT_NOT_READY",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for EvalError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "MALFORMED_FLAG" => Ok(EvalError::MalformedFlag),
            "USER_NOT_SPECIFIED" => Ok(EvalError::UserNotSpecified),
            "FLAG_NOT_FOUND" => Ok(EvalError::FlagNotFound),
            "CLIENT_NOT_READY" => Ok(EvalError::ClientNotReady),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &["MALFORMED_FLAG", "USER_NOT_SPECIFIED", "FLAG_NOT_FOUND", "CLIENT_NOT_READY"],
            )),
        }
    }
}

/// A synthetic feature-request event recorded for each prerequisite flag
/// actually evaluated while resolving the top-level flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerequisiteEvent {
    pub flag_key: String,
    pub variation_index: Option<usize>,
    pub value: serde_json::Value,
}

/// Full result of [`crate::evaluate::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalDetail {
    pub value: serde_json::Value,
    pub variation_index: Option<usize>,
    pub reason: Reason,
    #[serde(default)]
    pub prerequisite_events: Vec<PrerequisiteEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_serializes_with_screaming_snake_kind() {
        let r = Reason::TargetMatch;
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["kind"], "TARGET_MATCH");
    }

    #[test]
    fn fallthrough_omits_in_experiment_when_false() {
        let r = Reason::Fallthrough { in_experiment: false };
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("inExperiment").is_none());
    }

    #[test]
    fn rule_match_uses_camel_case_fields() {
        let r = Reason::RuleMatch { rule_index: 2, rule_id: "r1".into(), in_experiment: true };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["ruleIndex"], 2);
        assert_eq!(json["ruleId"], "r1");
        assert_eq!(json["inExperiment"], true);
    }

    #[test]
    fn error_reason_carries_error_kind() {
        let r = Reason::Error { error_kind: EvalError::MalformedFlag };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["errorKind"], "MALFORMED_FLAG");
    }
}
