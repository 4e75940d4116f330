use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

// ── Data kind ─────────────────────────────────────────────────────────────────

/// Which collection a key belongs to. Used throughout the store, ingester and
/// stream layers to address an item without caring whether it's a flag or a
/// segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Flags,
    Segments,
}

impl DataKind {
    /// The path segment this kind is addressed under, e.g. `/flags/<key>`.
    pub fn path_segment(&self) -> &'static str {
        match self {
            DataKind::Flags => "flags",
            DataKind::Segments => "segments",
        }
    }

    pub fn all() -> [DataKind; 2] {
        [DataKind::Flags, DataKind::Segments]
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path_segment())
    }
}

/// Implemented by every type that can live in the versioned store: carries a
/// stable key and a monotonically increasing version.
pub trait VersionedData {
    fn key(&self) -> &str;
    fn version(&self) -> u64;
}

// ── Clause / rollout ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    In,
    EndsWith,
    StartsWith,
    Contains,
    Matches,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Before,
    After,
    SemVerEqual,
    SemVerLessThan,
    SemVerGreaterThan,
    SegmentMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub attribute: String,
    pub op: Operator,
    pub values: Vec<Value>,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RolloutKind {
    Rollout,
    Experiment,
}

impl Default for RolloutKind {
    fn default() -> Self {
        RolloutKind::Rollout
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedVariation {
    pub variation: usize,
    /// Parts-per-100000. The last bucket in a `Rollout` absorbs any rounding
    /// shortfall so the weights need not sum to exactly 100000 themselves.
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rollout {
    pub variations: Vec<WeightedVariation>,
    #[serde(default = "default_bucket_by")]
    pub bucket_by: String,
    #[serde(default)]
    pub kind: RolloutKind,
    pub seed: Option<i64>,
}

fn default_bucket_by() -> String {
    "key".to_string()
}

/// Either a fixed variation index or a weighted rollout — used for both
/// `fallthrough` and each rule's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationOrRollout {
    pub variation: Option<usize>,
    pub rollout: Option<Rollout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub clauses: Vec<Clause>,
    #[serde(flatten)]
    pub then: VariationOrRollout,
    #[serde(default)]
    pub track_events: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub variation: usize,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub key: String,
    pub variation: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientSideAvailability {
    #[serde(default)]
    pub using_mobile_key: bool,
    #[serde(default)]
    pub using_environment_id: bool,
}

// ── Flag ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub key: String,
    pub version: u64,
    pub on: bool,
    pub variations: Vec<Value>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    pub fallthrough: VariationOrRollout,
    pub off_variation: Option<usize>,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    #[serde(default)]
    pub salt: String,
    #[serde(default)]
    pub client_side_availability: ClientSideAvailability,
    #[serde(default)]
    pub track_events: bool,
    #[serde(default)]
    pub track_events_fallthrough: bool,
    pub debug_events_until_date: Option<i64>,
    #[serde(default)]
    pub deleted: bool,
}

impl VersionedData for Flag {
    fn key(&self) -> &str {
        &self.key
    }
    fn version(&self) -> u64 {
        self.version
    }
}

// ── Segment ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRule {
    pub clauses: Vec<Clause>,
    pub weight: Option<u32>,
    pub bucket_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub key: String,
    pub version: u64,
    #[serde(default)]
    pub included: HashSet<String>,
    #[serde(default)]
    pub excluded: HashSet<String>,
    #[serde(default)]
    pub rules: Vec<SegmentRule>,
    #[serde(default)]
    pub salt: String,
    #[serde(default)]
    pub deleted: bool,
}

impl VersionedData for Segment {
    fn key(&self) -> &str {
        &self.key
    }
    fn version(&self) -> u64 {
        self.version
    }
}

// ── User ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "lastName")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
    #[serde(default)]
    pub custom: HashMap<String, Value>,
}

impl User {
    pub fn new(key: impl Into<String>) -> Self {
        User {
            key: key.into(),
            secondary: None,
            ip: None,
            country: None,
            email: None,
            first_name: None,
            last_name: None,
            avatar: None,
            name: None,
            anonymous: None,
            custom: HashMap::new(),
        }
    }

    /// Resolve a built-in or custom attribute by name. Built-ins take
    /// precedence over a `custom` entry of the same name.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "key" => Some(Value::String(self.key.clone())),
            "secondary" => self.secondary.clone().map(Value::String),
            "ip" => self.ip.clone().map(Value::String),
            "country" => self.country.clone().map(Value::String),
            "email" => self.email.clone().map(Value::String),
            "firstName" => self.first_name.clone().map(Value::String),
            "lastName" => self.last_name.clone().map(Value::String),
            "avatar" => self.avatar.clone().map(Value::String),
            "name" => self.name.clone().map(Value::String),
            "anonymous" => self.anonymous.map(Value::Bool),
            _ => self.custom.get(name).cloned(),
        }
    }
}

// ── Versioned item / tombstone ────────────────────────────────────────────────

/// A stored item at a given version. `item: None` with a version present is a
/// tombstone: it records that a delete happened at that version so a later,
/// lower-versioned add can be rejected as out-of-order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedItem<T> {
    pub version: u64,
    pub item: Option<T>,
}

impl<T> VersionedItem<T> {
    pub fn present(version: u64, item: T) -> Self {
        VersionedItem { version, item: Some(item) }
    }

    pub fn tombstone(version: u64) -> Self {
        VersionedItem { version, item: None }
    }

    pub fn is_tombstone(&self) -> bool {
        self.item.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_attribute_prefers_builtin_over_custom() {
        let mut u = User::new("u1");
        u.country = Some("US".into());
        u.custom.insert("country".into(), Value::String("CA".into()));
        assert_eq!(u.attribute("country"), Some(Value::String("US".into())));
    }

    #[test]
    fn user_attribute_falls_back_to_custom() {
        let mut u = User::new("u1");
        u.custom.insert("plan".into(), Value::String("gold".into()));
        assert_eq!(u.attribute("plan"), Some(Value::String("gold".into())));
    }

    #[test]
    fn versioned_item_tombstone_has_no_payload() {
        let t: VersionedItem<Flag> = VersionedItem::tombstone(6);
        assert!(t.is_tombstone());
        assert_eq!(t.version, 6);
    }

    #[test]
    fn data_kind_path_segment() {
        assert_eq!(DataKind::Flags.path_segment(), "flags");
        assert_eq!(DataKind::Segments.path_segment(), "segments");
    }
}
