use chrono::{DateTime, Utc};
use regex::Regex;
use relay_domain::{Clause, Operator, Segment, User};
use serde_json::Value;

/// Looks up a segment referenced by a `segmentMatch` clause. Kept separate
/// from the store crate's async interface so evaluation stays a pure,
/// synchronous function of its inputs.
pub trait SegmentSource {
    fn segment(&self, key: &str) -> Option<Segment>;
}

impl SegmentSource for () {
    fn segment(&self, _key: &str) -> Option<Segment> {
        None
    }
}

pub fn clause_matches(clause: &Clause, user: &User, segments: &dyn SegmentSource) -> bool {
    let result = match clause.op {
        Operator::SegmentMatch => clause
            .values
            .iter()
            .filter_map(|v| v.as_str())
            .any(|key| match segments.segment(key) {
                Some(segment) => segment_matches(&segment, user, segments),
                None => false,
            }),
        _ => match user.attribute(&clause.attribute) {
            Some(Value::Array(items)) => items.iter().any(|item| value_matches(clause, item)),
            Some(value) => value_matches(clause, &value),
            None => false,
        },
    };
    if clause.negate {
        !result
    } else {
        result
    }
}

pub fn rule_matches(clauses: &[Clause], user: &User, segments: &dyn SegmentSource) -> bool {
    clauses.iter().all(|c| clause_matches(c, user, segments))
}

/// Does `user` fall inside `segment`, honoring explicit include/exclude
/// before falling back to its weighted rules?
pub fn segment_matches(segment: &Segment, user: &User, segments: &dyn SegmentSource) -> bool {
    if segment.included.contains(&user.key) {
        return true;
    }
    if segment.excluded.contains(&user.key) {
        return false;
    }
    for rule in &segment.rules {
        if !rule_matches(&rule.clauses, user, segments) {
            continue;
        }
        match rule.weight {
            None => return true,
            Some(weight) => {
                let bucket_by = rule.bucket_by.as_deref().unwrap_or("key");
                let point = crate::bucket::bucket_value(user, &segment.key, &segment.salt, None, bucket_by);
                if point < (weight as f64) / 100_000.0 {
                    return true;
                }
            }
        }
    }
    false
}

fn value_matches(clause: &Clause, value: &Value) -> bool {
    clause.values.iter().any(|candidate| match clause.op {
        Operator::In => values_equal(candidate, value),
        Operator::EndsWith => string_op(candidate, value, |c, v| v.ends_with(c)),
        Operator::StartsWith => string_op(candidate, value, |c, v| v.starts_with(c)),
        Operator::Contains => string_op(candidate, value, |c, v| v.contains(c)),
        Operator::Matches => string_op(candidate, value, |pattern, v| {
            Regex::new(pattern).map(|re| re.is_match(v)).unwrap_or(false)
        }),
        Operator::LessThan => numeric_op(candidate, value, |c, v| v < c),
        Operator::LessThanOrEqual => numeric_op(candidate, value, |c, v| v <= c),
        Operator::GreaterThan => numeric_op(candidate, value, |c, v| v > c),
        Operator::GreaterThanOrEqual => numeric_op(candidate, value, |c, v| v >= c),
        Operator::Before => time_op(candidate, value, |c, v| v < c),
        Operator::After => time_op(candidate, value, |c, v| v > c),
        Operator::SemVerEqual => semver_op(candidate, value, |c, v| v == c),
        Operator::SemVerLessThan => semver_op(candidate, value, |c, v| v < c),
        Operator::SemVerGreaterThan => semver_op(candidate, value, |c, v| v > c),
        Operator::SegmentMatch => false,
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b
}

fn string_op(candidate: &Value, value: &Value, f: impl Fn(&str, &str) -> bool) -> bool {
    match (candidate.as_str(), value.as_str()) {
        (Some(c), Some(v)) => f(c, v),
        _ => false,
    }
}

fn numeric_op(candidate: &Value, value: &Value, f: impl Fn(f64, f64) -> bool) -> bool {
    match (candidate.as_f64(), value.as_f64()) {
        (Some(c), Some(v)) => f(c, v),
        _ => false,
    }
}

fn time_op(candidate: &Value, value: &Value, f: impl Fn(DateTime<Utc>, DateTime<Utc>) -> bool) -> bool {
    match (parse_timestamp(candidate), parse_timestamp(value)) {
        (Some(c), Some(v)) => f(v, c),
        _ => false,
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(millis) = value.as_i64() {
        return DateTime::from_timestamp_millis(millis);
    }
    if let Some(s) = value.as_str() {
        return DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc));
    }
    None
}

/// Compare two (possibly partial) semantic versions, right-padding the
/// shorter with zero components.
fn semver_op(candidate: &Value, value: &Value, f: impl Fn(SemVer, SemVer) -> bool) -> bool {
    match (candidate.as_str().and_then(parse_semver), value.as_str().and_then(parse_semver)) {
        (Some(c), Some(v)) => f(v, c),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SemVer(u64, u64, u64);

fn parse_semver(s: &str) -> Option<SemVer> {
    let core = s.split(['-', '+']).next().unwrap_or(s);
    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map(|p| p.parse().ok()).unwrap_or(Some(0))?;
    let patch = parts.next().map(|p| p.parse().ok()).unwrap_or(Some(0))?;
    Some(SemVer(major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_domain::SegmentRule;

    fn clause(attribute: &str, op: Operator, values: Vec<Value>, negate: bool) -> Clause {
        Clause { attribute: attribute.to_string(), op, values, negate }
    }

    #[test]
    fn in_operator_matches_scalar() {
        let mut user = User::new("u1");
        user.custom.insert("plan".into(), Value::String("gold".into()));
        let c = clause("plan", Operator::In, vec![Value::String("gold".into())], false);
        assert!(clause_matches(&c, &user, &()));
    }

    #[test]
    fn negate_inverts_result() {
        let mut user = User::new("u1");
        user.country = Some("US".into());
        let c = clause("country", Operator::In, vec![Value::String("CA".into())], true);
        assert!(clause_matches(&c, &user, &()));
    }

    #[test]
    fn array_attribute_matches_any_element() {
        let mut user = User::new("u1");
        user.custom.insert(
            "groups".into(),
            Value::Array(vec![Value::String("beta".into()), Value::String("alpha".into())]),
        );
        let c = clause("groups", Operator::In, vec![Value::String("alpha".into())], false);
        assert!(clause_matches(&c, &user, &()));
    }

    #[test]
    fn missing_attribute_does_not_match() {
        let user = User::new("u1");
        let c = clause("nope", Operator::In, vec![Value::String("x".into())], false);
        assert!(!clause_matches(&c, &user, &()));
    }

    #[test]
    fn numeric_less_than() {
        let mut user = User::new("u1");
        user.custom.insert("age".into(), Value::from(10));
        let c = clause("age", Operator::LessThan, vec![Value::from(20)], false);
        assert!(clause_matches(&c, &user, &()));
    }

    #[test]
    fn semver_greater_than_pads_partial_versions() {
        let mut user = User::new("u1");
        user.custom.insert("version".into(), Value::String("2.1".into()));
        let c = clause("version", Operator::SemVerGreaterThan, vec![Value::String("2.0.9".into())], false);
        assert!(clause_matches(&c, &user, &()));
    }

    #[test]
    fn type_mismatch_is_false_not_error() {
        let mut user = User::new("u1");
        user.custom.insert("age".into(), Value::String("not-a-number".into()));
        let c = clause("age", Operator::LessThan, vec![Value::from(20)], false);
        assert!(!clause_matches(&c, &user, &()));
    }

    struct FakeSegments(Vec<Segment>);
    impl SegmentSource for FakeSegments {
        fn segment(&self, key: &str) -> Option<Segment> {
            self.0.iter().find(|s| s.key == key).cloned()
        }
    }

    #[test]
    fn segment_match_checks_included_set() {
        let segment = Segment {
            key: "seg".into(),
            version: 1,
            included: ["u1".to_string()].into_iter().collect(),
            excluded: Default::default(),
            rules: vec![],
            salt: "s".into(),
            deleted: false,
        };
        let user = User::new("u1");
        let c = clause("", Operator::SegmentMatch, vec![Value::String("seg".into())], false);
        assert!(clause_matches(&c, &user, &FakeSegments(vec![segment])));
    }

    #[test]
    fn segment_match_excluded_wins_over_rules() {
        let segment = Segment {
            key: "seg".into(),
            version: 1,
            included: Default::default(),
            excluded: ["u1".to_string()].into_iter().collect(),
            rules: vec![SegmentRule { clauses: vec![], weight: None, bucket_by: None }],
            salt: "s".into(),
            deleted: false,
        };
        let user = User::new("u1");
        assert!(!segment_matches(&segment, &user, &FakeSegments(vec![])));
    }
}
