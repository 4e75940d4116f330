use relay_domain::{Flag, User, VariationOrRollout};
use serde_json::Value;

use crate::bucket::bucket_value;
use crate::clause::{rule_matches, SegmentSource};
use crate::error::EvalError;
use crate::reason::{EvalDetail, PrerequisiteEvent, Reason};

/// Bounded to match the source's recursive prerequisite walk; a chain this
/// deep is treated as malformed rather than stack-overflowing.
const MAX_PREREQUISITE_DEPTH: u32 = 32;

/// Resolves flags (for prerequisites) and segments (for `segmentMatch`
/// clauses) against the live store. Kept synchronous: evaluation never
/// performs I/O, it only reads a snapshot handed to it by the caller.
pub trait FlagSource: SegmentSource {
    fn flag(&self, key: &str) -> Option<Flag>;
}

pub fn evaluate(flag: &Flag, user: &User, source: &dyn FlagSource) -> EvalDetail {
    if user.key.is_empty() {
        return error_detail(EvalError::UserNotSpecified);
    }
    evaluate_at_depth(flag, user, source, 0)
}

fn evaluate_at_depth(flag: &Flag, user: &User, source: &dyn FlagSource, depth: u32) -> EvalDetail {
    if depth >= MAX_PREREQUISITE_DEPTH {
        return error_detail(EvalError::MalformedFlag);
    }

    let mut prerequisite_events = Vec::new();
    if let Some(reason) = check_prerequisites(flag, user, source, depth, &mut prerequisite_events) {
        return with_events(off_variation_detail(flag, reason), prerequisite_events);
    }

    if !flag.on {
        return with_events(off_variation_detail(flag, Reason::Off), prerequisite_events);
    }

    for target in &flag.targets {
        if target.values.iter().any(|v| v == &user.key) {
            return with_events(variation_detail(flag, target.variation, Reason::TargetMatch), prerequisite_events);
        }
    }

    for (index, rule) in flag.rules.iter().enumerate() {
        if rule_matches(&rule.clauses, user, source) {
            let detail = resolve_variation_or_rollout(flag, &rule.then, user, |in_experiment| Reason::RuleMatch {
                rule_index: index,
                rule_id: rule.id.clone(),
                in_experiment,
            });
            return with_events(detail, prerequisite_events);
        }
    }

    let detail = resolve_variation_or_rollout(flag, &flag.fallthrough, user, |in_experiment| Reason::Fallthrough { in_experiment });
    with_events(detail, prerequisite_events)
}

/// Walks `flag`'s declared prerequisites in order. Returns `Some(reason)` —
/// either `PrerequisiteFailed` or `Error(MalformedFlag)` for cycles/depth
/// overflow — the moment one fails; `None` once all are satisfied.
fn check_prerequisites(
    flag: &Flag,
    user: &User,
    source: &dyn FlagSource,
    depth: u32,
    events: &mut Vec<PrerequisiteEvent>,
) -> Option<Reason> {
    for prereq in &flag.prerequisites {
        let prereq_flag = match source.flag(&prereq.key) {
            Some(f) => f,
            None => return Some(Reason::PrerequisiteFailed { prerequisite_key: prereq.key.clone() }),
        };

        let detail = evaluate_at_depth(&prereq_flag, user, source, depth + 1);
        if matches!(detail.reason, Reason::Error { error_kind: EvalError::MalformedFlag }) {
            return Some(Reason::Error { error_kind: EvalError::MalformedFlag });
        }

        events.push(PrerequisiteEvent {
            flag_key: prereq_flag.key.clone(),
            variation_index: detail.variation_index,
            value: detail.value.clone(),
        });

        if !prereq_flag.on || detail.variation_index != Some(prereq.variation) {
            return Some(Reason::PrerequisiteFailed { prerequisite_key: prereq.key.clone() });
        }
    }
    None
}

fn resolve_variation_or_rollout(
    flag: &Flag,
    then: &VariationOrRollout,
    user: &User,
    reason_for: impl Fn(bool) -> Reason,
) -> EvalDetail {
    if let Some(variation) = then.variation {
        return variation_detail(flag, variation, reason_for(false));
    }
    let Some(rollout) = &then.rollout else {
        return error_detail(EvalError::MalformedFlag);
    };
    if rollout.variations.is_empty() {
        return error_detail(EvalError::MalformedFlag);
    }

    let point = bucket_value(user, &flag.key, &flag.salt, rollout.seed, &rollout.bucket_by);
    let mut cumulative: u32 = 0;
    let last = rollout.variations.len() - 1;
    for (i, wv) in rollout.variations.iter().enumerate() {
        cumulative += wv.weight;
        let threshold = (cumulative as f64) / 100_000.0;
        if point < threshold || i == last {
            let in_experiment = matches!(rollout.kind, relay_domain::RolloutKind::Experiment);
            return variation_detail(flag, wv.variation, reason_for(in_experiment));
        }
    }
    error_detail(EvalError::MalformedFlag)
}

fn variation_detail(flag: &Flag, variation: usize, reason: Reason) -> EvalDetail {
    match flag.variations.get(variation) {
        Some(value) => EvalDetail { value: value.clone(), variation_index: Some(variation), reason, prerequisite_events: vec![] },
        None => error_detail(EvalError::MalformedFlag),
    }
}

fn off_variation_detail(flag: &Flag, reason: Reason) -> EvalDetail {
    match flag.off_variation {
        Some(index) => variation_detail(flag, index, reason),
        None => EvalDetail { value: Value::Null, variation_index: None, reason, prerequisite_events: vec![] },
    }
}

fn error_detail(error: EvalError) -> EvalDetail {
    EvalDetail { value: Value::Null, variation_index: None, reason: Reason::Error { error_kind: error }, prerequisite_events: vec![] }
}

fn with_events(mut detail: EvalDetail, events: Vec<PrerequisiteEvent>) -> EvalDetail {
    detail.prerequisite_events = events;
    detail
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_domain::{Rollout, RolloutKind, Rule, Segment, Target, WeightedVariation};
    use std::collections::HashMap;

    struct FakeSource(HashMap<String, Flag>);
    impl SegmentSource for FakeSource {
        fn segment(&self, _key: &str) -> Option<Segment> {
            None
        }
    }
    impl FlagSource for FakeSource {
        fn flag(&self, key: &str) -> Option<Flag> {
            self.0.get(key).cloned()
        }
    }

    fn base_flag(key: &str) -> Flag {
        Flag {
            key: key.to_string(),
            version: 1,
            on: true,
            variations: vec![Value::Bool(false), Value::Bool(true)],
            targets: vec![],
            rules: vec![],
            fallthrough: VariationOrRollout { variation: Some(0), rollout: None },
            off_variation: Some(0),
            prerequisites: vec![],
            salt: "s".into(),
            client_side_availability: Default::default(),
            track_events: false,
            track_events_fallthrough: false,
            debug_events_until_date: None,
            deleted: false,
        }
    }

    #[test]
    fn off_flag_returns_off_variation() {
        let mut flag = base_flag("f");
        flag.on = false;
        let user = User::new("u1");
        let detail = evaluate(&flag, &user, &FakeSource(HashMap::new()));
        assert_eq!(detail.reason, Reason::Off);
        assert_eq!(detail.variation_index, Some(0));
    }

    #[test]
    fn target_match_takes_precedence_over_fallthrough() {
        let mut flag = base_flag("f");
        flag.targets.push(Target { variation: 1, values: vec!["u1".into()] });
        let user = User::new("u1");
        let detail = evaluate(&flag, &user, &FakeSource(HashMap::new()));
        assert_eq!(detail.reason, Reason::TargetMatch);
        assert_eq!(detail.variation_index, Some(1));
    }

    #[test]
    fn fallthrough_is_used_when_nothing_else_matches() {
        let flag = base_flag("f");
        let user = User::new("u1");
        let detail = evaluate(&flag, &user, &FakeSource(HashMap::new()));
        assert_eq!(detail.reason, Reason::Fallthrough { in_experiment: false });
        assert_eq!(detail.value, Value::Bool(false));
    }

    #[test]
    fn missing_prerequisite_fails_closed() {
        let mut flag = base_flag("f");
        flag.prerequisites.push(relay_domain::Prerequisite { key: "missing".into(), variation: 0 });
        let user = User::new("u1");
        let detail = evaluate(&flag, &user, &FakeSource(HashMap::new()));
        assert_eq!(detail.reason, Reason::PrerequisiteFailed { prerequisite_key: "missing".into() });
    }

    #[test]
    fn satisfied_prerequisite_allows_fallthrough_and_records_event() {
        let mut flag = base_flag("f");
        flag.prerequisites.push(relay_domain::Prerequisite { key: "dep".into(), variation: 1 });
        let mut dep = base_flag("dep");
        dep.fallthrough = VariationOrRollout { variation: Some(1), rollout: None };

        let mut flags = HashMap::new();
        flags.insert("dep".to_string(), dep);
        let user = User::new("u1");
        let detail = evaluate(&flag, &user, &FakeSource(flags));
        assert_eq!(detail.reason, Reason::Fallthrough { in_experiment: false });
        assert_eq!(detail.prerequisite_events.len(), 1);
        assert_eq!(detail.prerequisite_events[0].flag_key, "dep");
    }

    #[test]
    fn wrong_prerequisite_variation_fails_closed() {
        let mut flag = base_flag("f");
        flag.prerequisites.push(relay_domain::Prerequisite { key: "dep".into(), variation: 1 });
        let dep = base_flag("dep"); // dep falls through to variation 0, not 1
        let mut flags = HashMap::new();
        flags.insert("dep".to_string(), dep);
        let user = User::new("u1");
        let detail = evaluate(&flag, &user, &FakeSource(flags));
        assert_eq!(detail.reason, Reason::PrerequisiteFailed { prerequisite_key: "dep".into() });
    }

    #[test]
    fn deep_prerequisite_chain_is_malformed() {
        let mut flags = HashMap::new();
        for i in 0..40 {
            let mut f = base_flag(&format!("f{i}"));
            if i > 0 {
                f.prerequisites.push(relay_domain::Prerequisite { key: format!("f{}", i - 1), variation: 0 });
            }
            f.off_variation = Some(0);
            flags.insert(format!("f{i}"), f);
        }
        let top = flags.get("f39").unwrap().clone();
        let user = User::new("u1");
        let detail = evaluate(&top, &user, &FakeSource(flags));
        assert!(matches!(detail.reason, Reason::Error { error_kind: EvalError::MalformedFlag }));
    }

    #[test]
    fn rollout_picks_first_bucket_exceeding_point() {
        let mut flag = base_flag("roll");
        flag.salt = "abc".into();
        flag.fallthrough = VariationOrRollout {
            variation: None,
            rollout: Some(Rollout {
                variations: vec![
                    WeightedVariation { variation: 0, weight: 50_000 },
                    WeightedVariation { variation: 1, weight: 50_000 },
                ],
                bucket_by: "key".into(),
                kind: RolloutKind::Rollout,
                seed: None,
            }),
        };
        let user = User::new("user-A");
        let detail = evaluate(&flag, &user, &FakeSource(HashMap::new()));
        // bucket_value("roll","abc","user-A") ≈ 0.4428 < 0.5 -> first bucket.
        assert_eq!(detail.variation_index, Some(0));
    }

    #[test]
    fn last_rollout_bucket_absorbs_rounding_slack() {
        let mut flag = base_flag("roll");
        flag.salt = "abc".into();
        flag.fallthrough = VariationOrRollout {
            variation: None,
            rollout: Some(Rollout {
                variations: vec![WeightedVariation { variation: 1, weight: 1 }],
                bucket_by: "key".into(),
                kind: RolloutKind::Rollout,
                seed: None,
            }),
        };
        let user = User::new("user-A");
        let detail = evaluate(&flag, &user, &FakeSource(HashMap::new()));
        assert_eq!(detail.variation_index, Some(1));
    }

    #[test]
    fn rule_match_short_circuits_fallthrough() {
        let mut flag = base_flag("f");
        flag.rules.push(Rule {
            id: "r1".into(),
            clauses: vec![],
            then: VariationOrRollout { variation: Some(1), rollout: None },
            track_events: false,
        });
        let user = User::new("u1");
        let detail = evaluate(&flag, &user, &FakeSource(HashMap::new()));
        assert_eq!(detail.reason, Reason::RuleMatch { rule_index: 0, rule_id: "r1".into(), in_experiment: false });
        assert_eq!(detail.variation_index, Some(1));
    }

    #[test]
    fn empty_user_key_is_an_evaluation_error() {
        let flag = base_flag("f");
        let user = User::new("");
        let detail = evaluate(&flag, &user, &FakeSource(HashMap::new()));
        assert!(matches!(detail.reason, Reason::Error { error_kind: EvalError::UserNotSpecified }));
    }
}
