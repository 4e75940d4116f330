use serde_json::{Map, Value};

/// Current wire schema version sent to upstream on every outbound batch.
pub const EVENT_SCHEMA_VERSION: &str = "3";

/// Normalize one event to the current (schema 3) shape described in §4.4:
/// a `feature` event without an explicit `kind` discriminator, or any event
/// carrying the deprecated inline `user` object instead of `userKey`/
/// `contextKeys`, is rewritten in place. Anything already in the current
/// shape passes through unchanged.
pub fn upgrade_legacy_event(mut event: Value) -> Value {
    let Some(obj) = event.as_object_mut() else {
        return event;
    };

    infer_missing_kind(obj);
    upgrade_inline_user(obj);

    event
}

fn infer_missing_kind(obj: &mut Map<String, Value>) {
    if obj.contains_key("kind") {
        return;
    }
    // Legacy `feature` events carried no `kind` field at all; they're
    // recognizable by the `variation`/`value`/`default` triad.
    if obj.contains_key("variation") || obj.contains_key("default") {
        obj.insert("kind".to_string(), Value::String("feature".to_string()));
    }
}

fn upgrade_inline_user(obj: &mut Map<String, Value>) {
    let Some(user) = obj.remove("user") else {
        return;
    };
    let Some(key) = user.get("key").and_then(Value::as_str).map(str::to_string) else {
        // Not a well-formed user object; drop it rather than guess.
        return;
    };

    obj.entry("userKey").or_insert_with(|| Value::String(key.clone()));

    if !obj.contains_key("contextKeys") {
        let mut context_keys = Map::new();
        context_keys.insert("user".to_string(), Value::String(key));
        obj.insert("contextKeys".to_string(), Value::Object(context_keys));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn infers_feature_kind_when_absent() {
        let event = json!({"variation": 1, "default": false, "userKey": "u1"});
        let upgraded = upgrade_legacy_event(event);
        assert_eq!(upgraded["kind"], "feature");
    }

    #[test]
    fn leaves_explicit_kind_untouched() {
        let event = json!({"kind": "custom", "userKey": "u1"});
        let upgraded = upgrade_legacy_event(event.clone());
        assert_eq!(upgraded, event);
    }

    #[test]
    fn rewrites_inline_user_to_user_key_and_context_keys() {
        let event = json!({"kind": "feature", "user": {"key": "u1", "name": "Alice"}});
        let upgraded = upgrade_legacy_event(event);
        assert!(upgraded.get("user").is_none());
        assert_eq!(upgraded["userKey"], "u1");
        assert_eq!(upgraded["contextKeys"]["user"], "u1");
    }

    #[test]
    fn leaves_events_already_on_current_schema_untouched() {
        let event = json!({"kind": "feature", "userKey": "u1", "contextKeys": {"user": "u1"}});
        let upgraded = upgrade_legacy_event(event.clone());
        assert_eq!(upgraded, event);
    }
}
