use relay_domain::User;
use sha1::{Digest, Sha1};

/// Denominator used to project the first 15 hex digits of a SHA-1 digest
/// into `[0, 1)`. `0xFFFFFFFFFFFFFFF` is exactly `16^15 - 1`.
const LONG_SCALE: f64 = 0xFFFFFFFFFFFFFFFu64 as f64;

/// Compute the bucketing string for a user: `user[bucketBy]`, with
/// `"." + user.secondary` appended when a secondary key is set. Returns
/// `None` when the bucketing attribute is absent (spec: bucket 0).
fn bucketable_id(user: &User, bucket_by: &str) -> Option<String> {
    let value = user.attribute(bucket_by)?;
    let base = match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    match &user.secondary {
        Some(secondary) => Some(format!("{}.{}", base, secondary)),
        None => Some(base),
    }
}

/// Bucket a user into `[0, 1)` for the given flag/segment key, salt, seed and
/// bucketing attribute. Deterministic per `(key, salt, seed, id)` — see
/// the hashing invariant in the evaluator spec.
pub fn bucket_value(user: &User, key: &str, salt: &str, seed: Option<i64>, bucket_by: &str) -> f64 {
    let id = match bucketable_id(user, bucket_by) {
        Some(id) => id,
        None => return 0.0,
    };

    let hash_input = match seed {
        Some(seed) => format!("{}.{}", seed, id),
        None => format!("{}.{}.{}", key, salt, id),
    };

    let mut hasher = Sha1::new();
    hasher.update(hash_input.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    let prefix = &hex[..15];
    let as_int = u64::from_str_radix(prefix, 16).unwrap_or(0);
    (as_int as f64) / LONG_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_value_is_deterministic() {
        let user = User::new("user-A");
        let a = bucket_value(&user, "roll", "abc", None, "key");
        let b = bucket_value(&user, "roll", "abc", None, "key");
        assert_eq!(a, b);
        assert!(a >= 0.0 && a < 1.0);
    }

    #[test]
    fn bucket_value_golden() {
        // sha1("roll.abc.user-A") = 715d7f1862f9578...; first 15 hex chars
        // 715d7f1862f9578 / 0xFFFFFFFFFFFFFFF.
        let user = User::new("user-A");
        let point = bucket_value(&user, "roll", "abc", None, "key");
        assert_eq!(point, 0.44283289285065075);
    }

    #[test]
    fn missing_bucket_by_attribute_yields_zero() {
        let user = User::new("user-A");
        let point = bucket_value(&user, "roll", "abc", None, "planet");
        assert_eq!(point, 0.0);
    }

    #[test]
    fn seed_changes_the_hash_input() {
        let user = User::new("user-A");
        let without_seed = bucket_value(&user, "roll", "abc", None, "key");
        let with_seed = bucket_value(&user, "roll", "abc", Some(42), "key");
        assert_ne!(without_seed, with_seed);
    }
}
