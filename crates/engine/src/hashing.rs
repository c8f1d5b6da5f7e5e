//! Canonical JSON and SHA-256 helpers, plus the run-result hash projection.
//!
//! The projection is what the engine promises to reproduce: identical plan,
//! seed, and adapter behaviour yield an identical hash.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::models::RunResult;

/// Which fields of a [`RunResult`] feed its hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashPolicy {
    /// Identity, statuses, outputs, and errors only. Stable under any clock.
    #[default]
    Semantic,
    /// Also folds per-step and overall `duration_ms` into the hash. Only
    /// reproducible when the run context uses a deterministic clock.
    IncludeTimings,
}

/// Serialise `value` with object keys sorted at every level.
pub fn to_canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(&Value::String(key.clone()), out);
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        // Scalars: serde_json's own rendering is already canonical.
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

/// Lowercase hex SHA-256 of a string.
pub fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// SHA-256 of the canonical form of `value`.
pub fn hash_value(value: &Value) -> String {
    sha256_hex(&to_canonical_json(value))
}

/// The hashable projection of a run result under `policy`.
///
/// Error records contribute `code`, `message`, and `context`; their
/// timestamps never do. `started_at` / `completed_at` and the `hash` field
/// itself are always excluded.
pub fn result_projection(result: &RunResult, policy: HashPolicy) -> Value {
    let with_timings = policy == HashPolicy::IncludeTimings;

    let steps: Vec<Value> = result
        .steps
        .iter()
        .map(|s| {
            let mut step = json!({
                "step_id": s.step_id,
                "kind": s.kind,
                "status": s.status,
                "output": s.output,
                "error": s.error.as_ref().map(|e| json!({
                    "code": e.code,
                    "message": e.message,
                    "context": e.context,
                })),
            });
            if with_timings {
                step["duration_ms"] = json!(s.duration_ms);
            }
            step
        })
        .collect();

    let mut projection = json!({
        "run_id": result.run_id,
        "plan_id": result.plan_id,
        "status": result.status,
        "steps": steps,
        "error": result.error.as_ref().map(|e| json!({
            "code": e.code,
            "message": e.message,
        })),
    });
    if with_timings {
        projection["duration_ms"] = json!(result.duration_ms);
    }
    projection
}

/// Hash a run result under `policy`.
pub fn result_hash(result: &RunResult, policy: HashPolicy) -> String {
    hash_value(&result_projection(result, policy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let a = json!({ "b": 1, "a": { "z": [1, {"y": 2, "x": 1}], "c": null } });
        assert_eq!(
            to_canonical_json(&a),
            r#"{"a":{"c":null,"z":[1,{"x":1,"y":2}]},"b":1}"#
        );
    }

    #[test]
    fn canonical_json_escapes_strings() {
        assert_eq!(to_canonical_json(&json!("a\"b\n")), r#""a\"b\n""#);
    }

    #[test]
    fn hash_is_key_order_independent() {
        let left: Value = serde_json::from_str(r#"{"x":1,"y":[true,"s"]}"#).unwrap();
        let right: Value = serde_json::from_str(r#"{"y":[true,"s"],"x":1}"#).unwrap();
        assert_eq!(hash_value(&left), hash_value(&right));
    }

    #[test]
    fn sha256_of_empty_string() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
