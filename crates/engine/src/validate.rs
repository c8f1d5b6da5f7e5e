//! Plan validation. Run this before executing a plan.
//!
//! Rules enforced, in order:
//! 1. Plan `id` and `version` are non-empty strings.
//! 2. `steps` is a non-empty array.
//! 3. Every step has a non-empty `id` and `kind`.
//! 4. `timeout_ms` (step or plan default), if present, is a positive integer.
//! 5. `expected_outputs` and `depends_on`, if present, are string arrays.
//! 6. Step IDs are unique.
//! 7. Every `depends_on` entry names a step of the same plan.
//! 8. No step depends on itself.
//!
//! Violations are collected, not short-circuited, so the caller sees every
//! defect in one pass. Validation never fails or panics.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::OrchestratorPlan;

/// Outcome of validating a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validate a typed plan.
pub fn validate_plan(plan: &OrchestratorPlan) -> ValidationReport {
    match serde_json::to_value(plan) {
        Ok(value) => validate_plan_value(&value),
        Err(e) => ValidationReport::from_errors(vec![format!("plan is not serializable: {e}")]),
    }
}

/// Validate a raw JSON plan document.
pub fn validate_plan_value(plan: &Value) -> ValidationReport {
    let mut errors = Vec::new();

    let Some(obj) = plan.as_object() else {
        return ValidationReport::from_errors(vec!["plan: must be a JSON object".into()]);
    };

    // -----------------------------------------------------------------------
    // 1. Plan identity
    // -----------------------------------------------------------------------
    for field in ["id", "version"] {
        if !is_non_empty_str(obj.get(field)) {
            errors.push(format!("plan.{field}: must be a non-empty string"));
        }
    }
    check_timeout(obj.get("default_timeout_ms"), "plan.default_timeout_ms", &mut errors);

    // -----------------------------------------------------------------------
    // 2. Steps array
    // -----------------------------------------------------------------------
    let steps = match obj.get("steps") {
        Some(Value::Array(steps)) if !steps.is_empty() => steps.as_slice(),
        _ => {
            errors.push("plan.steps: must be a non-empty array".into());
            &[][..]
        }
    };

    // -----------------------------------------------------------------------
    // 3-5. Per-step shape
    // -----------------------------------------------------------------------
    let mut step_ids: Vec<Option<&str>> = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        let Some(step) = step.as_object() else {
            errors.push(format!("steps[{i}]: must be a JSON object"));
            step_ids.push(None);
            continue;
        };

        let id = step.get("id").and_then(Value::as_str).filter(|s| !s.is_empty());
        if id.is_none() {
            errors.push(format!("steps[{i}].id: must be a non-empty string"));
        }
        if !is_non_empty_str(step.get("kind")) {
            errors.push(format!("steps[{i}].kind: must be a non-empty string"));
        }
        check_timeout(step.get("timeout_ms"), &format!("steps[{i}].timeout_ms"), &mut errors);
        for field in ["expected_outputs", "depends_on"] {
            if let Some(v) = step.get(field) {
                if !v.is_null() && !is_string_array(v) {
                    errors.push(format!("steps[{i}].{field}: must be an array of strings"));
                }
            }
        }

        step_ids.push(id);
    }

    // -----------------------------------------------------------------------
    // 6. Unique IDs
    // -----------------------------------------------------------------------
    let mut seen: HashSet<&str> = HashSet::new();
    let mut reported: HashSet<&str> = HashSet::new();
    for id in step_ids.iter().flatten().copied() {
        if !seen.insert(id) && reported.insert(id) {
            errors.push(format!("duplicate step id '{id}'"));
        }
    }

    // -----------------------------------------------------------------------
    // 7-8. Dependency references
    // -----------------------------------------------------------------------
    for (i, step) in steps.iter().enumerate() {
        let Some(deps) = step.get("depends_on").and_then(Value::as_array) else {
            continue;
        };
        let label = step_ids[i].map_or_else(|| format!("steps[{i}]"), |id| format!("step '{id}'"));
        for dep in deps.iter().filter_map(Value::as_str) {
            if !seen.contains(dep) {
                errors.push(format!("{label} depends on unknown step '{dep}'"));
            }
            if step_ids[i] == Some(dep) {
                errors.push(format!("{label} depends on itself"));
            }
        }
    }

    ValidationReport::from_errors(errors)
}

fn is_non_empty_str(v: Option<&Value>) -> bool {
    v.and_then(Value::as_str).is_some_and(|s| !s.is_empty())
}

fn is_string_array(v: &Value) -> bool {
    v.as_array().is_some_and(|a| a.iter().all(Value::is_string))
}

fn check_timeout(v: Option<&Value>, label: &str, errors: &mut Vec<String>) {
    match v {
        None | Some(Value::Null) => {}
        Some(v) if v.as_u64().is_some_and(|ms| ms > 0) => {}
        Some(_) => errors.push(format!("{label}: must be a positive integer")),
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PlanBuilder;
    use crate::models::PlanStep;
    use serde_json::json;

    #[test]
    fn valid_linear_plan() {
        let plan = PlanBuilder::new("p1", "1.0")
            .add_step(PlanStep::new("a", "noop"))
            .add_step(PlanStep::new("b", "noop").depends_on(["a"]))
            .build_unsafe();
        let report = validate_plan(&plan);
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn empty_identity_and_steps_are_reported() {
        let report = validate_plan_value(&json!({ "id": "", "steps": [] }));
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec![
                "plan.id: must be a non-empty string",
                "plan.version: must be a non-empty string",
                "plan.steps: must be a non-empty array",
            ]
        );
    }

    #[test]
    fn duplicate_id_and_dangling_dependency_are_both_reported() {
        let plan = PlanBuilder::new("p1", "1.0")
            .add_step(PlanStep::new("a", "noop"))
            .add_step(PlanStep::new("a", "noop"))
            .add_step(PlanStep::new("c", "noop").depends_on(["ghost"]))
            .build_unsafe();
        let report = validate_plan(&plan);
        assert!(!report.valid);
        assert!(report.errors.contains(&"duplicate step id 'a'".to_string()));
        assert!(report
            .errors
            .contains(&"step 'c' depends on unknown step 'ghost'".to_string()));
    }

    #[test]
    fn self_dependency_is_rejected() {
        let plan = PlanBuilder::new("p1", "1.0")
            .add_step(PlanStep::new("a", "noop").depends_on(["a"]))
            .build_unsafe();
        let report = validate_plan(&plan);
        assert_eq!(report.errors, vec!["step 'a' depends on itself"]);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let plan = PlanBuilder::new("p1", "1.0")
            .add_step(PlanStep::new("a", "noop").timeout_ms(0))
            .build_unsafe();
        let report = validate_plan(&plan);
        assert_eq!(report.errors, vec!["steps[0].timeout_ms: must be a positive integer"]);
    }

    #[test]
    fn raw_shape_errors_are_collected() {
        let report = validate_plan_value(&json!({
            "id": "p1",
            "version": "1.0",
            "steps": [
                { "id": "a", "kind": "", "timeout_ms": -5, "depends_on": "b" },
                { "id": "b", "kind": "noop", "expected_outputs": [1, 2], "timeout_ms": 1.5 },
                "not-an-object"
            ]
        }));
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec![
                "steps[0].kind: must be a non-empty string",
                "steps[0].timeout_ms: must be a positive integer",
                "steps[0].depends_on: must be an array of strings",
                "steps[1].timeout_ms: must be a positive integer",
                "steps[1].expected_outputs: must be an array of strings",
                "steps[2]: must be a JSON object",
            ]
        );
    }

    #[test]
    fn non_object_plan_is_rejected() {
        let report = validate_plan_value(&json!([1, 2, 3]));
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn forward_reference_is_valid() {
        let plan = PlanBuilder::new("p1", "1.0")
            .add_step(PlanStep::new("a", "noop").depends_on(["b"]))
            .add_step(PlanStep::new("b", "noop"))
            .build_unsafe();
        assert!(validate_plan(&plan).valid);
    }
}
