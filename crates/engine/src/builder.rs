//! Fluent construction of [`OrchestratorPlan`]s.

use std::collections::BTreeMap;
use std::sync::Arc;

use adapters::ContextSnapshot;
use serde_json::Value;

use crate::error::EngineError;
use crate::hooks::{FnHooks, PlanHooks, StepHooks};
use crate::models::{OrchestratorPlan, PlanStep, StepResult};
use crate::validate::validate_plan;

pub struct PlanBuilder {
    id: String,
    version: String,
    steps: Vec<PlanStep>,
    default_timeout_ms: Option<u64>,
    metadata: BTreeMap<String, Value>,
    fn_hooks: FnHooks,
    observer: Option<Arc<dyn StepHooks>>,
}

impl PlanBuilder {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            steps: Vec::new(),
            default_timeout_ms: None,
            metadata: BTreeMap::new(),
            fn_hooks: FnHooks::default(),
            observer: None,
        }
    }

    pub fn add_step(mut self, step: PlanStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn on_pre_step<F>(mut self, f: F) -> Self
    where
        F: Fn(&PlanStep, &ContextSnapshot) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.fn_hooks = self.fn_hooks.on_pre_step(f);
        self
    }

    pub fn on_post_step<F>(mut self, f: F) -> Self
    where
        F: Fn(&PlanStep, &StepResult) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.fn_hooks = self.fn_hooks.on_post_step(f);
        self
    }

    /// Attach a custom observer. Takes precedence over closure hooks.
    pub fn with_hooks(mut self, hooks: impl StepHooks + 'static) -> Self {
        self.observer = Some(Arc::new(hooks));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn default_timeout_ms(mut self, ms: u64) -> Self {
        self.default_timeout_ms = Some(ms);
        self
    }

    /// Validate and return the plan.
    ///
    /// # Errors
    /// [`EngineError::InvalidPlan`] aggregating every validation issue.
    pub fn build(self) -> Result<OrchestratorPlan, EngineError> {
        let plan = self.build_unsafe();
        let report = validate_plan(&plan);
        if report.valid {
            Ok(plan)
        } else {
            Err(EngineError::InvalidPlan { errors: report.errors })
        }
    }

    /// Return the plan without validating it.
    pub fn build_unsafe(self) -> OrchestratorPlan {
        let hooks = match self.observer {
            Some(observer) => Some(PlanHooks::from_arc(observer)),
            None if self.fn_hooks.is_empty() => None,
            None => Some(PlanHooks::new(self.fn_hooks)),
        };

        OrchestratorPlan {
            id: self.id,
            version: self.version,
            steps: self.steps,
            default_timeout_ms: self.default_timeout_ms,
            metadata: self.metadata,
            hooks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_valid_plan() {
        let plan = PlanBuilder::new("p1", "1.0")
            .add_step(PlanStep::new("a", "noop"))
            .add_step(PlanStep::new("b", "echo").depends_on(["a"]).with_input(json!(1)))
            .with_metadata("owner", json!("ops"))
            .default_timeout_ms(500)
            .build()
            .unwrap();

        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.metadata["owner"], json!("ops"));
        assert_eq!(plan.default_timeout_ms, Some(500));
        assert!(plan.hooks.is_none());
    }

    #[test]
    fn build_aggregates_errors() {
        let err = PlanBuilder::new("", "1.0")
            .add_step(PlanStep::new("a", "noop").depends_on(["missing"]))
            .build()
            .unwrap_err();

        match err {
            EngineError::InvalidPlan { errors } => {
                assert_eq!(errors.len(), 2, "{errors:?}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn build_unsafe_skips_validation() {
        let plan = PlanBuilder::new("p1", "1.0").build_unsafe();
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn closure_hooks_are_attached() {
        let plan = PlanBuilder::new("p1", "1.0")
            .add_step(PlanStep::new("a", "noop"))
            .on_pre_step(|_, _| Ok(()))
            .build()
            .unwrap();
        assert!(plan.hooks.is_some());
    }
}
