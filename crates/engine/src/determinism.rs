//! Determinism guard: execute a plan repeatedly under one seed and prove the
//! results hash identically.

use std::sync::Arc;

use adapters::{AdapterRegistry, ContextError, DeterministicClock, RunContext};
use tracing::{error, info, instrument};

use crate::error::EngineError;
use crate::executor::Executor;
use crate::models::RunResult;

/// Successful guard outcome.
#[derive(Debug, Clone)]
pub struct DeterminismReport {
    /// Number of executions performed.
    pub runs: usize,
    /// The hash every run agreed on.
    pub hash: String,
    pub results: Vec<RunResult>,
}

/// Re-runs plans and compares their hashes.
#[derive(Debug, Clone, Default)]
pub struct DeterminismGuard {
    executor: Executor,
}

impl DeterminismGuard {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    /// Execute `plan` `runs` times (at least twice), each with a fresh context
    /// from `make_ctx`, and compare every hash against the first.
    ///
    /// # Errors
    /// - [`EngineError::InvalidContext`] if a context cannot be built or its
    ///   seed differs from the first run's.
    /// - [`EngineError::DeterminismViolation`] on the first hash mismatch.
    #[instrument(skip_all, fields(plan_id = %plan.id, runs = runs))]
    pub async fn assert_deterministic<F>(
        &self,
        plan: &crate::OrchestratorPlan,
        make_ctx: F,
        adapters: &AdapterRegistry,
        runs: usize,
    ) -> Result<DeterminismReport, EngineError>
    where
        F: Fn() -> Result<RunContext, ContextError>,
    {
        let runs = runs.max(2);
        let mut seed: Option<String> = None;
        let mut results: Vec<RunResult> = Vec::with_capacity(runs);

        for run in 0..runs {
            let ctx = make_ctx()?;
            let expected = seed.get_or_insert_with(|| ctx.seed().to_owned());
            if expected.as_str() != ctx.seed() {
                return Err(ContextError::SeedMismatch {
                    expected: expected.clone(),
                    actual: ctx.seed().to_owned(),
                }
                .into());
            }

            let result = self.executor.execute(plan, Arc::new(ctx), adapters).await;

            if let Some(first) = results.first() {
                if first.hash != result.hash {
                    let differences = diff_results(first, &result);
                    error!(
                        "run {} diverged: {} != {} ({})",
                        run,
                        first.hash,
                        result.hash,
                        differences.join("; ")
                    );
                    return Err(EngineError::DeterminismViolation {
                        run,
                        expected: first.hash.clone(),
                        actual: result.hash,
                        differences,
                    });
                }
            }
            results.push(result);
        }

        let hash = results.first().map(|r| r.hash.clone()).unwrap_or_default();
        info!("{} runs agreed on hash {}", runs, hash);
        Ok(DeterminismReport { runs, hash, results })
    }

    /// [`assert_deterministic`](Self::assert_deterministic) with contexts
    /// built from `seed` and a [`DeterministicClock`] starting at the epoch.
    ///
    /// # Errors
    /// See [`assert_deterministic`](Self::assert_deterministic).
    pub async fn assert_deterministic_with_seed(
        &self,
        plan: &crate::OrchestratorPlan,
        seed: &str,
        adapters: &AdapterRegistry,
        runs: usize,
    ) -> Result<DeterminismReport, EngineError> {
        self.assert_deterministic(
            plan,
            || RunContext::builder(seed).clock(DeterministicClock::new(0)).build(),
            adapters,
            runs,
        )
        .await
    }
}

/// Human-readable list of the fields in which two results differ.
///
/// Covers everything the semantic hash sees plus durations; timestamps are
/// ignored.
pub fn diff_results(a: &RunResult, b: &RunResult) -> Vec<String> {
    let mut diffs = Vec::new();

    if a.run_id != b.run_id {
        diffs.push(format!("run_id: '{}' vs '{}'", a.run_id, b.run_id));
    }
    if a.plan_id != b.plan_id {
        diffs.push(format!("plan_id: '{}' vs '{}'", a.plan_id, b.plan_id));
    }
    if a.status != b.status {
        diffs.push(format!("status: {:?} vs {:?}", a.status, b.status));
    }
    if a.duration_ms != b.duration_ms {
        diffs.push(format!("duration_ms: {} vs {}", a.duration_ms, b.duration_ms));
    }
    if a.steps.len() != b.steps.len() {
        diffs.push(format!("step count: {} vs {}", a.steps.len(), b.steps.len()));
    }

    for (left, right) in a.steps.iter().zip(&b.steps) {
        let id = &left.step_id;
        if left.step_id != right.step_id {
            diffs.push(format!("step id: '{}' vs '{}'", left.step_id, right.step_id));
            continue;
        }
        if left.status != right.status {
            diffs.push(format!("steps['{id}'].status: {:?} vs {:?}", left.status, right.status));
        }
        if left.output != right.output {
            diffs.push(format!("steps['{id}'].output differs"));
        }
        let codes = (
            left.error.as_ref().map(|e| (e.code, &e.message)),
            right.error.as_ref().map(|e| (e.code, &e.message)),
        );
        if codes.0 != codes.1 {
            diffs.push(format!("steps['{id}'].error differs"));
        }
        if left.duration_ms != right.duration_ms {
            diffs.push(format!(
                "steps['{id}'].duration_ms: {} vs {}",
                left.duration_ms, right.duration_ms
            ));
        }
    }

    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PlanBuilder;
    use crate::models::PlanStep;
    use adapters::mock::MockAdapter;
    use serde_json::json;

    fn registry() -> AdapterRegistry {
        AdapterRegistry::new()
            .with(Arc::new(MockAdapter::returning("noop", json!({}))))
            .unwrap()
    }

    fn plan() -> crate::OrchestratorPlan {
        PlanBuilder::new("p1", "1.0")
            .add_step(PlanStep::new("a", "noop"))
            .add_step(PlanStep::new("b", "noop").depends_on(["a"]))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn identical_runs_pass() {
        let guard = DeterminismGuard::default();
        let report = guard
            .assert_deterministic_with_seed(&plan(), "s1", &registry(), 3)
            .await
            .unwrap();
        assert_eq!(report.runs, 3);
        assert_eq!(report.hash.len(), 64);
        assert!(report.results.iter().all(|r| r.hash == report.hash));
    }

    #[tokio::test]
    async fn runs_below_two_are_raised_to_two() {
        let guard = DeterminismGuard::default();
        let report = guard
            .assert_deterministic_with_seed(&plan(), "s1", &registry(), 0)
            .await
            .unwrap();
        assert_eq!(report.runs, 2);
    }

    #[tokio::test]
    async fn seed_mismatch_is_invalid_context() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let counter = AtomicUsize::new(0);
        let guard = DeterminismGuard::default();
        let err = guard
            .assert_deterministic(
                &plan(),
                || RunContext::new(format!("seed-{}", counter.fetch_add(1, Ordering::SeqCst))),
                &registry(),
                2,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidContext(ContextError::SeedMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn empty_seed_surfaces_invalid_context() {
        let guard = DeterminismGuard::default();
        let err = guard
            .assert_deterministic_with_seed(&plan(), "", &registry(), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidContext(ContextError::EmptySeed)));
    }

    #[test]
    fn diff_reports_status_change() {
        let base = RunResult {
            run_id: "r".into(),
            plan_id: "p".into(),
            status: crate::RunStatus::Success,
            steps: vec![],
            error: None,
            started_at: Default::default(),
            completed_at: Default::default(),
            duration_ms: 0,
            hash: "h1".into(),
        };
        let mut other = base.clone();
        other.status = crate::RunStatus::Failure;
        assert_eq!(diff_results(&base, &other), vec!["status: Success vs Failure"]);
        assert!(diff_results(&base, &base).is_empty());
    }
}
