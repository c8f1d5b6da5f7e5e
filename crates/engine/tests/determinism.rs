//! End-to-end checks for the determinism guard and run recording.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use adapters::mock::MockAdapter;
use adapters::{
    builtin_registry, AdapterError, AdapterRegistry, ContextError, RunContext, StepAdapter,
};
use async_trait::async_trait;
use engine::{
    ArtifactRegistry, DeterminismGuard, EngineError, Executor, ExecutorConfig, HashPolicy,
    OrchestratorPlan, PlanBuilder, PlanStep, RunStatus,
};
use serde_json::{json, Value};

/// Returns a different value on every call.
struct CounterAdapter {
    calls: AtomicU64,
}

#[async_trait]
impl StepAdapter for CounterAdapter {
    fn kind(&self) -> &str {
        "counter"
    }

    async fn execute(&self, _input: Value, _ctx: &RunContext) -> Result<Value, AdapterError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "n": n }))
    }
}

/// Embeds a freshly generated context id in its output.
struct IdAdapter;

#[async_trait]
impl StepAdapter for IdAdapter {
    fn kind(&self) -> &str {
        "mint"
    }

    async fn execute(&self, _input: Value, ctx: &RunContext) -> Result<Value, AdapterError> {
        Ok(json!({ "id": ctx.generate_id() }))
    }
}

fn pipeline() -> OrchestratorPlan {
    PlanBuilder::new("pipeline", "1.0")
        .add_step(PlanStep::new("fetch", "echo").with_input(json!({ "url": "file:///data" })))
        .add_step(PlanStep::new("mint", "mint").depends_on(["fetch"]))
        .add_step(PlanStep::new("done", "noop").depends_on(["fetch", "mint"]))
        .build()
        .expect("valid plan")
}

fn pipeline_registry() -> AdapterRegistry {
    builtin_registry()
        .and_then(|r| r.with(Arc::new(IdAdapter)))
        .expect("unique kinds")
}

#[tokio::test]
async fn deterministic_plan_passes_guard() {
    let guard = DeterminismGuard::default();
    let report = guard
        .assert_deterministic_with_seed(&pipeline(), "s1", &pipeline_registry(), 3)
        .await
        .expect("deterministic");

    assert_eq!(report.runs, 3);
    assert_eq!(report.results.len(), 3);
    assert_eq!(report.hash.len(), 64);
    assert!(report.results.iter().all(|r| r.hash == report.hash));
    assert!(report.results.iter().all(|r| r.status == RunStatus::Success));
    // Context-minted ids flow into outputs and stay stable across runs.
    assert_eq!(
        report.results[0].step("mint").unwrap().output,
        report.results[2].step("mint").unwrap().output
    );
}

#[tokio::test]
async fn guard_runs_at_least_twice() {
    let report = DeterminismGuard::default()
        .assert_deterministic_with_seed(&pipeline(), "s1", &pipeline_registry(), 1)
        .await
        .expect("deterministic");
    assert_eq!(report.runs, 2);
}

#[tokio::test]
async fn timing_policy_is_deterministic_under_virtual_clock() {
    let guard = DeterminismGuard::new(Executor::new(ExecutorConfig {
        hash_policy: HashPolicy::IncludeTimings,
        ..ExecutorConfig::default()
    }));
    guard
        .assert_deterministic_with_seed(&pipeline(), "s1", &pipeline_registry(), 2)
        .await
        .expect("deterministic");
}

#[tokio::test]
async fn changing_output_is_a_violation() {
    let plan = PlanBuilder::new("p", "1")
        .add_step(PlanStep::new("c", "counter"))
        .build()
        .unwrap();
    let adapters = AdapterRegistry::new()
        .with(Arc::new(CounterAdapter { calls: AtomicU64::new(0) }))
        .unwrap();

    let err = DeterminismGuard::default()
        .assert_deterministic_with_seed(&plan, "s1", &adapters, 3)
        .await
        .unwrap_err();

    match err {
        EngineError::DeterminismViolation {
            run,
            expected,
            actual,
            differences,
        } => {
            assert_eq!(run, 1);
            assert_ne!(expected, actual);
            assert!(differences.iter().any(|d| d.contains("output")), "{differences:?}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn seed_drift_between_runs_is_rejected() {
    let seeds = ["s1", "s2"];
    let next = AtomicU64::new(0);
    let plan = pipeline();

    let err = DeterminismGuard::default()
        .assert_deterministic(
            &plan,
            || {
                let i = next.fetch_add(1, Ordering::SeqCst) as usize;
                RunContext::new(seeds[i % seeds.len()])
            },
            &pipeline_registry(),
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
async fn empty_seed_is_rejected() {
    let err = DeterminismGuard::default()
        .assert_deterministic_with_seed(&pipeline(), "  ", &pipeline_registry(), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidContext(ContextError::EmptySeed)));
}

#[tokio::test]
async fn failing_runs_are_still_deterministic() {
    let plan = PlanBuilder::new("p", "1")
        .add_step(PlanStep::new("a", "boom"))
        .add_step(PlanStep::new("b", "noop").depends_on(["a"]))
        .build()
        .unwrap();
    let adapters = builtin_registry()
        .and_then(|r| r.with(Arc::new(MockAdapter::failing("boom", "always"))))
        .unwrap();
    let guard = DeterminismGuard::new(Executor::new(ExecutorConfig {
        continue_on_failure: true,
        ..ExecutorConfig::default()
    }));

    let report = guard
        .assert_deterministic_with_seed(&plan, "s1", &adapters, 2)
        .await
        .expect("deterministic");
    assert_eq!(report.results[0].status, RunStatus::Failure);
}

#[tokio::test]
async fn runs_are_recorded_as_artifacts() {
    let artifacts = ArtifactRegistry::seeded("s1");
    let executor = Executor::default();
    let adapters = pipeline_registry();
    let plan = pipeline();

    for seed in ["s1", "s2"] {
        let ctx = Arc::new(RunContext::new(seed).unwrap());
        let result = executor.execute(&plan, ctx, &adapters).await;
        artifacts.record_run(&result).unwrap();
    }

    let runs = artifacts.query(|m| m.get("type") == Some(&json!("run_result")));
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|a| a.metadata["plan_id"] == json!("pipeline")));
    assert_ne!(runs[0].metadata["hash"], runs[1].metadata["hash"]);

    let replay = executor
        .execute(&plan, Arc::new(RunContext::new("s1").unwrap()), &adapters)
        .await;
    let matching = artifacts.query(|m| m.get("hash") == Some(&json!(replay.hash)));
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].id, runs[0].id);
}
