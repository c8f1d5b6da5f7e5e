//! Plan execution engine.
//!
//! `Executor` is the central state machine:
//! 1. Re-validates the plan; an invalid plan yields a FAILURE result with no
//!    steps.
//! 2. Walks the steps in plan order. Each step is gated on its dependencies,
//!    wrapped in pre/post hooks, and dispatched to its adapter under a
//!    timeout.
//! 3. Stops at the first unsuccessful step unless `continue_on_failure` is
//!    set.
//! 4. Aggregates the run status and seals the result with its hash. A run
//!    halted by a failing step is FAILURE even if earlier steps succeeded.
//!
//! Adapter errors, panics, and timeouts are recovered into the step's
//! `error` record. `execute` itself never fails.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use adapters::{AdapterRegistry, RunContext};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ErrorCode, ErrorInfo};
use crate::hashing::{result_hash, HashPolicy};
use crate::models::{
    millis_between, OrchestratorPlan, PlanStep, RunResult, RunStatus, StepResult, StepStatus,
};
use crate::validate::validate_plan;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Timeout for steps that set neither `timeout_ms` nor a plan default.
    pub default_timeout: Duration,
    /// Keep going after a step fails instead of truncating the run.
    pub continue_on_failure: bool,
    /// Fields folded into the result hash.
    pub hash_policy: HashPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            continue_on_failure: false,
            hash_policy: HashPolicy::Semantic,
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Stateless driver for a single plan execution.
///
/// Holds no per-run state, so one executor can serve any number of
/// concurrent runs, each with its own [`RunContext`].
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

/// How a dispatched step ended, before timestamps are attached.
enum Outcome {
    Success(Value),
    Failed(StepStatus, ErrorInfo),
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `plan` to completion and return its sealed result.
    #[instrument(skip_all, fields(plan_id = %plan.id, run_id = %ctx.run_id()))]
    pub async fn execute(
        &self,
        plan: &OrchestratorPlan,
        ctx: Arc<RunContext>,
        adapters: &AdapterRegistry,
    ) -> RunResult {
        let started_at = ctx.timestamp();

        // ------------------------------------------------------------------
        // Validate before touching any adapter.
        // ------------------------------------------------------------------
        let report = validate_plan(plan);
        if !report.valid {
            error!("plan rejected: {}", report.errors.join("; "));
            let err = ErrorInfo::new(
                ErrorCode::InvalidPlan,
                format!("plan '{}' failed validation", plan.id),
                ctx.timestamp(),
            )
            .with_context(json!({ "errors": report.errors }));
            return self.seal(plan, &ctx, Vec::new(), false, Some(err), started_at);
        }

        info!("executing {} steps", plan.steps.len());

        // ------------------------------------------------------------------
        // Execute steps sequentially.
        // ------------------------------------------------------------------
        let mut recorded: HashMap<&str, StepStatus> = HashMap::with_capacity(plan.steps.len());
        let mut results: Vec<StepResult> = Vec::with_capacity(plan.steps.len());
        let mut halted = false;

        for step in &plan.steps {
            if let Some(dep) = step
                .depends_on
                .iter()
                .find(|d| recorded.get(d.as_str()) != Some(&StepStatus::Success))
            {
                warn!("step '{}' skipped: dependency '{}' did not succeed", step.id, dep);
                let now = ctx.timestamp();
                let err = ErrorInfo::new(
                    ErrorCode::StepFailed,
                    "skipped due to failed dependency",
                    now,
                )
                .with_context(json!({ "dependency": dep }));
                recorded.insert(step.id.as_str(), StepStatus::Skipped);
                results.push(step_result(step, Outcome::Failed(StepStatus::Skipped, err), now, now));
                continue;
            }

            if let Some(hooks) = &plan.hooks {
                let snapshot = ctx.snapshot();
                invoke_hook(&step.id, "pre_step", || hooks.inner().pre_step(step, &snapshot));
            }

            let step_started = ctx.timestamp();
            let outcome = self.dispatch(plan, step, &ctx, adapters).await;
            let result = step_result(step, outcome, step_started, ctx.timestamp());

            if let Some(hooks) = &plan.hooks {
                invoke_hook(&step.id, "post_step", || hooks.inner().post_step(step, &result));
            }

            let succeeded = result.is_success();
            recorded.insert(step.id.as_str(), result.status);
            results.push(result);

            if !succeeded && !self.config.continue_on_failure {
                warn!("stopping after step '{}' (continue_on_failure = false)", step.id);
                halted = true;
                break;
            }
        }

        self.seal(plan, &ctx, results, halted, None, started_at)
    }

    // -----------------------------------------------------------------------
    // Internal: run one step's adapter against its timeout.
    // -----------------------------------------------------------------------

    async fn dispatch(
        &self,
        plan: &OrchestratorPlan,
        step: &PlanStep,
        ctx: &Arc<RunContext>,
        adapters: &AdapterRegistry,
    ) -> Outcome {
        let Some(adapter) = adapters.get(&step.kind) else {
            error!("no adapter registered for kind '{}'", step.kind);
            return Outcome::Failed(
                StepStatus::Failure,
                ErrorInfo::new(
                    ErrorCode::AdapterNotFound,
                    format!("no adapter registered for kind '{}'", step.kind),
                    ctx.timestamp(),
                )
                .with_context(json!({ "kind": step.kind })),
            );
        };

        let timeout = self.timeout_for(plan, step);
        debug!("dispatching step '{}' to '{}' (timeout {:?})", step.id, step.kind, timeout);

        // The adapter runs as its own task so a timeout leaves it running in
        // the background instead of dropping it mid-flight.
        let task = {
            let ctx = Arc::clone(ctx);
            let input = step.input.clone();
            tokio::spawn(async move { adapter.execute(input, &ctx).await })
        };

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(output))) => {
                info!("step '{}' succeeded", step.id);
                Outcome::Success(output)
            }
            Ok(Ok(Err(cause))) => {
                error!("step '{}' failed: {}", step.id, cause);
                Outcome::Failed(
                    StepStatus::Failure,
                    ErrorInfo::new(
                        ErrorCode::StepFailed,
                        format!("step '{}' failed: {cause}", step.id),
                        ctx.timestamp(),
                    )
                    .with_context(json!({ "cause": cause.to_string() })),
                )
            }
            Ok(Err(join_err)) => {
                error!("step '{}' adapter task aborted: {}", step.id, join_err);
                Outcome::Failed(
                    StepStatus::Failure,
                    ErrorInfo::new(
                        ErrorCode::Internal,
                        format!("adapter for step '{}' panicked or was cancelled", step.id),
                        ctx.timestamp(),
                    ),
                )
            }
            Err(_elapsed) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!("step '{}' timed out after {} ms", step.id, timeout_ms);
                Outcome::Failed(
                    StepStatus::Timeout,
                    ErrorInfo::new(
                        ErrorCode::Timeout,
                        format!("step '{}' timed out after {timeout_ms} ms", step.id),
                        ctx.timestamp(),
                    )
                    .with_context(json!({ "timeout_ms": timeout_ms })),
                )
            }
        }
    }

    /// Step timeout, then plan default, then executor default.
    fn timeout_for(&self, plan: &OrchestratorPlan, step: &PlanStep) -> Duration {
        step.timeout_ms
            .or(plan.default_timeout_ms)
            .map_or(self.config.default_timeout, Duration::from_millis)
    }

    /// Aggregate, stamp, and hash. The hash is computed last, over the
    /// otherwise complete result.
    fn seal(
        &self,
        plan: &OrchestratorPlan,
        ctx: &RunContext,
        steps: Vec<StepResult>,
        halted: bool,
        error: Option<ErrorInfo>,
        started_at: DateTime<Utc>,
    ) -> RunResult {
        let completed_at = ctx.timestamp();
        let status = RunStatus::aggregate(&steps, halted);

        let mut result = RunResult {
            run_id: ctx.run_id().to_owned(),
            plan_id: plan.id.clone(),
            status,
            steps,
            error,
            started_at,
            completed_at,
            duration_ms: millis_between(started_at, completed_at),
            hash: String::new(),
        };
        result.hash = result_hash(&result, self.config.hash_policy);

        info!("run finished with status {:?} (hash {})", result.status, result.hash);
        result
    }
}

fn step_result(
    step: &PlanStep,
    outcome: Outcome,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
) -> StepResult {
    let (status, output, error) = match outcome {
        Outcome::Success(output) => (StepStatus::Success, Some(output), None),
        Outcome::Failed(status, err) => (status, None, Some(err)),
    };
    StepResult {
        step_id: step.id.clone(),
        kind: step.kind.clone(),
        status,
        output,
        error,
        started_at,
        completed_at,
        duration_ms: millis_between(started_at, completed_at),
    }
}

/// Run a hook, logging and discarding any error or panic.
fn invoke_hook(step_id: &str, phase: &str, hook: impl FnOnce() -> anyhow::Result<()>) {
    match catch_unwind(AssertUnwindSafe(hook)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(code = %ErrorCode::HookFailed, "{} hook for step '{}' failed: {:#}", phase, step_id, e);
        }
        Err(_) => {
            warn!(code = %ErrorCode::HookFailed, "{} hook for step '{}' panicked", phase, step_id);
        }
    }
}
