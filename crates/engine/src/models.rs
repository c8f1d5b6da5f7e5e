//! Core domain models for the plan engine.
//!
//! Plans are the static description of work; results are what an execution
//! produced. Both serialise to JSON so callers can persist or inspect them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, ErrorInfo};
use crate::hooks::PlanHooks;
use crate::validate::validate_plan_value;

// ---------------------------------------------------------------------------
// PlanStep
// ---------------------------------------------------------------------------

/// A single unit of work in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Unique identifier within this plan (referenced by `depends_on`).
    pub id: String,
    /// Selects the adapter that executes this step.
    pub kind: String,
    /// Opaque payload handed to the adapter.
    #[serde(default)]
    pub input: Value,
    /// Steps that must have succeeded before this one runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Per-step timeout; falls back to the plan or executor default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Advisory list of output keys; never enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_outputs: Option<Vec<String>>,
}

impl PlanStep {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            input: Value::Null,
            depends_on: Vec::new(),
            timeout_ms: None,
            expected_outputs: None,
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn expected_outputs<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_outputs = Some(keys.into_iter().map(Into::into).collect());
        self
    }
}

// ---------------------------------------------------------------------------
// OrchestratorPlan
// ---------------------------------------------------------------------------

/// A complete plan definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorPlan {
    pub id: String,
    pub version: String,
    pub steps: Vec<PlanStep>,
    /// Timeout applied to steps without their own `timeout_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    /// Observability callbacks. Not part of the serialised form.
    #[serde(skip)]
    pub hooks: Option<PlanHooks>,
}

impl OrchestratorPlan {
    /// Parse and validate a plan from a JSON document.
    ///
    /// # Errors
    /// [`EngineError::Serialization`] for malformed JSON and
    /// [`EngineError::InvalidPlan`] listing every validation issue.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Validate then deserialize an already-parsed JSON value.
    ///
    /// # Errors
    /// See [`OrchestratorPlan::from_json`].
    pub fn from_value(value: Value) -> Result<Self, EngineError> {
        let report = validate_plan_value(&value);
        if !report.valid {
            return Err(EngineError::InvalidPlan { errors: report.errors });
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Terminal state of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Success,
    Failure,
    Timeout,
    Skipped,
}

/// Aggregate state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Partial,
    Failure,
}

impl RunStatus {
    /// SUCCESS if every step succeeded; FAILURE if none did (including when
    /// no step ran) or the run was halted by a failing step; PARTIAL
    /// otherwise.
    pub fn aggregate(steps: &[StepResult], halted: bool) -> Self {
        let succeeded = steps.iter().filter(|s| s.status == StepStatus::Success).count();
        if steps.is_empty() || succeeded == 0 || halted {
            Self::Failure
        } else if succeeded == steps.len() {
            Self::Success
        } else {
            Self::Partial
        }
    }
}

/// Outcome of one step. `output` is set iff the step succeeded, `error`
/// iff it did not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub kind: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// The frozen record of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub plan_id: String,
    pub status: RunStatus,
    pub steps: Vec<StepResult>,
    /// Set only when the run was rejected before any step executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// SHA-256 over the canonical projection; see [`crate::hashing`].
    pub hash: String,
}

impl RunResult {
    pub fn step(&self, id: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step_id == id)
    }
}

/// Milliseconds between two instants, clamped at zero.
pub(crate) fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}
