//! `engine` crate: plan model, validation, the step executor, result
//! hashing, the determinism guard, and the artifact registry.

pub mod artifacts;
pub mod builder;
pub mod determinism;
pub mod error;
pub mod executor;
pub mod hashing;
pub mod hooks;
pub mod models;
pub mod validate;

pub use artifacts::{Artifact, ArtifactMetadata, ArtifactRegistry};
pub use builder::PlanBuilder;
pub use determinism::{diff_results, DeterminismGuard, DeterminismReport};
pub use error::{EngineError, ErrorCode, ErrorInfo};
pub use executor::{Executor, ExecutorConfig};
pub use hashing::HashPolicy;
pub use hooks::{ChannelHooks, FnHooks, PlanHooks, StepEvent, StepHooks};
pub use models::{OrchestratorPlan, PlanStep, RunResult, RunStatus, StepResult, StepStatus};
pub use validate::{validate_plan, validate_plan_value, ValidationReport};
