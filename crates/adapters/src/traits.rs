//! The `StepAdapter` trait: the contract every step kind must fulfil.

use async_trait::async_trait;
use serde_json::Value;

use crate::{AdapterError, RunContext};

/// Executes every plan step tagged with [`StepAdapter::kind`].
///
/// The engine never inspects the shape of `input` or of the returned value.
/// Adapters are shared across concurrent runs, so any internal mutable state
/// must be synchronised by the adapter itself.
#[async_trait]
pub trait StepAdapter: Send + Sync {
    /// The step kind this adapter handles.
    fn kind(&self) -> &str;

    /// Run one step. The engine races this future against the step timeout
    /// and does not cancel it if the timer wins.
    async fn execute(&self, input: Value, ctx: &RunContext) -> Result<Value, AdapterError>;
}
