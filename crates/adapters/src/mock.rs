//! `MockAdapter`: a test double for `StepAdapter`.
//!
//! Useful in unit and integration tests where a real adapter is either
//! unavailable or irrelevant. Every call is recorded so tests can assert on
//! how often (and with what input) the engine dispatched to it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{AdapterError, RunContext, StepAdapter};

/// Behaviour injected into `MockAdapter` at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Return the step input unchanged.
    Echo,
    /// Fail with [`AdapterError::Failed`].
    Fail(String),
    /// Panic inside `execute`.
    Panic(String),
    /// Sleep, then return the value.
    Delay(Duration, Value),
    /// Never resolve.
    Hang,
}

/// A mock adapter that records every call it receives and returns a
/// programmer-specified result.
pub struct MockAdapter {
    kind: String,
    behaviour: MockBehaviour,
    /// All inputs seen by this adapter (in call order).
    calls: Arc<Mutex<Vec<Value>>>,
}

impl MockAdapter {
    pub fn new(kind: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            kind: kind.into(),
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always succeeds with `value`.
    pub fn returning(kind: impl Into<String>, value: Value) -> Self {
        Self::new(kind, MockBehaviour::ReturnValue(value))
    }

    /// Always succeeds with its input.
    pub fn echo(kind: impl Into<String>) -> Self {
        Self::new(kind, MockBehaviour::Echo)
    }

    /// Always fails with `msg`.
    pub fn failing(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(kind, MockBehaviour::Fail(msg.into()))
    }

    /// Always panics with `msg`.
    pub fn panicking(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(kind, MockBehaviour::Panic(msg.into()))
    }

    /// Succeeds with `value` after `delay`.
    pub fn delayed(kind: impl Into<String>, delay: Duration, value: Value) -> Self {
        Self::new(kind, MockBehaviour::Delay(delay, value))
    }

    /// Never resolves.
    pub fn hanging(kind: impl Into<String>) -> Self {
        Self::new(kind, MockBehaviour::Hang)
    }

    /// Number of times this adapter has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Inputs received so far, in call order.
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl StepAdapter for MockAdapter {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn execute(&self, input: Value, _ctx: &RunContext) -> Result<Value, AdapterError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(input.clone());

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(v.clone()),
            MockBehaviour::Echo => Ok(input),
            MockBehaviour::Fail(msg) => Err(AdapterError::Failed(msg.clone())),
            MockBehaviour::Panic(msg) => panic!("{msg}"),
            MockBehaviour::Delay(delay, v) => {
                tokio::time::sleep(*delay).await;
                Ok(v.clone())
            }
            MockBehaviour::Hang => std::future::pending().await,
        }
    }
}
