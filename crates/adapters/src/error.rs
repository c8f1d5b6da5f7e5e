//! Error types shared by adapters, run contexts, and the adapter registry.

use thiserror::Error;

/// Errors returned by a step adapter's `execute` method.
///
/// The engine never retries on any variant; every error marks the step as
/// failed and is wrapped into a `STEP_FAILED` record on the step result.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The adapter ran and reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The step input did not have the shape the adapter expects.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Anything else bubbling up from adapter internals.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised while constructing a `RunContext`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The seed is the sole determinism input and must be non-empty.
    #[error("run context seed must be a non-empty string")]
    EmptySeed,

    /// Two contexts that were expected to share a seed did not.
    #[error("run context seed mismatch: expected '{expected}', got '{actual}'")]
    SeedMismatch { expected: String, actual: String },
}

/// Errors raised by [`crate::AdapterRegistry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Registries are append-only; a kind may be registered once.
    #[error("an adapter is already registered for kind '{0}'")]
    DuplicateKind(String),
}
