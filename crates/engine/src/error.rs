//! Engine-level error types.
//!
//! Two shapes live here:
//! - [`ErrorInfo`] is structured data recorded on step and run results. The
//!   executor recovers every in-loop failure into one of these.
//! - [`EngineError`] is the `Err` side of the engine's fallible API calls
//!   (building plans, asserting determinism, recording artifacts).

use std::fmt;

use adapters::{ContextError, RegistryError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error taxonomy shared by results and API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidPlan,
    StepFailed,
    Timeout,
    AdapterNotFound,
    DeterminismViolation,
    InvalidContext,
    HookFailed,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPlan => "INVALID_PLAN",
            Self::StepFailed => "STEP_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::AdapterNotFound => "ADAPTER_NOT_FOUND",
            Self::DeterminismViolation => "DETERMINISM_VIOLATION",
            Self::InvalidContext => "INVALID_CONTEXT",
            Self::HookFailed => "HOOK_FAILED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recovered failure, as stored on a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            code,
            message: message.into(),
            timestamp,
            context: None,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Errors returned by the engine's fallible entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The plan failed validation; every issue found is listed.
    #[error("invalid plan: {}", .errors.join("; "))]
    InvalidPlan { errors: Vec<String> },

    /// A run context could not be built or was inconsistent.
    #[error("invalid run context: {0}")]
    InvalidContext(#[from] ContextError),

    /// Two runs of the same plan under the same seed disagreed.
    #[error("determinism violation on run {run}: expected hash {expected}, got {actual}")]
    DeterminismViolation {
        run: usize,
        expected: String,
        actual: String,
        differences: Vec<String>,
    },

    /// Adapter registration failed.
    #[error("adapter registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Plan or result (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Position of this error in the taxonomy.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidPlan { .. } => ErrorCode::InvalidPlan,
            Self::InvalidContext(_) => ErrorCode::InvalidContext,
            Self::DeterminismViolation { .. } => ErrorCode::DeterminismViolation,
            Self::Registry(_) | Self::Serialization(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_in_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::AdapterNotFound).unwrap();
        assert_eq!(json, "\"ADAPTER_NOT_FOUND\"");
        assert_eq!(ErrorCode::AdapterNotFound.to_string(), "ADAPTER_NOT_FOUND");
    }

    #[test]
    fn invalid_plan_lists_every_issue() {
        let err = EngineError::InvalidPlan {
            errors: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "invalid plan: a; b");
        assert_eq!(err.code(), ErrorCode::InvalidPlan);
    }

    #[test]
    fn context_errors_map_to_invalid_context() {
        let err: EngineError = ContextError::EmptySeed.into();
        assert_eq!(err.code(), ErrorCode::InvalidContext);
    }
}
