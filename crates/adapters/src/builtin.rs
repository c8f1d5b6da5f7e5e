//! Built-in adapters with no external dependencies.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{AdapterError, AdapterRegistry, RegistryError, RunContext, StepAdapter};

/// `noop`: ignores its input and returns `{}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAdapter;

#[async_trait]
impl StepAdapter for NoopAdapter {
    fn kind(&self) -> &str {
        "noop"
    }

    async fn execute(&self, _input: Value, _ctx: &RunContext) -> Result<Value, AdapterError> {
        Ok(json!({}))
    }
}

/// `echo`: returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoAdapter;

#[async_trait]
impl StepAdapter for EchoAdapter {
    fn kind(&self) -> &str {
        "echo"
    }

    async fn execute(&self, input: Value, _ctx: &RunContext) -> Result<Value, AdapterError> {
        Ok(input)
    }
}

/// Registry pre-populated with every built-in adapter.
///
/// # Errors
/// Propagates [`RegistryError`]; cannot occur for the fixed built-in set.
pub fn builtin_registry() -> Result<AdapterRegistry, RegistryError> {
    AdapterRegistry::new()
        .with(Arc::new(NoopAdapter))?
        .with(Arc::new(EchoAdapter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builtins_behave() {
        let ctx = RunContext::new("s1").unwrap();
        let registry = builtin_registry().unwrap();
        assert_eq!(registry.kinds(), vec!["echo", "noop"]);

        let noop = registry.get("noop").unwrap();
        assert_eq!(noop.execute(json!([1, 2]), &ctx).await.unwrap(), json!({}));

        let echo = registry.get("echo").unwrap();
        assert_eq!(echo.execute(json!([1, 2]), &ctx).await.unwrap(), json!([1, 2]));
    }
}
