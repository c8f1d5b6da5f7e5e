//! `RunContext`: the execution-scoped handle passed to every step.
//!
//! Defined here (in the adapters crate) so both the engine and individual
//! adapter implementations can import it without a circular dependency.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::ContextError;
use crate::ids::{IdFactory, SeededIdFactory};

/// Static description of the host a run executed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
    pub engine_version: String,
}

impl PlatformInfo {
    /// Describe the current process.
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Read-only view of a context, handed to hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub run_id: String,
    pub seed: String,
    pub created_at: DateTime<Utc>,
    pub platform: PlatformInfo,
}

/// One per execution. Shared by every step of that run.
#[derive(Debug)]
pub struct RunContext {
    run_id: String,
    seed: String,
    clock: Arc<dyn Clock>,
    id_factory: Arc<dyn IdFactory>,
    platform: PlatformInfo,
    created_at: DateTime<Utc>,
}

impl RunContext {
    /// Context with the default clock and a seed-derived ID factory.
    ///
    /// # Errors
    /// [`ContextError::EmptySeed`] if `seed` is empty or whitespace.
    pub fn new(seed: impl Into<String>) -> Result<Self, ContextError> {
        Self::builder(seed).build()
    }

    pub fn builder(seed: impl Into<String>) -> RunContextBuilder {
        RunContextBuilder {
            seed: seed.into(),
            clock: None,
            id_factory: None,
            platform: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn platform(&self) -> &PlatformInfo {
        &self.platform
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Next identifier from the context's ID factory.
    pub fn generate_id(&self) -> String {
        self.id_factory.next_id()
    }

    /// Current time from the context's clock.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            run_id: self.run_id.clone(),
            seed: self.seed.clone(),
            created_at: self.created_at,
            platform: self.platform.clone(),
        }
    }
}

/// Fluent constructor for [`RunContext`].
pub struct RunContextBuilder {
    seed: String,
    clock: Option<Arc<dyn Clock>>,
    id_factory: Option<Arc<dyn IdFactory>>,
    platform: Option<PlatformInfo>,
}

impl RunContextBuilder {
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_factory(mut self, factory: impl IdFactory + 'static) -> Self {
        self.id_factory = Some(Arc::new(factory));
        self
    }

    pub fn platform(mut self, platform: PlatformInfo) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Validate the seed and materialise the context.
    ///
    /// The run ID is the first identifier drawn from the ID factory and
    /// `created_at` the first clock read.
    ///
    /// # Errors
    /// [`ContextError::EmptySeed`] if the seed is empty or whitespace.
    pub fn build(self) -> Result<RunContext, ContextError> {
        if self.seed.trim().is_empty() {
            return Err(ContextError::EmptySeed);
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let id_factory = self
            .id_factory
            .unwrap_or_else(|| Arc::new(SeededIdFactory::new(&self.seed, "run")));

        let run_id = id_factory.next_id();
        let created_at = clock.now();

        Ok(RunContext {
            run_id,
            seed: self.seed,
            clock,
            id_factory,
            platform: self.platform.unwrap_or_else(PlatformInfo::current),
            created_at,
        })
    }
}
