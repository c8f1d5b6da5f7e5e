//! Step lifecycle hooks.
//!
//! Hooks are observers: the executor calls them before and after every
//! dispatched step, logs anything they return or panic with, and carries on.
//! They can never change a step's status or stop a run.

use std::fmt;
use std::sync::Arc;

use adapters::ContextSnapshot;
use tokio::sync::mpsc;

use crate::models::{PlanStep, StepResult, StepStatus};

/// Observer of step execution.
pub trait StepHooks: Send + Sync {
    /// Called before the adapter is dispatched.
    fn pre_step(&self, _step: &PlanStep, _ctx: &ContextSnapshot) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once the step has a result.
    fn post_step(&self, _step: &PlanStep, _result: &StepResult) -> anyhow::Result<()> {
        Ok(())
    }
}

pub type PreStepFn = dyn Fn(&PlanStep, &ContextSnapshot) -> anyhow::Result<()> + Send + Sync;
pub type PostStepFn = dyn Fn(&PlanStep, &StepResult) -> anyhow::Result<()> + Send + Sync;

/// Hooks built from closures.
#[derive(Default)]
pub struct FnHooks {
    pre: Option<Box<PreStepFn>>,
    post: Option<Box<PostStepFn>>,
}

impl FnHooks {
    pub fn on_pre_step<F>(mut self, f: F) -> Self
    where
        F: Fn(&PlanStep, &ContextSnapshot) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.pre = Some(Box::new(f));
        self
    }

    pub fn on_post_step<F>(mut self, f: F) -> Self
    where
        F: Fn(&PlanStep, &StepResult) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.post = Some(Box::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_none() && self.post.is_none()
    }
}

impl StepHooks for FnHooks {
    fn pre_step(&self, step: &PlanStep, ctx: &ContextSnapshot) -> anyhow::Result<()> {
        self.pre.as_ref().map_or(Ok(()), |f| f(step, ctx))
    }

    fn post_step(&self, step: &PlanStep, result: &StepResult) -> anyhow::Result<()> {
        self.post.as_ref().map_or(Ok(()), |f| f(step, result))
    }
}

/// Lifecycle event emitted by [`ChannelHooks`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    Started {
        run_id: String,
        step_id: String,
        kind: String,
    },
    Finished {
        step_id: String,
        status: StepStatus,
        duration_ms: u64,
    },
}

/// Forwards step lifecycle events over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelHooks {
    tx: mpsc::UnboundedSender<StepEvent>,
}

impl ChannelHooks {
    /// Hooks plus the receiving end of their event stream.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StepEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StepHooks for ChannelHooks {
    fn pre_step(&self, step: &PlanStep, ctx: &ContextSnapshot) -> anyhow::Result<()> {
        self.tx.send(StepEvent::Started {
            run_id: ctx.run_id.clone(),
            step_id: step.id.clone(),
            kind: step.kind.clone(),
        })?;
        Ok(())
    }

    fn post_step(&self, step: &PlanStep, result: &StepResult) -> anyhow::Result<()> {
        self.tx.send(StepEvent::Finished {
            step_id: step.id.clone(),
            status: result.status,
            duration_ms: result.duration_ms,
        })?;
        Ok(())
    }
}

/// Shared handle to a plan's hooks.
#[derive(Clone)]
pub struct PlanHooks(Arc<dyn StepHooks>);

impl PlanHooks {
    pub fn new(hooks: impl StepHooks + 'static) -> Self {
        Self(Arc::new(hooks))
    }

    pub fn from_arc(hooks: Arc<dyn StepHooks>) -> Self {
        Self(hooks)
    }

    pub(crate) fn inner(&self) -> &dyn StepHooks {
        self.0.as_ref()
    }
}

impl fmt::Debug for PlanHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PlanHooks(..)")
    }
}
