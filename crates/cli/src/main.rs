//! `plan-runner` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` validates a plan JSON file.
//! - `run` executes a plan with the built-in adapters and prints the result.
//! - `verify` runs a plan repeatedly and checks the result hashes agree.
//!
//! Logs go to stderr (filtered by `RUST_LOG`); stdout carries only JSON.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use adapters::{builtin_registry, DeterministicClock, RunContext};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{
    validate_plan_value, DeterminismGuard, EngineError, Executor, ExecutorConfig, HashPolicy,
    OrchestratorPlan, RunStatus,
};
use serde_json::{json, Value};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "plan-runner",
    about = "Deterministic plan execution engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a plan definition JSON file.
    Validate {
        /// Path to the plan JSON file.
        path: PathBuf,
    },
    /// Execute a plan and print its run result as JSON.
    Run {
        path: PathBuf,
        #[command(flatten)]
        exec: ExecArgs,
        /// Use a virtual clock starting at the epoch instead of wall time.
        #[arg(long)]
        deterministic_clock: bool,
    },
    /// Execute a plan several times and check every run hashes the same.
    Verify {
        path: PathBuf,
        #[command(flatten)]
        exec: ExecArgs,
        /// Number of executions (at least 2).
        #[arg(long, default_value_t = 2)]
        runs: usize,
    },
}

#[derive(Args)]
struct ExecArgs {
    /// Seed for run ids and generated ids.
    #[arg(long, env = "PLAN_RUNNER_SEED", default_value = "plan-runner")]
    seed: String,
    /// Keep executing after a step fails.
    #[arg(long, env = "PLAN_RUNNER_CONTINUE_ON_FAILURE")]
    continue_on_failure: bool,
    /// Timeout for steps that do not set their own.
    #[arg(long, env = "PLAN_RUNNER_DEFAULT_TIMEOUT_MS", default_value_t = 30_000)]
    default_timeout_ms: u64,
    /// Which result fields feed the hash.
    #[arg(long, env = "PLAN_RUNNER_HASH_POLICY", value_enum, default_value_t = HashPolicyArg::Semantic)]
    hash_policy: HashPolicyArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum HashPolicyArg {
    Semantic,
    IncludeTimings,
}

impl From<HashPolicyArg> for HashPolicy {
    fn from(arg: HashPolicyArg) -> Self {
        match arg {
            HashPolicyArg::Semantic => HashPolicy::Semantic,
            HashPolicyArg::IncludeTimings => HashPolicy::IncludeTimings,
        }
    }
}

impl ExecArgs {
    fn executor(&self) -> Executor {
        Executor::new(ExecutorConfig {
            default_timeout: Duration::from_millis(self.default_timeout_ms),
            continue_on_failure: self.continue_on_failure,
            hash_policy: self.hash_policy.into(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => {
            let value = read_json(&path)?;
            let report = validate_plan_value(&value);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.valid {
                info!("plan {} is valid", path.display());
                Ok(ExitCode::SUCCESS)
            } else {
                error!("plan {} has {} error(s)", path.display(), report.errors.len());
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Run {
            path,
            exec,
            deterministic_clock,
        } => {
            let Some(plan) = load_plan(&path)? else {
                return Ok(ExitCode::FAILURE);
            };
            let mut builder = RunContext::builder(exec.seed.as_str());
            if deterministic_clock {
                builder = builder.clock(DeterministicClock::new(0));
            }
            let ctx = builder.build().context("invalid run context")?;
            let registry = builtin_registry()?;

            let result = exec.executor().execute(&plan, Arc::new(ctx), &registry).await;
            println!("{}", serde_json::to_string_pretty(&result)?);

            Ok(if result.status == RunStatus::Success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Verify { path, exec, runs } => {
            let Some(plan) = load_plan(&path)? else {
                return Ok(ExitCode::FAILURE);
            };
            let registry = builtin_registry()?;
            let guard = DeterminismGuard::new(exec.executor());

            match guard
                .assert_deterministic_with_seed(&plan, &exec.seed, &registry, runs)
                .await
            {
                Ok(report) => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "deterministic": true,
                            "runs": report.runs,
                            "hash": report.hash,
                        }))?
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Err(EngineError::DeterminismViolation {
                    run,
                    expected,
                    actual,
                    differences,
                }) => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "deterministic": false,
                            "run": run,
                            "expected": expected,
                            "actual": actual,
                            "differences": differences,
                        }))?
                    );
                    Ok(ExitCode::FAILURE)
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Parse and validate a plan file. Validation errors are printed and yield
/// `None`; I/O and JSON errors propagate.
fn load_plan(path: &Path) -> Result<Option<OrchestratorPlan>> {
    match OrchestratorPlan::from_value(read_json(path)?) {
        Ok(plan) => Ok(Some(plan)),
        Err(EngineError::InvalidPlan { errors }) => {
            for e in &errors {
                error!("{}", e);
            }
            println!("{}", serde_json::to_string_pretty(&json!({ "valid": false, "errors": errors }))?);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
