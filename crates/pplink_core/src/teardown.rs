//! Teardown sequencer.
//!
//! A teardown is an ordered list of steps run strictly one after another
//! against a shared mutable context. Each attempted step lands in the
//! `Report` exactly once, so the operator always gets a full account of what
//! was removed, what was skipped and what is left behind.
//!
//! # Step lifecycle
//!
//! 1. **Confirm**: steps that require it are put to the `ConfirmationGate`.
//!    A "no" records `Skipped` and the run continues.
//! 2. **Execute**: the step's `execute` runs against the context.
//! 3. **Record**: the outcome is appended to the report.
//! 4. **Halt**: a `Failed` outcome from a fatal step stops the run.
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use pplink_core::{StepOutcome, TeardownStep};
//!
//! struct DropCache;
//!
//! #[async_trait]
//! impl TeardownStep<Vec<String>> for DropCache {
//!     fn name(&self) -> &str { "drop-cache" }
//!     fn description(&self) -> &str { "Forget cached entries" }
//!
//!     async fn execute(&self, ctx: &mut Vec<String>) -> StepOutcome {
//!         ctx.clear();
//!         StepOutcome::success("cache cleared")
//!     }
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::gate::{ConfirmationGate, ConfirmationRequest};
use crate::lro::{Completion, LroOutcome};

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Success { detail: String },
    Skipped { reason: String },
    Failed { error: String },
}

impl StepOutcome {
    pub fn success(detail: impl Into<String>) -> Self {
        StepOutcome::Success { detail: detail.into() }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped { reason: reason.into() }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        StepOutcome::Failed { error: error.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Success { detail } => write!(f, "succeeded: {}", detail),
            StepOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
            StepOutcome::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

impl From<LroOutcome> for StepOutcome {
    fn from(outcome: LroOutcome) -> Self {
        match outcome {
            LroOutcome::Done(Completion::AlreadyAbsent) => StepOutcome::success("already absent"),
            LroOutcome::Done(Completion::AlreadyInTargetState) => {
                StepOutcome::success("already in the requested state")
            }
            LroOutcome::Done(Completion::Synchronous { status }) => {
                StepOutcome::success(format!("completed (HTTP {})", status))
            }
            LroOutcome::Done(Completion::Polled { polls }) => {
                StepOutcome::success(format!("completed after {} status checks", polls))
            }
            LroOutcome::Done(Completion::Accepted) => {
                StepOutcome::success("accepted, no status endpoint to follow")
            }
            LroOutcome::Failed(failure) => StepOutcome::failed(failure.to_string()),
            LroOutcome::TimedOut {
                attempts,
                elapsed,
                operation_url,
            } => StepOutcome::failed(format!(
                "timed out after {} polls ({}s); it may still complete, check {}",
                attempts,
                elapsed.as_secs(),
                operation_url
            )),
        }
    }
}

/// One stage of a teardown.
#[async_trait]
pub trait TeardownStep<C: Send>: Send + Sync {
    /// Short identifier used in logs, prompts and the report.
    fn name(&self) -> &str;

    /// What the step does, shown in the confirmation prompt.
    fn description(&self) -> &str;

    /// Resources the step will touch, for the confirmation prompt.
    fn affected_resources(&self, _ctx: &C) -> Vec<String> {
        Vec::new()
    }

    fn confirm_required(&self) -> bool {
        true
    }

    /// Whether a failure stops the remaining steps.
    fn fatal_if_failed(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut C) -> StepOutcome;
}

/// Ledger entry for an attempted step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub outcome: StepOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Ordered account of a teardown run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub records: Vec<StepRecord>,
    /// Fatal step that stopped the run.
    pub halted_at: Option<String>,
    /// The run was cut short by a shutdown signal.
    pub interrupted: bool,
}

impl Report {
    pub fn successes(&self) -> Vec<&StepRecord> {
        self.records.iter().filter(|r| r.outcome.is_success()).collect()
    }

    pub fn errors(&self) -> Vec<&StepRecord> {
        self.records.iter().filter(|r| r.outcome.is_failed()).collect()
    }

    pub fn skipped(&self) -> Vec<&StepRecord> {
        self.records.iter().filter(|r| r.outcome.is_skipped()).collect()
    }

    pub fn record(&self, step: &str) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.step == step)
    }

    /// No step failed and the run was not cut short.
    pub fn is_clean(&self) -> bool {
        self.errors().is_empty() && self.halted_at.is_none() && !self.interrupted
    }

    /// `Err(FatalStep)` when a fatal step stopped the run.
    pub fn into_result(self) -> CoreResult<Self> {
        match &self.halted_at {
            Some(step) => {
                let message = self
                    .record(step)
                    .map(|r| r.outcome.to_string())
                    .unwrap_or_else(|| "no outcome recorded".to_string());
                Err(CoreError::FatalStep {
                    step: step.clone(),
                    message,
                })
            }
            None => Ok(self),
        }
    }
}

/// Runs steps in order against a context.
pub struct TeardownSequencer<C: Send> {
    name: String,
    gate: Arc<dyn ConfirmationGate>,
    steps: Vec<Arc<dyn TeardownStep<C>>>,
}

impl<C: Send> TeardownSequencer<C> {
    pub fn new(name: impl Into<String>, gate: Arc<dyn ConfirmationGate>) -> Self {
        Self {
            name: name.into(),
            gate,
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step(mut self, step: Arc<dyn TeardownStep<C>>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[Arc<dyn TeardownStep<C>>] {
        &self.steps
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run every step to completion.
    pub async fn run(&self, ctx: &mut C) -> Report {
        self.run_until(ctx, std::future::pending::<()>()).await
    }

    /// Run the steps, stopping early if `shutdown` resolves.
    ///
    /// The step in flight when `shutdown` fires is recorded as failed and the
    /// partial report is returned.
    pub async fn run_until<F>(&self, ctx: &mut C, shutdown: F) -> Report
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut report = Report::default();
        let total = self.steps.len();

        info!("Starting teardown: {} ({} steps)", self.name, total);

        for (i, step) in self.steps.iter().enumerate() {
            let started_at = Utc::now();

            // The prompt blocks, so a signal raised while it waits is seen here.
            if shutdown_fired(&mut shutdown).await {
                warn!("Teardown '{}' interrupted before '{}'", self.name, step.name());
                report.interrupted = true;
                break;
            }

            if step.confirm_required() {
                let request = ConfirmationRequest::new(step.name(), step.description())
                    .with_resources(step.affected_resources(ctx));
                match self.gate.confirm(&request) {
                    Ok(true) => {}
                    Ok(false) => {
                        info!("Step '{}' declined by operator", step.name());
                        report.records.push(StepRecord {
                            step: step.name().to_string(),
                            outcome: StepOutcome::skipped("declined by operator"),
                            started_at,
                            finished_at: Utc::now(),
                        });
                        continue;
                    }
                    Err(e) => {
                        error!("Confirmation for '{}' failed: {}", step.name(), e);
                        report.records.push(StepRecord {
                            step: step.name().to_string(),
                            outcome: StepOutcome::failed(e.to_string()),
                            started_at,
                            finished_at: Utc::now(),
                        });
                        if step.fatal_if_failed() {
                            report.halted_at = Some(step.name().to_string());
                            break;
                        }
                        continue;
                    }
                }

                if shutdown_fired(&mut shutdown).await {
                    warn!("Teardown '{}' interrupted before '{}'", self.name, step.name());
                    report.interrupted = true;
                    break;
                }
            }

            info!("Executing step [{}/{}]: {}", i + 1, total, step.name());

            let mut interrupted = false;
            let outcome = tokio::select! {
                outcome = step.execute(ctx) => outcome,
                _ = &mut shutdown => {
                    interrupted = true;
                    StepOutcome::failed("interrupted")
                }
            };

            match &outcome {
                StepOutcome::Success { detail } => info!("Step '{}' succeeded: {}", step.name(), detail),
                StepOutcome::Skipped { reason } => info!("Step '{}' skipped: {}", step.name(), reason),
                StepOutcome::Failed { error } => error!("Step '{}' failed: {}", step.name(), error),
            }

            let failed = outcome.is_failed();
            report.records.push(StepRecord {
                step: step.name().to_string(),
                outcome,
                started_at,
                finished_at: Utc::now(),
            });

            if interrupted {
                warn!("Teardown '{}' interrupted during '{}'", self.name, step.name());
                report.interrupted = true;
                break;
            }

            if failed && step.fatal_if_failed() {
                error!("Step '{}' is fatal, stopping teardown '{}'", step.name(), self.name);
                report.halted_at = Some(step.name().to_string());
                break;
            }
        }

        info!(
            "Teardown '{}' finished: {} succeeded, {} skipped, {} failed",
            self.name,
            report.successes().len(),
            report.skipped().len(),
            report.errors().len()
        );
        report
    }
}

async fn shutdown_fired<F: Future<Output = ()>>(shutdown: &mut std::pin::Pin<&mut F>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.as_mut() => true,
        _ = std::future::ready(()) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lro::{FailurePhase, OperationFailure};
    use std::time::Duration;

    #[test]
    fn test_lro_outcome_conversion() {
        assert!(StepOutcome::from(LroOutcome::Done(Completion::AlreadyAbsent)).is_success());
        assert!(StepOutcome::from(LroOutcome::Done(Completion::Polled { polls: 3 })).is_success());

        let failed = StepOutcome::from(LroOutcome::Failed(OperationFailure {
            phase: FailurePhase::Poll,
            status: Some(500),
            reason: "boom".to_string(),
        }));
        assert!(failed.is_failed());

        let timed_out = StepOutcome::from(LroOutcome::TimedOut {
            attempts: 5,
            elapsed: Duration::from_secs(50),
            operation_url: "https://op".to_string(),
        });
        match timed_out {
            StepOutcome::Failed { error } => assert!(error.contains("may still complete")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_report_into_result() {
        let now = Utc::now();
        let report = Report {
            records: vec![StepRecord {
                step: "unlink".to_string(),
                outcome: StepOutcome::failed("HTTP 500"),
                started_at: now,
                finished_at: now,
            }],
            halted_at: Some("unlink".to_string()),
            interrupted: false,
        };
        match report.into_result() {
            Err(CoreError::FatalStep { step, message }) => {
                assert_eq!(step, "unlink");
                assert!(message.contains("HTTP 500"));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
