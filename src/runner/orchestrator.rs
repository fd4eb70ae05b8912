//! The submit → poll → classify → retry control loop.
//!
//! Strictly sequential: one live operation at a time, one terminal
//! `Outcome` per run. Retries exist only here — no lower component
//! resubmits on its own initiative.

use thiserror::Error;

use crate::gcp::{ApiError, PipelinesApi, ZoneOperationsApi};
use crate::runner::budget::{AttemptMode, RetryBudget};
use crate::runner::classify::{Classification, FailureClassifier};
use crate::runner::poller::OperationPoller;
use crate::runner::spec::JobSpec;

/// Terminal result of one orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The pipeline finished without error.
    Succeeded,
    /// The job errored before any worker was assigned; retrying cannot
    /// help, whatever budget remains.
    FailedBeforeStart,
    /// A worker ran the job but the failure was not a preemption; also
    /// not retried.
    FailedUnrelated,
    /// Every budgeted attempt was preempted. Reported as a failure but
    /// not a hard error: the interruptible-capacity strategy was given
    /// a fair chance.
    ExhaustedWhilePreempted,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Succeeded | Outcome::ExhaustedWhilePreempted => 0,
            Outcome::FailedBeforeStart | Outcome::FailedUnrelated => 2,
        }
    }
}

/// Failures that abort the orchestration outright.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to submit pipeline run: {0}")]
    Submit(ApiError),

    #[error("network error while polling running operation: {0}")]
    PollTransport(ApiError),

    #[error("failed to query zone operations: {0}")]
    Classify(ApiError),

    #[error("retry budget allows no attempts")]
    EmptyBudget,
}

pub struct Runner<'a> {
    pipelines: &'a dyn PipelinesApi,
    classifier: FailureClassifier<'a>,
    poller: OperationPoller,
    spec: JobSpec,
    budget: RetryBudget,
}

impl<'a> Runner<'a> {
    pub fn new(
        pipelines: &'a dyn PipelinesApi,
        compute: &'a dyn ZoneOperationsApi,
        project: &'a str,
        spec: JobSpec,
        budget: RetryBudget,
        poller: OperationPoller,
    ) -> Self {
        Self {
            pipelines,
            classifier: FailureClassifier::new(compute, project),
            poller,
            spec,
            budget,
        }
    }

    /// Overrides the delay before each preemption query, for tests.
    pub fn with_settle_delay(mut self, settle_delay: std::time::Duration) -> Self {
        self.classifier = self.classifier.with_settle_delay(settle_delay);
        self
    }

    /// Drives the job to a terminal outcome.
    pub async fn run(mut self) -> Result<Outcome, RunError> {
        let mut attempt = 0u32;

        while let Some(mode) = self.budget.next_mode() {
            self.budget.consume(mode);
            attempt += 1;

            let preemptible = mode == AttemptMode::Preemptible;
            log::info!(
                "Starting attempt {attempt} ({mode:?}, {} attempts left after this one)",
                self.budget.remaining()
            );

            let request = self.spec.to_request(preemptible);
            let handle = self
                .pipelines
                .run_pipeline(&request)
                .await
                .map_err(RunError::Submit)?;

            let operation = self
                .poller
                .await_terminal(self.pipelines, &handle)
                .await
                .map_err(RunError::PollTransport)?;

            if operation.error.is_none() {
                log::info!("Operation {} succeeded", operation.name);
                return Ok(Outcome::Succeeded);
            }

            if let Some(error) = &operation.error {
                log::warn!(
                    "Operation {} failed: {} (code {})",
                    operation.name,
                    error.message,
                    error.code
                );
            }

            match self
                .classifier
                .classify(&operation)
                .await
                .map_err(RunError::Classify)?
            {
                Classification::NeverStarted => {
                    log::error!("Pipeline operation failed before running");
                    return Ok(Outcome::FailedBeforeStart);
                }
                Classification::Unrelated => {
                    log::error!("Attempt {attempt} failed, but not due to preemption");
                    return Ok(Outcome::FailedUnrelated);
                }
                Classification::Preempted => {
                    if self.budget.next_mode().is_none() {
                        log::warn!("Final attempt failed due to preemption; budget exhausted");
                        return Ok(Outcome::ExhaustedWhilePreempted);
                    }
                    log::info!("Attempt {attempt} was preempted, retrying");
                }
            }
        }

        // Only reachable when the budget admitted no attempts at all;
        // config validation rejects that combination up front.
        Err(RunError::EmptyBudget)
    }
}
