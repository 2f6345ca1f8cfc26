//! Step ordering
//!
//! A workflow is an ordered list of steps. Step N+1 may only be submitted
//! once step N resolved Mined; `StepSequence::check_next` enforces this
//! before every submission.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use super::error::WorkflowError;
use crate::core_types::QueueId;
use crate::finality::{
    BackgroundOutcome, BackgroundSupervisor, Finality, FinalityHandle, FinalityTracker, TrackError,
};
use crate::submit::{Operation, OperationKind, OperationSubmitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Submitted, tracking in progress
    Submitted,
    Mined,
    /// Foreground budget spent, background tracking owns it
    Escalated,
    Cancelled,
    /// Background budget spent without a terminal status
    Exhausted,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Submitted => "SUBMITTED",
            StepStatus::Mined => "MINED",
            StepStatus::Escalated => "ESCALATED",
            StepStatus::Cancelled => "CANCELLED",
            StepStatus::Exhausted => "EXHAUSTED",
        };
        write!(f, "{}", s)
    }
}

impl From<BackgroundOutcome> for StepStatus {
    fn from(outcome: BackgroundOutcome) -> Self {
        match outcome {
            BackgroundOutcome::Mined => StepStatus::Mined,
            BackgroundOutcome::Cancelled => StepStatus::Cancelled,
            BackgroundOutcome::Exhausted => StepStatus::Exhausted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStep {
    pub kind: OperationKind,
    pub queue_id: QueueId,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Default)]
pub struct StepSequence {
    steps: Vec<WorkflowStep>,
}

impl StepSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<WorkflowStep> {
        self.steps
    }

    /// Refuse `kind` unless the previous step resolved Mined
    pub fn check_next(&self, kind: OperationKind) -> Result<(), WorkflowError> {
        if let Some(prev) = self.steps.last()
            && prev.status != StepStatus::Mined
        {
            return Err(WorkflowError::OrderingViolation(format!(
                "{} attempted while {} {} is {}",
                kind, prev.kind, prev.queue_id, prev.status
            )));
        }
        Ok(())
    }

    fn record(&mut self, kind: OperationKind, queue_id: QueueId) -> usize {
        self.steps.push(WorkflowStep {
            kind,
            queue_id,
            status: StepStatus::Submitted,
        });
        self.steps.len() - 1
    }

    pub(crate) fn resolve(&mut self, index: usize, status: StepStatus) {
        if let Some(step) = self.steps.get_mut(index) {
            step.status = status;
        }
    }
}

/// How a step ended from the caller's point of view
#[derive(Debug)]
pub(crate) enum StepResult {
    Mined(QueueId),
    Escalated(FinalityHandle),
}

/// Submit-then-track for a single step, shared by every workflow
#[derive(Clone)]
pub(crate) struct StepRunner {
    submitter: OperationSubmitter,
    tracker: Arc<FinalityTracker>,
}

impl StepRunner {
    pub(crate) fn new(submitter: OperationSubmitter, tracker: Arc<FinalityTracker>) -> Self {
        Self { submitter, tracker }
    }

    pub(crate) fn supervisor(&self) -> &Arc<BackgroundSupervisor> {
        self.tracker.supervisor()
    }

    pub(crate) async fn run(
        &self,
        sequence: &mut StepSequence,
        op: &Operation,
    ) -> Result<StepResult, WorkflowError> {
        let kind = op.kind();
        sequence.check_next(kind)?;

        let queue_id = self
            .submitter
            .submit(op)
            .await
            .map_err(|source| WorkflowError::Submission { kind, source })?;
        let index = sequence.record(kind, queue_id.clone());

        match self.tracker.track(&queue_id).await {
            Ok(Finality::Mined) => {
                sequence.resolve(index, StepStatus::Mined);
                info!(queue_id = %queue_id, kind = %kind, step = index + 1, "Step confirmed");
                Ok(StepResult::Mined(queue_id))
            }
            Ok(Finality::Escalated(handle)) => {
                sequence.resolve(index, StepStatus::Escalated);
                info!(
                    queue_id = %queue_id,
                    kind = %kind,
                    step = index + 1,
                    "Step accepted, confirmation pending in background"
                );
                Ok(StepResult::Escalated(handle))
            }
            Err(e) => {
                if matches!(e, TrackError::Cancelled(_)) {
                    sequence.resolve(index, StepStatus::Cancelled);
                }
                error!(queue_id = %queue_id, kind = %kind, error = %e, "Step failed");
                Err(WorkflowError::from_track(kind, e))
            }
        }
    }
}
