//! Tracking policy and per-queue-id session state

use std::time::Duration;

use tracing::info;

use super::status::TransactionStatus;
use crate::config::PolicyConfig;
use crate::core_types::QueueId;

/// Polling budget for one tracking phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingPolicy {
    pub poll_interval: Duration,
    pub max_pending_retries: u32,
    pub max_error_retries: u32,
}

impl TrackingPolicy {
    pub fn new(poll_interval: Duration, max_pending_retries: u32, max_error_retries: u32) -> Self {
        Self {
            poll_interval,
            max_pending_retries,
            max_error_retries,
        }
    }
}

impl From<&PolicyConfig> for TrackingPolicy {
    fn from(config: &PolicyConfig) -> Self {
        Self::new(
            Duration::from_millis(config.poll_interval_ms),
            config.max_pending_retries,
            config.max_error_retries,
        )
    }
}

/// Which budget ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedBudget {
    Pending,
    Errored,
}

/// Transient tracking state for one queue id
///
/// Counters are consumed monotonically and travel with the session when
/// it is handed to the background supervisor. They are never reset.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    queue_id: QueueId,
    last_status: Option<TransactionStatus>,
    pending_retries: u32,
    error_retries: u32,
    /// Polls that could not read a status (consume no budget)
    network_errors: u32,
    polls: u32,
}

impl TrackingSession {
    pub fn new(queue_id: QueueId) -> Self {
        Self {
            queue_id,
            last_status: None,
            pending_retries: 0,
            error_retries: 0,
            network_errors: 0,
            polls: 0,
        }
    }

    pub fn queue_id(&self) -> &QueueId {
        &self.queue_id
    }

    pub fn last_status(&self) -> Option<TransactionStatus> {
        self.last_status
    }

    pub fn pending_retries(&self) -> u32 {
        self.pending_retries
    }

    pub fn error_retries(&self) -> u32 {
        self.error_retries
    }

    pub fn network_errors(&self) -> u32 {
        self.network_errors
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Record an observed status; logs only on change
    pub(crate) fn observe(&mut self, status: TransactionStatus, phase: &'static str) {
        self.polls += 1;
        if self.last_status != Some(status) {
            info!(
                queue_id = %self.queue_id,
                phase,
                status = %status,
                "Transaction status changed"
            );
            self.last_status = Some(status);
        }
    }

    pub(crate) fn observe_network_error(&mut self) {
        self.polls += 1;
        self.network_errors += 1;
    }

    /// Count one more Pending poll; returns the budget hit, if any
    pub(crate) fn consume_pending(&mut self, policy: &TrackingPolicy) -> Option<ExhaustedBudget> {
        self.pending_retries += 1;
        (self.pending_retries >= policy.max_pending_retries).then_some(ExhaustedBudget::Pending)
    }

    pub(crate) fn error_budget_left(&self, policy: &TrackingPolicy) -> bool {
        self.error_retries < policy.max_error_retries
    }

    pub(crate) fn consume_error_retry(&mut self) {
        self.error_retries += 1;
    }
}
