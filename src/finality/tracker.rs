//! Finality Tracker
//!
//! Bounded foreground polling of one queue id.
//!
//! # State Machine
//!
//! ```text
//!            ┌── NetworkError (no budget) ──┐
//!            ▼                              │
//!         POLLING ──────────────────────────┘
//!          │  │  │
//!   Mined ─┘  │  └─ Cancelled ──▶ CANCELLED (error to caller)
//!    ▼        │
//!  MINED      ├─ Errored, budget left ──▶ retry-failed + sync-retry, POLLING
//!             ├─ Errored, no budget ───▶ ESCALATED
//!             └─ Pending ─▶ pending_retries++ ─▶ at max: ESCALATED
//! ```
//!
//! Pending and Errored draw on separate budgets: a slow transaction is not
//! a failing one. Escalation hands the session to the background
//! supervisor and is reported to the caller as accepted, not as an error.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use super::error::TrackError;
use super::ownership::OwnershipRegistry;
use super::session::{ExhaustedBudget, TrackingPolicy, TrackingSession};
use super::status::{PollOutcome, StatusPoller, TransactionStatus};
use super::supervisor::{BackgroundSupervisor, FinalityHandle};
use crate::core_types::QueueId;
use crate::logging::POLL_TRACE_TARGET;

/// Log "still waiting" every N polls
const LOG_EVERY: u32 = 3;

/// How a polling run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopExit {
    Mined,
    Cancelled,
    Exhausted(ExhaustedBudget),
}

/// Poll/retry loop shared by the foreground tracker and the background
/// supervisor
#[derive(Clone)]
pub(crate) struct PollingLoop {
    poller: StatusPoller,
}

impl PollingLoop {
    pub(crate) fn new(poller: StatusPoller) -> Self {
        Self { poller }
    }

    /// Poll until a terminal status or until a budget of `policy` runs out
    pub(crate) async fn run(
        &self,
        session: &mut TrackingSession,
        policy: &TrackingPolicy,
        phase: &'static str,
    ) -> LoopExit {
        loop {
            let queue_id = session.queue_id().clone();
            let outcome = self.poller.poll(&queue_id).await;
            trace!(target: POLL_TRACE_TARGET, queue_id = %queue_id, phase, ?outcome, "poll");

            match outcome {
                PollOutcome::NetworkError(reason) => {
                    session.observe_network_error();
                    warn!(
                        queue_id = %queue_id,
                        phase,
                        error = %reason,
                        "Network error while checking transaction, retrying"
                    );
                }
                PollOutcome::Status(status) => {
                    session.observe(status, phase);

                    match status {
                        TransactionStatus::Mined => {
                            info!(queue_id = %queue_id, phase, "Transaction mined");
                            return LoopExit::Mined;
                        }
                        TransactionStatus::Cancelled => {
                            warn!(queue_id = %queue_id, phase, "Transaction cancelled");
                            return LoopExit::Cancelled;
                        }
                        TransactionStatus::Errored => {
                            if !session.error_budget_left(policy) {
                                warn!(
                                    queue_id = %queue_id,
                                    phase,
                                    error_retries = session.error_retries(),
                                    "Error retry budget exhausted"
                                );
                                return LoopExit::Exhausted(ExhaustedBudget::Errored);
                            }
                            self.retry_errored(session, policy, phase).await;
                        }
                        TransactionStatus::Pending => {
                            if let Some(budget) = session.consume_pending(policy) {
                                debug!(
                                    queue_id = %queue_id,
                                    phase,
                                    pending_retries = session.pending_retries(),
                                    "Pending retry budget exhausted"
                                );
                                return LoopExit::Exhausted(budget);
                            }
                            if session.polls() % LOG_EVERY == 0 {
                                info!(
                                    queue_id = %queue_id,
                                    phase,
                                    pending_retries = session.pending_retries(),
                                    "Still waiting for transaction to be mined"
                                );
                            }
                        }
                    }
                }
            }

            tokio::time::sleep(policy.poll_interval).await;
        }
    }

    /// Re-drive an errored operation on its existing queue id
    ///
    /// Every Errored observation consumes one error retry, whether or not
    /// the engine accepts the retry calls. `sync_retry` is skipped when
    /// `retry_failed` was refused.
    async fn retry_errored(
        &self,
        session: &mut TrackingSession,
        policy: &TrackingPolicy,
        phase: &'static str,
    ) {
        let queue_id = session.queue_id().clone();
        let engine = self.poller.engine();

        session.consume_error_retry();
        warn!(
            queue_id = %queue_id,
            phase,
            "Transaction errored, retrying ({}/{})",
            session.error_retries(),
            policy.max_error_retries
        );

        if let Err(e) = engine.retry_failed(&queue_id).await {
            warn!(queue_id = %queue_id, phase, error = %e, "retry-failed call did not go through");
            return;
        }

        if let Err(e) = engine.sync_retry(&queue_id).await {
            warn!(queue_id = %queue_id, phase, error = %e, "sync-retry call did not go through");
        }
    }
}

/// Result of foreground tracking
#[derive(Debug)]
pub enum Finality {
    /// Terminal success
    Mined,
    /// Handed to background tracking; confirmation still pending
    Escalated(FinalityHandle),
}

impl Finality {
    pub fn is_mined(&self) -> bool {
        matches!(self, Finality::Mined)
    }
}

/// Foreground tracker with a bounded budget
pub struct FinalityTracker {
    polling: PollingLoop,
    policy: TrackingPolicy,
    ownership: Arc<OwnershipRegistry>,
    supervisor: Arc<BackgroundSupervisor>,
}

impl FinalityTracker {
    /// Create a tracker that escalates into `supervisor`
    ///
    /// The tracker shares the supervisor's ownership registry.
    pub fn new(
        poller: StatusPoller,
        policy: TrackingPolicy,
        supervisor: Arc<BackgroundSupervisor>,
    ) -> Self {
        Self {
            polling: PollingLoop::new(poller),
            policy,
            ownership: supervisor.ownership().clone(),
            supervisor,
        }
    }

    pub fn policy(&self) -> &TrackingPolicy {
        &self.policy
    }

    pub fn supervisor(&self) -> &Arc<BackgroundSupervisor> {
        &self.supervisor
    }

    /// Track `queue_id` until Mined, Cancelled, or escalation
    pub async fn track(&self, queue_id: &QueueId) -> Result<Finality, TrackError> {
        self.ownership
            .claim(queue_id)
            .map_err(|owner| TrackError::AlreadyTracked {
                queue_id: queue_id.clone(),
                owner,
            })?;

        let mut session = TrackingSession::new(queue_id.clone());
        let exit = self
            .polling
            .run(&mut session, &self.policy, "foreground")
            .await;

        match exit {
            LoopExit::Mined => {
                self.ownership.release(queue_id);
                Ok(Finality::Mined)
            }
            LoopExit::Cancelled => {
                self.ownership.release(queue_id);
                Err(TrackError::Cancelled(queue_id.clone()))
            }
            LoopExit::Exhausted(budget) => {
                warn!(
                    queue_id = %queue_id,
                    ?budget,
                    pending_retries = session.pending_retries(),
                    error_retries = session.error_retries(),
                    "Moving transaction to background monitoring"
                );
                let handle = self.supervisor.adopt(session);
                Ok(Finality::Escalated(handle))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, MockEngine, MockStatus};
    use crate::finality::ownership::Owner;
    use crate::finality::supervisor::BackgroundOutcome;
    use std::time::Duration;

    fn setup(
        max_pending: u32,
        max_error: u32,
    ) -> (Arc<MockEngine>, FinalityTracker, Arc<BackgroundSupervisor>) {
        let engine = Arc::new(MockEngine::new());
        let poller = StatusPoller::new(engine.clone());
        let supervisor = Arc::new(BackgroundSupervisor::new(
            poller.clone(),
            TrackingPolicy::new(Duration::from_millis(1), 20, 20),
            4,
        ));
        let tracker = FinalityTracker::new(
            poller,
            TrackingPolicy::new(Duration::from_millis(1), max_pending, max_error),
            supervisor.clone(),
        );
        (engine, tracker, supervisor)
    }

    #[tokio::test]
    async fn test_mined_on_first_poll_issues_no_retries() {
        let (engine, tracker, _) = setup(3, 3);
        let id = QueueId::new("q1");
        engine.script(&id, vec![MockStatus::MINED]);

        let finality = tracker.track(&id).await.unwrap();

        assert!(finality.is_mined());
        assert_eq!(engine.status_calls(&id), 1);
        assert_eq!(engine.retry_failed_count(), 0);
        assert_eq!(engine.sync_retry_count(), 0);
    }

    #[tokio::test]
    async fn test_errored_up_to_budget_then_mined() {
        let (engine, tracker, _) = setup(10, 3);
        let id = QueueId::new("q1");
        engine.script(
            &id,
            vec![
                MockStatus::ERRORED,
                MockStatus::ERRORED,
                MockStatus::ERRORED,
                MockStatus::MINED,
            ],
        );

        let finality = tracker.track(&id).await.unwrap();

        assert!(finality.is_mined());
        assert_eq!(engine.retry_failed_count(), 3);
        assert_eq!(engine.sync_retry_count(), 3);
    }

    #[tokio::test]
    async fn test_always_pending_escalates_after_max_polls() {
        let (engine, tracker, supervisor) = setup(3, 3);
        let id = QueueId::new("q1");
        engine.script(
            &id,
            vec![
                MockStatus::PENDING,
                MockStatus::PENDING,
                MockStatus::PENDING,
                MockStatus::MINED,
            ],
        );

        let finality = tracker.track(&id).await.unwrap();

        let Finality::Escalated(handle) = finality else {
            panic!("expected escalation");
        };
        // Exactly 3 foreground polls before escalation; the background
        // tracker then observes the 4th scripted status
        assert_eq!(handle.outcome().await, BackgroundOutcome::Mined);
        assert_eq!(engine.status_calls(&id), 4);
        assert!(supervisor.active().is_empty());
    }

    #[tokio::test]
    async fn test_network_errors_consume_no_budget() {
        let (engine, tracker, _) = setup(2, 1);
        let id = QueueId::new("q1");
        engine.script(
            &id,
            vec![
                MockStatus::NetworkError,
                MockStatus::NetworkError,
                MockStatus::NetworkError,
                MockStatus::NetworkError,
                MockStatus::PENDING,
                MockStatus::MINED,
            ],
        );

        let finality = tracker.track(&id).await.unwrap();

        assert!(finality.is_mined());
        assert_eq!(engine.status_calls(&id), 6);
        assert_eq!(engine.retry_failed_count(), 0);
    }

    #[tokio::test]
    async fn test_errored_beyond_budget_escalates() {
        let (engine, tracker, _) = setup(10, 2);
        let id = QueueId::new("q1");
        engine.script(
            &id,
            vec![
                MockStatus::ERRORED,
                MockStatus::ERRORED,
                MockStatus::ERRORED,
                MockStatus::MINED,
            ],
        );

        let finality = tracker.track(&id).await.unwrap();

        assert!(matches!(finality, Finality::Escalated(_)));
        // Two retries in the foreground; the third Errored escalates
        assert_eq!(engine.status_calls(&id), 3);
        assert_eq!(engine.retry_failed_count(), 2);
    }

    #[tokio::test]
    async fn test_refused_retry_still_consumes_error_budget() {
        let (engine, tracker, _) = setup(3, 3);
        let id = QueueId::new("q1");
        engine.script(&id, vec![MockStatus::ERRORED]);
        engine.set_fail_retry_failed(Some(EngineError::Rejected {
            status: 400,
            message: "not retryable".into(),
        }));

        let finality = tokio::time::timeout(Duration::from_secs(5), tracker.track(&id))
            .await
            .expect("tracker must escalate on a bounded error budget")
            .unwrap();

        assert!(matches!(finality, Finality::Escalated(_)));
        // Three refused retries, the fourth Errored escalates
        assert_eq!(engine.status_calls(&id), 4);
        assert_eq!(engine.retry_failed_count(), 3);
        assert_eq!(engine.sync_retry_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_on_retry_consumes_error_budget() {
        let (engine, tracker, _) = setup(3, 2);
        let id = QueueId::new("q1");
        engine.script(&id, vec![MockStatus::ERRORED]);
        engine.set_fail_retry_failed(Some(EngineError::Network("reset".into())));

        let finality = tracker.track(&id).await.unwrap();

        assert!(matches!(finality, Finality::Escalated(_)));
        assert_eq!(engine.retry_failed_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_sync_retry_still_counts() {
        let (engine, tracker, _) = setup(10, 2);
        let id = QueueId::new("q1");
        engine.script(&id, vec![MockStatus::ERRORED]);
        engine.set_fail_sync_retry(Some(EngineError::Network("reset".into())));

        let finality = tracker.track(&id).await.unwrap();

        assert!(matches!(finality, Finality::Escalated(_)));
        assert_eq!(engine.status_calls(&id), 3);
        assert_eq!(engine.retry_failed_count(), 2);
        assert_eq!(engine.sync_retry_count(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_is_an_error() {
        let (engine, tracker, _) = setup(3, 3);
        let id = QueueId::new("q1");
        engine.script(&id, vec![MockStatus::PENDING, MockStatus::CANCELLED]);

        let err = tracker.track(&id).await.unwrap_err();

        assert_eq!(err, TrackError::Cancelled(id.clone()));
        assert_eq!(tracker.supervisor().ownership().owner(&id), None);
    }

    #[tokio::test]
    async fn test_second_tracker_on_same_queue_id_rejected() {
        let (engine, tracker, supervisor) = setup(3, 3);
        let id = QueueId::new("q1");
        engine.script(&id, vec![MockStatus::MINED]);

        supervisor.ownership().claim(&id).unwrap();
        let err = tracker.track(&id).await.unwrap_err();

        assert!(matches!(
            err,
            TrackError::AlreadyTracked {
                owner: Owner::Foreground,
                ..
            }
        ));
        assert_eq!(engine.status_calls(&id), 0);
    }
}
