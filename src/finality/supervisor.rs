//! Background Finality Supervisor
//!
//! Takes over queue ids the foreground tracker escalated and keeps
//! polling them with a larger, still finite budget, detached from the
//! request that submitted them.
//!
//! - One task per adopted queue id, spawned at adoption
//! - At most `max_concurrent` tasks poll at once; the rest wait for a permit
//!   while still owning their queue id
//! - Exhausted queue ids are kept in an in-memory reconciliation ledger
//! - Every outcome is published on a broadcast channel
//! - Follow-up work gated on a background outcome runs as a supervised
//!   continuation, keyed by the queue id it waits on

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Semaphore, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::ownership::OwnershipRegistry;
use super::session::{ExhaustedBudget, TrackingPolicy, TrackingSession};
use super::status::{StatusPoller, TransactionStatus};
use super::tracker::{LoopExit, PollingLoop};
use crate::core_types::QueueId;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Final result of background tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundOutcome {
    Mined,
    Cancelled,
    /// Background budget consumed without a terminal status
    Exhausted,
}

/// Awaitable view of one background-tracked queue id
#[derive(Debug, Clone)]
pub struct FinalityHandle {
    queue_id: QueueId,
    rx: watch::Receiver<Option<BackgroundOutcome>>,
}

impl FinalityHandle {
    pub fn queue_id(&self) -> &QueueId {
        &self.queue_id
    }

    /// Outcome if background tracking already finished
    pub fn try_outcome(&self) -> Option<BackgroundOutcome> {
        *self.rx.borrow()
    }

    /// Wait for background tracking to finish
    ///
    /// A tracking task that disappeared without reporting counts as
    /// exhausted.
    pub async fn outcome(mut self) -> BackgroundOutcome {
        match self.rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).unwrap_or(BackgroundOutcome::Exhausted),
            Err(_) => BackgroundOutcome::Exhausted,
        }
    }
}

/// Published when a background tracker stops
#[derive(Debug, Clone)]
pub struct BackgroundEvent {
    pub queue_id: QueueId,
    pub outcome: BackgroundOutcome,
    pub pending_retries: u32,
    pub error_retries: u32,
}

/// Reconciliation ledger entry for a queue id nobody tracks anymore
#[derive(Debug, Clone)]
pub struct ExhaustedRecord {
    pub queue_id: QueueId,
    pub last_status: Option<TransactionStatus>,
    pub pending_retries: u32,
    pub error_retries: u32,
    pub network_errors: u32,
    pub adopted_at: DateTime<Utc>,
    pub exhausted_at: DateTime<Utc>,
}

struct ActiveEntry {
    handle: FinalityHandle,
}

/// Marks a continuation finished when dropped, panics included
struct ContinuationGuard {
    supervisor: Arc<BackgroundSupervisor>,
    key: QueueId,
    done: watch::Sender<bool>,
}

impl Drop for ContinuationGuard {
    fn drop(&mut self) {
        self.supervisor.continuations.remove(&self.key);
        let _ = self.done.send(true);
    }
}

pub struct BackgroundSupervisor {
    polling: PollingLoop,
    policy: TrackingPolicy,
    ownership: Arc<OwnershipRegistry>,
    permits: Arc<Semaphore>,
    active: DashMap<QueueId, ActiveEntry>,
    exhausted: DashMap<QueueId, ExhaustedRecord>,
    continuations: DashMap<QueueId, watch::Receiver<bool>>,
    events: broadcast::Sender<BackgroundEvent>,
}

impl BackgroundSupervisor {
    pub fn new(poller: StatusPoller, policy: TrackingPolicy, max_concurrent: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            polling: PollingLoop::new(poller),
            policy,
            ownership: Arc::new(OwnershipRegistry::new()),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            active: DashMap::new(),
            exhausted: DashMap::new(),
            continuations: DashMap::new(),
            events,
        }
    }

    pub fn ownership(&self) -> &Arc<OwnershipRegistry> {
        &self.ownership
    }

    pub fn policy(&self) -> &TrackingPolicy {
        &self.policy
    }

    /// Take ownership of an escalated session and start tracking it
    ///
    /// Adopting a queue id the background already owns returns the
    /// existing handle; it never starts a second tracker. The check and
    /// the hand-off happen under the `active` entry lock.
    pub fn adopt(self: &Arc<Self>, session: TrackingSession) -> FinalityHandle {
        let queue_id = session.queue_id().clone();

        let (handle, tx) = match self.active.entry(queue_id.clone()) {
            Entry::Occupied(e) => {
                debug!(queue_id = %queue_id, "Queue id already tracked in background");
                return e.get().handle.clone();
            }
            Entry::Vacant(e) => {
                self.ownership.hand_off(&queue_id);
                let (tx, rx) = watch::channel(None);
                let handle = FinalityHandle {
                    queue_id: queue_id.clone(),
                    rx,
                };
                e.insert(ActiveEntry {
                    handle: handle.clone(),
                });
                (handle, tx)
            }
        };
        let adopted_at = Utc::now();

        info!(
            queue_id = %queue_id,
            pending_retries = session.pending_retries(),
            error_retries = session.error_retries(),
            active = self.active.len(),
            owned = self.ownership.len(),
            "Background tracking started"
        );

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = supervisor.track(session, adopted_at).await;
            let _ = tx.send(Some(outcome));
        });

        handle
    }

    async fn track(
        &self,
        mut session: TrackingSession,
        adopted_at: DateTime<Utc>,
    ) -> BackgroundOutcome {
        let queue_id = session.queue_id().clone();

        let exit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(_permit) => {
                self.polling
                    .run(&mut session, &self.policy, "background")
                    .await
            }
            Err(_) => {
                error!(queue_id = %queue_id, "Background pool closed");
                LoopExit::Exhausted(ExhaustedBudget::Pending)
            }
        };

        let outcome = match exit {
            LoopExit::Mined => BackgroundOutcome::Mined,
            LoopExit::Cancelled => {
                error!(queue_id = %queue_id, "(Background) Transaction was cancelled");
                BackgroundOutcome::Cancelled
            }
            LoopExit::Exhausted(budget) => {
                error!(
                    queue_id = %queue_id,
                    ?budget,
                    pending_retries = session.pending_retries(),
                    error_retries = session.error_retries(),
                    "(Background) Transaction did not reach finality, giving up"
                );
                self.exhausted.insert(
                    queue_id.clone(),
                    ExhaustedRecord {
                        queue_id: queue_id.clone(),
                        last_status: session.last_status(),
                        pending_retries: session.pending_retries(),
                        error_retries: session.error_retries(),
                        network_errors: session.network_errors(),
                        adopted_at,
                        exhausted_at: Utc::now(),
                    },
                );
                BackgroundOutcome::Exhausted
            }
        };

        // Release under the entry lock; adopt checks and inserts under it too
        let entry = self.active.entry(queue_id.clone());
        self.ownership.release(&queue_id);
        if let Entry::Occupied(e) = entry {
            e.remove();
        }

        if self
            .events
            .send(BackgroundEvent {
                queue_id: queue_id.clone(),
                outcome,
                pending_retries: session.pending_retries(),
                error_retries: session.error_retries(),
            })
            .is_err()
        {
            debug!(queue_id = %queue_id, "No background event subscribers");
        }

        outcome
    }

    /// Queue ids currently owned by background trackers
    pub fn active(&self) -> Vec<QueueId> {
        let mut ids: Vec<QueueId> = self.active.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Queue ids whose background budget ran out
    pub fn exhausted(&self) -> Vec<ExhaustedRecord> {
        let mut records: Vec<ExhaustedRecord> =
            self.exhausted.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| a.exhausted_at.cmp(&b.exhausted_at));
        records
    }

    /// Remove a ledger entry once it has been reconciled
    pub fn acknowledge_exhausted(&self, queue_id: &QueueId) -> Option<ExhaustedRecord> {
        self.exhausted.remove(queue_id).map(|(_, r)| r)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackgroundEvent> {
        self.events.subscribe()
    }

    /// Run `work` as a supervised continuation of `after`
    ///
    /// The task shows up in `continuations()` until it finishes, and
    /// `drain()` waits for it.
    pub fn spawn_continuation<F>(self: &Arc<Self>, after: QueueId, work: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (done, rx) = watch::channel(false);
        self.continuations.insert(after.clone(), rx);
        debug!(queue_id = %after, "Continuation registered");

        let guard = ContinuationGuard {
            supervisor: Arc::clone(self),
            key: after,
            done,
        };
        tokio::spawn(async move {
            let _guard = guard;
            work.await
        })
    }

    /// Queue ids with a continuation still running
    pub fn continuations(&self) -> Vec<QueueId> {
        let mut ids: Vec<QueueId> = self.continuations.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Wait until every background tracker and continuation has stopped
    ///
    /// Continuations may escalate new queue ids, so this repeats until
    /// both sets are empty.
    pub async fn drain(&self) {
        loop {
            let handles: Vec<FinalityHandle> =
                self.active.iter().map(|e| e.handle.clone()).collect();
            let pending: Vec<watch::Receiver<bool>> =
                self.continuations.iter().map(|e| e.value().clone()).collect();
            if handles.is_empty() && pending.is_empty() {
                return;
            }
            warn!(
                trackers = handles.len(),
                continuations = pending.len(),
                "Waiting for background work"
            );
            for handle in handles {
                handle.outcome().await;
            }
            for mut rx in pending {
                let _ = rx.wait_for(|done| *done).await;
            }
        }
    }
}
