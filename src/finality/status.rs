//! Transaction status and the status poller
//!
//! The poller turns one engine status query into a [`PollOutcome`].
//! Failing to *read* a status is reported as `NetworkError`, never as
//! `Errored`: it says nothing about the transaction itself.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::core_types::QueueId;
use crate::engine::ExecutionEngine;

/// Normalized engine-side transaction status
///
/// Terminal: Mined, Cancelled.
/// Errored may return to Pending after retry-failed / sync-retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    Pending,
    Mined,
    Errored,
    Cancelled,
}

impl TransactionStatus {
    /// Map a raw engine status string
    ///
    /// Every in-flight engine state (`queued`, `sent`, `processed`,
    /// `retried`, `user-op-sent`) is Pending. Unknown strings map to None.
    pub fn from_engine(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "mined" => Some(TransactionStatus::Mined),
            "errored" => Some(TransactionStatus::Errored),
            "cancelled" | "canceled" => Some(TransactionStatus::Cancelled),
            "queued" | "sent" | "processed" | "retried" | "user-op-sent" | "pending" => {
                Some(TransactionStatus::Pending)
            }
            _ => None,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Mined | TransactionStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Mined => "MINED",
            TransactionStatus::Errored => "ERRORED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Status(TransactionStatus),
    /// The status could not be read
    NetworkError(String),
}

/// Queries the engine for one queue id at a time
#[derive(Clone)]
pub struct StatusPoller {
    engine: Arc<dyn ExecutionEngine>,
}

impl StatusPoller {
    pub fn new(engine: Arc<dyn ExecutionEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<dyn ExecutionEngine> {
        &self.engine
    }

    pub async fn poll(&self, queue_id: &QueueId) -> PollOutcome {
        match self.engine.get_status(queue_id).await {
            Ok(raw) => {
                let status = TransactionStatus::from_engine(&raw).unwrap_or_else(|| {
                    warn!(
                        queue_id = %queue_id,
                        raw_status = %raw,
                        "Unknown engine status, treating as pending"
                    );
                    TransactionStatus::Pending
                });
                PollOutcome::Status(status)
            }
            Err(e) => PollOutcome::NetworkError(e.to_string()),
        }
    }
}
