//! Workflow Error Types
//!
//! Only cancellation and ordering violations come out of a running
//! workflow; retries, network trouble and escalation are absorbed by the
//! finality trackers. The rest are input or submission failures that occur
//! before anything is tracked.

use thiserror::Error;

use crate::core_types::QueueId;
use crate::engine::EngineError;
use crate::finality::TrackError;
use crate::submit::OperationKind;

#[derive(Error, Debug, Clone)]
pub enum WorkflowError {
    // === Validation Errors ===
    #[error("Amount must be a positive decimal: {0}")]
    InvalidAmount(String),

    #[error("Amount precision exceeds {0} decimals")]
    PrecisionOverflow(u32),

    #[error("Amount would cause overflow")]
    Overflow,

    #[error("Unrecognized token: {0}")]
    UnknownToken(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    // === Execution Errors ===
    #[error("Failed to submit {kind}: {source}")]
    Submission {
        kind: OperationKind,
        #[source]
        source: EngineError,
    },

    #[error("{kind} transaction {queue_id} was cancelled")]
    Cancelled {
        kind: OperationKind,
        queue_id: QueueId,
    },

    #[error("Step ordering violation: {0}")]
    OrderingViolation(String),

    #[error("Transaction {0} is already being tracked")]
    AlreadyTracked(QueueId),

    #[error("Allowance {0} did not reach finality, transfer was not submitted")]
    AllowanceNotFinal(QueueId),

    #[error("Failed to read contract: {0}")]
    ContractRead(String),

    #[error("Deferred step did not complete: {0}")]
    ContinuationFailed(String),
}

impl WorkflowError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::InvalidAmount(_) => "INVALID_AMOUNT",
            WorkflowError::PrecisionOverflow(_) => "PRECISION_OVERFLOW",
            WorkflowError::Overflow => "OVERFLOW",
            WorkflowError::UnknownToken(_) => "UNKNOWN_TOKEN",
            WorkflowError::InvalidAddress(_) => "INVALID_ADDRESS",
            WorkflowError::Submission { .. } => "SUBMISSION_FAILED",
            WorkflowError::Cancelled { .. } => "TRANSACTION_CANCELLED",
            WorkflowError::OrderingViolation(_) => "ORDERING_VIOLATION",
            WorkflowError::AlreadyTracked(_) => "ALREADY_TRACKED",
            WorkflowError::AllowanceNotFinal(_) => "ALLOWANCE_NOT_FINAL",
            WorkflowError::ContractRead(_) => "CONTRACT_READ_FAILED",
            WorkflowError::ContinuationFailed(_) => "CONTINUATION_FAILED",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            WorkflowError::InvalidAmount(_)
            | WorkflowError::PrecisionOverflow(_)
            | WorkflowError::Overflow
            | WorkflowError::UnknownToken(_)
            | WorkflowError::InvalidAddress(_) => 400,
            WorkflowError::AlreadyTracked(_) => 409,
            WorkflowError::Cancelled { .. } | WorkflowError::AllowanceNotFinal(_) => 422,
            WorkflowError::OrderingViolation(_) | WorkflowError::ContinuationFailed(_) => 500,
            WorkflowError::Submission { source, .. } if source.is_transient() => 503,
            WorkflowError::Submission { .. } | WorkflowError::ContractRead(_) => 502,
        }
    }

    pub(crate) fn from_track(kind: OperationKind, err: TrackError) -> Self {
        match err {
            TrackError::Cancelled(queue_id) => WorkflowError::Cancelled { kind, queue_id },
            TrackError::AlreadyTracked { queue_id, .. } => WorkflowError::AlreadyTracked(queue_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            WorkflowError::InvalidAmount("x".into()).code(),
            "INVALID_AMOUNT"
        );
        assert_eq!(
            WorkflowError::OrderingViolation("x".into()).code(),
            "ORDERING_VIOLATION"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(WorkflowError::UnknownToken("DOGE".into()).http_status(), 400);
        assert_eq!(
            WorkflowError::Cancelled {
                kind: OperationKind::SetAllowance,
                queue_id: QueueId::new("q1"),
            }
            .http_status(),
            422
        );
        assert_eq!(
            WorkflowError::Submission {
                kind: OperationKind::ContractWrite,
                source: EngineError::Network("down".into()),
            }
            .http_status(),
            503
        );
        assert_eq!(
            WorkflowError::Submission {
                kind: OperationKind::ContractWrite,
                source: EngineError::Rejected {
                    status: 400,
                    message: "bad".into()
                },
            }
            .http_status(),
            502
        );
    }

    #[test]
    fn test_from_track_error() {
        let err = WorkflowError::from_track(
            OperationKind::Erc20Transfer,
            TrackError::Cancelled(QueueId::new("q9")),
        );
        assert_eq!(
            err.to_string(),
            "ERC20_TRANSFER transaction q9 was cancelled"
        );
    }
}
