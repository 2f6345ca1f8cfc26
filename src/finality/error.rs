use thiserror::Error;

use super::ownership::Owner;
use crate::core_types::QueueId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    /// Terminal failure reported by the engine
    #[error("Transaction {0} was cancelled")]
    Cancelled(QueueId),

    /// Another tracker already polls this queue id
    #[error("Transaction {queue_id} is already tracked by the {owner} tracker")]
    AlreadyTracked { queue_id: QueueId, owner: Owner },
}
