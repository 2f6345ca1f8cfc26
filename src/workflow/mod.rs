//! Workflows
//!
//! Ordered submit-and-track sequences built on `OperationSubmitter` and
//! `FinalityTracker`. Both workflows share one step runner, so a stake and
//! a transfer step are tracked and escalated identically.

pub mod amount;
pub mod error;
pub mod registry;
pub mod sequence;
pub mod stake;
pub mod transfer;

pub use error::WorkflowError;
pub use registry::{TokenEntry, TokenRegistry};
pub use sequence::{StepSequence, StepStatus, WorkflowStep};
pub use stake::{StakeReceipt, StakeWorkflow, StakingRates};
pub use transfer::{
    DeferredReceipt, DeferredTransfer, TransferOutcome, TransferReceipt, TransferRequest,
    TransferWorkflow,
};
