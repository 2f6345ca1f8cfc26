//! Engine Finality - Queue-handle transaction tracking
//!
//! Drives on-chain operations submitted through an asynchronous execution
//! engine (submit now, poll later) to finality, and orders multi-step
//! workflows on that finality.
//!
//! # Modules
//!
//! - [`core_types`] - QueueId, chain and address aliases
//! - [`config`] - YAML application configuration
//! - [`logging`] - tracing subscriber bootstrap
//! - [`engine`] - ExecutionEngine seam, REST client, mock
//! - [`finality`] - Status polling, foreground tracker, background supervisor
//! - [`submit`] - One builder per operation kind
//! - [`workflow`] - Transfer and stake workflows

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod logging;

pub mod engine;
pub mod finality;
pub mod submit;
pub mod workflow;

// Convenient re-exports at crate root
pub use core_types::{Address, ChainId, QueueId};
pub use engine::{EngineError, ExecutionEngine, HttpEngineClient};
pub use finality::{
    BackgroundOutcome, BackgroundSupervisor, Finality, FinalityHandle, FinalityTracker,
    StatusPoller, TrackError, TrackingPolicy, TransactionStatus,
};
pub use submit::{Operation, OperationKind, OperationSubmitter};
pub use workflow::{
    StakeReceipt, StakeWorkflow, TokenRegistry, TransferOutcome, TransferReceipt,
    TransferRequest, TransferWorkflow, WorkflowError,
};
