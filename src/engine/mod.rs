//! Execution Engine Seam
//!
//! The engine is an external service that accepts on-chain operations,
//! answers each submission with a queue handle, and reports the handle's
//! status on request. Nothing in this crate talks to a chain directly.
//!
//! # Operations
//!
//! ```text
//! submit_*      → QueueId        (one new queued operation per call)
//! get_status    → raw status     (no side effects)
//! retry_failed  → ()             (acts on an existing QueueId)
//! sync_retry    → ()             (acts on an existing QueueId)
//! read_contract → JSON value     (no transaction)
//! ```
//!
//! # Idempotency
//!
//! Only `submit_*` creates work on chain. Recovering from an engine-side
//! error always goes through `retry_failed` + `sync_retry` on the handle
//! that was already issued.

pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock-api"))]
pub mod mock;

pub use error::EngineError;
pub use http::HttpEngineClient;
#[cfg(any(test, feature = "mock-api"))]
pub use mock::{MockEngine, MockStatus, SubmittedCall};

use async_trait::async_trait;
use serde::Serialize;

use crate::core_types::{Address, QueueId};

/// Body of a native-asset transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTransferParams {
    pub to_address: Address,
    /// ERC-20 amount field, always "0" for native transfers
    pub amount: String,
    /// Native value in wei
    pub value_override: String,
}

/// Body of an ERC-20 allowance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowanceParams {
    pub spender_wallet: Address,
    pub amount: String,
}

/// Body of an ERC-20 transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Erc20TransferParams {
    pub to_address: Address,
    pub amount: String,
}

/// Body of a generic contract write
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractWriteParams {
    /// Full function signature, e.g. `function deposit()`
    pub function_signature: String,
    pub args: Vec<serde_json::Value>,
    /// Native value in wei attached to the call
    pub value_override: Option<String>,
    pub abi: Option<serde_json::Value>,
}

/// Execution engine client
///
/// Every method is a network round trip. Implementations must not retry
/// `submit_*` calls on their own: a retried submission is a second
/// on-chain operation.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &'static str;

    async fn submit_native_transfer(
        &self,
        chain: &str,
        contract: &str,
        from_wallet: &str,
        params: NativeTransferParams,
    ) -> Result<QueueId, EngineError>;

    async fn submit_allowance(
        &self,
        chain: &str,
        contract: &str,
        owner_wallet: &str,
        params: AllowanceParams,
    ) -> Result<QueueId, EngineError>;

    async fn submit_erc20_transfer(
        &self,
        chain: &str,
        contract: &str,
        from_wallet: &str,
        params: Erc20TransferParams,
    ) -> Result<QueueId, EngineError>;

    async fn submit_contract_write(
        &self,
        chain: &str,
        contract: &str,
        wallet: &str,
        params: ContractWriteParams,
    ) -> Result<QueueId, EngineError>;

    /// Call a view function and return the raw `result` value
    async fn read_contract(
        &self,
        chain: &str,
        contract: &str,
        function_name: &str,
        args: &[String],
        abi: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, EngineError>;

    /// Raw engine status string for a queued operation
    async fn get_status(&self, queue_id: &QueueId) -> Result<String, EngineError>;

    /// Ask the engine to re-queue an errored operation
    async fn retry_failed(&self, queue_id: &QueueId) -> Result<(), EngineError>;

    /// Ask the engine to resend an errored operation synchronously
    async fn sync_retry(&self, queue_id: &QueueId) -> Result<(), EngineError>;
}
