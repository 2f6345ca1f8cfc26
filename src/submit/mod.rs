//! Operation Submitter
//!
//! One builder per operation kind. Each submission is fire-and-forget and
//! yields exactly one queue id. There is no retry at this layer: a failed
//! or errored operation is recovered through its queue id by the finality
//! tracker, never by submitting it again.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use crate::core_types::{Address, ChainId, NATIVE_ASSET_SENTINEL, QueueId};
use crate::engine::{
    AllowanceParams, ContractWriteParams, EngineError, Erc20TransferParams, ExecutionEngine,
    NativeTransferParams,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    NativeTransfer,
    SetAllowance,
    Erc20Transfer,
    ContractWrite,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::NativeTransfer => "NATIVE_TRANSFER",
            OperationKind::SetAllowance => "SET_ALLOWANCE",
            OperationKind::Erc20Transfer => "ERC20_TRANSFER",
            OperationKind::ContractWrite => "CONTRACT_WRITE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One on-chain operation, ready to submit
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    NativeTransfer {
        chain: ChainId,
        from_wallet: Address,
        to_address: Address,
        /// ERC-20 amount field, "0" for native transfers
        amount: String,
        /// Native value in wei
        value_override: String,
    },
    SetAllowance {
        chain: ChainId,
        token_contract: Address,
        owner_wallet: Address,
        spender_wallet: Address,
        amount: String,
    },
    Erc20Transfer {
        chain: ChainId,
        token_contract: Address,
        from_wallet: Address,
        to_address: Address,
        amount: String,
    },
    ContractWrite {
        chain: ChainId,
        contract: Address,
        wallet: Address,
        function_signature: String,
        args: Vec<serde_json::Value>,
        value_override: Option<String>,
        abi: Option<serde_json::Value>,
    },
}

impl Operation {
    pub fn native_transfer(
        chain: impl Into<ChainId>,
        from_wallet: impl Into<Address>,
        to_address: impl Into<Address>,
        value_wei: impl Into<String>,
    ) -> Self {
        Operation::NativeTransfer {
            chain: chain.into(),
            from_wallet: from_wallet.into(),
            to_address: to_address.into(),
            amount: "0".to_string(),
            value_override: value_wei.into(),
        }
    }

    pub fn set_allowance(
        chain: impl Into<ChainId>,
        token_contract: impl Into<Address>,
        owner_wallet: impl Into<Address>,
        spender_wallet: impl Into<Address>,
        amount: impl Into<String>,
    ) -> Self {
        Operation::SetAllowance {
            chain: chain.into(),
            token_contract: token_contract.into(),
            owner_wallet: owner_wallet.into(),
            spender_wallet: spender_wallet.into(),
            amount: amount.into(),
        }
    }

    pub fn erc20_transfer(
        chain: impl Into<ChainId>,
        token_contract: impl Into<Address>,
        from_wallet: impl Into<Address>,
        to_address: impl Into<Address>,
        amount: impl Into<String>,
    ) -> Self {
        Operation::Erc20Transfer {
            chain: chain.into(),
            token_contract: token_contract.into(),
            from_wallet: from_wallet.into(),
            to_address: to_address.into(),
            amount: amount.into(),
        }
    }

    pub fn contract_write(
        chain: impl Into<ChainId>,
        contract: impl Into<Address>,
        wallet: impl Into<Address>,
        function_signature: impl Into<String>,
        args: Vec<serde_json::Value>,
        value_override: Option<String>,
        abi: Option<serde_json::Value>,
    ) -> Self {
        Operation::ContractWrite {
            chain: chain.into(),
            contract: contract.into(),
            wallet: wallet.into(),
            function_signature: function_signature.into(),
            args,
            value_override,
            abi,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::NativeTransfer { .. } => OperationKind::NativeTransfer,
            Operation::SetAllowance { .. } => OperationKind::SetAllowance,
            Operation::Erc20Transfer { .. } => OperationKind::Erc20Transfer,
            Operation::ContractWrite { .. } => OperationKind::ContractWrite,
        }
    }

    pub fn chain(&self) -> &str {
        match self {
            Operation::NativeTransfer { chain, .. }
            | Operation::SetAllowance { chain, .. }
            | Operation::Erc20Transfer { chain, .. }
            | Operation::ContractWrite { chain, .. } => chain,
        }
    }
}

/// Submits operations to the engine
#[derive(Clone)]
pub struct OperationSubmitter {
    engine: Arc<dyn ExecutionEngine>,
}

impl OperationSubmitter {
    pub fn new(engine: Arc<dyn ExecutionEngine>) -> Self {
        Self { engine }
    }

    /// Submit once; the returned queue id is the only handle to the operation
    pub async fn submit(&self, op: &Operation) -> Result<QueueId, EngineError> {
        let result = match op.clone() {
            Operation::NativeTransfer {
                chain,
                from_wallet,
                to_address,
                amount,
                value_override,
            } => {
                self.engine
                    .submit_native_transfer(
                        &chain,
                        NATIVE_ASSET_SENTINEL,
                        &from_wallet,
                        NativeTransferParams {
                            to_address,
                            amount,
                            value_override,
                        },
                    )
                    .await
            }
            Operation::SetAllowance {
                chain,
                token_contract,
                owner_wallet,
                spender_wallet,
                amount,
            } => {
                self.engine
                    .submit_allowance(
                        &chain,
                        &token_contract,
                        &owner_wallet,
                        AllowanceParams {
                            spender_wallet,
                            amount,
                        },
                    )
                    .await
            }
            Operation::Erc20Transfer {
                chain,
                token_contract,
                from_wallet,
                to_address,
                amount,
            } => {
                self.engine
                    .submit_erc20_transfer(
                        &chain,
                        &token_contract,
                        &from_wallet,
                        Erc20TransferParams { to_address, amount },
                    )
                    .await
            }
            Operation::ContractWrite {
                chain,
                contract,
                wallet,
                function_signature,
                args,
                value_override,
                abi,
            } => {
                self.engine
                    .submit_contract_write(
                        &chain,
                        &contract,
                        &wallet,
                        ContractWriteParams {
                            function_signature,
                            args,
                            value_override,
                            abi,
                        },
                    )
                    .await
            }
        };

        match &result {
            Ok(queue_id) => info!(
                queue_id = %queue_id,
                kind = %op.kind(),
                chain = op.chain(),
                "Operation submitted"
            ),
            Err(e) => error!(kind = %op.kind(), chain = op.chain(), error = %e, "Submission failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;

    #[tokio::test]
    async fn test_native_transfer_uses_sentinel_and_value_override() {
        let engine = Arc::new(MockEngine::new());
        let submitter = OperationSubmitter::new(engine.clone());

        let op = Operation::native_transfer("1", "0xfrom", "0xto", "1500000000000000000");
        submitter.submit(&op).await.unwrap();

        let calls = engine.submissions();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "submit_native_transfer");
        assert_eq!(calls[0].contract, NATIVE_ASSET_SENTINEL);
        assert_eq!(calls[0].body["amount"], "0");
        assert_eq!(calls[0].body["valueOverride"], "1500000000000000000");
    }

    #[tokio::test]
    async fn test_each_submit_yields_new_queue_id() {
        let engine = Arc::new(MockEngine::new());
        let submitter = OperationSubmitter::new(engine.clone());
        let op = Operation::set_allowance("1923", "0xtoken", "0xowner", "0xowner", "10");

        let a = submitter.submit(&op).await.unwrap();
        let b = submitter.submit(&op).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(engine.submission_count("submit_allowance"), 2);
        assert_eq!(op.kind(), OperationKind::SetAllowance);
    }

    #[tokio::test]
    async fn test_submit_failure_is_not_retried() {
        let engine = Arc::new(MockEngine::new());
        engine.set_fail_submit(Some(EngineError::Network("down".into())));
        let submitter = OperationSubmitter::new(engine.clone());

        let op = Operation::erc20_transfer("1", "0xtoken", "0xfrom", "0xto", "3");
        assert!(submitter.submit(&op).await.is_err());
        assert!(engine.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_contract_write_forwards_signature_and_value() {
        let engine = Arc::new(MockEngine::new());
        let submitter = OperationSubmitter::new(engine.clone());

        let op = Operation::contract_write(
            "1",
            "0xstaking",
            "0xwallet",
            "function deposit()",
            Vec::new(),
            Some("1000".to_string()),
            None,
        );
        assert_eq!(op.kind(), OperationKind::ContractWrite);
        submitter.submit(&op).await.unwrap();

        let calls = engine.submissions();
        assert_eq!(calls[0].method, "submit_contract_write");
        assert_eq!(calls[0].contract, "0xstaking");
        assert_eq!(calls[0].body["functionSignature"], "function deposit()");
        assert_eq!(calls[0].body["valueOverride"], "1000");
    }
}
