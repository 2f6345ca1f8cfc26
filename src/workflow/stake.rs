//! Stake Workflow
//!
//! A single payable `deposit()` on the liquid staking contract, tracked the
//! same way as transfer steps.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::info;

use super::amount::{from_wei, parse_wei};
use super::error::WorkflowError;
use super::registry::validate_address;
use super::sequence::{StepResult, StepRunner, StepSequence};
use crate::config::StakingConfig;
use crate::core_types::{Address, QueueId};
use crate::engine::ExecutionEngine;
use crate::finality::{FinalityHandle, FinalityTracker};
use crate::submit::{Operation, OperationSubmitter};

#[derive(Debug)]
pub struct StakeReceipt {
    pub queue_id: QueueId,
    pub wallet: Address,
    pub value_wei: String,
    /// Set when confirmation is still pending in background
    pub background: Option<FinalityHandle>,
}

impl StakeReceipt {
    pub fn is_confirmed(&self) -> bool {
        self.background.is_none()
    }

    pub fn message(&self) -> String {
        if self.is_confirmed() {
            format!("Staking Success: {}", self.queue_id)
        } else {
            format!("Staking Success: {} (confirmation pending)", self.queue_id)
        }
    }
}

/// Exchange rates of the staking contract, in display units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakingRates {
    pub eth_to_rsweth: Decimal,
    pub rsweth_to_eth: Decimal,
    pub rate: Decimal,
}

pub struct StakeWorkflow {
    runner: StepRunner,
    engine: Arc<dyn ExecutionEngine>,
    config: StakingConfig,
}

impl StakeWorkflow {
    pub fn new(
        submitter: OperationSubmitter,
        tracker: Arc<FinalityTracker>,
        engine: Arc<dyn ExecutionEngine>,
        config: StakingConfig,
    ) -> Self {
        Self {
            runner: StepRunner::new(submitter, tracker),
            engine,
            config,
        }
    }

    /// Deposit `amount` of the native asset from `wallet`
    pub async fn stake(&self, wallet: &str, amount: &str) -> Result<StakeReceipt, WorkflowError> {
        validate_address(wallet)?;
        let value_wei = parse_wei(amount)?;

        info!(wallet, amount, contract = %self.config.contract, "Stake requested");

        let op = Operation::contract_write(
            self.config.chain_id.clone(),
            self.config.contract.clone(),
            wallet,
            self.config.deposit_function.clone(),
            Vec::new(),
            Some(value_wei.clone()),
            self.config.abi.clone(),
        );

        let mut sequence = StepSequence::new();
        let (queue_id, background) = match self.runner.run(&mut sequence, &op).await? {
            StepResult::Mined(queue_id) => (queue_id, None),
            StepResult::Escalated(handle) => (handle.queue_id().clone(), Some(handle)),
        };

        Ok(StakeReceipt {
            queue_id,
            wallet: wallet.to_string(),
            value_wei,
            background,
        })
    }

    /// Current staking exchange rates
    pub async fn rates(&self) -> Result<StakingRates, WorkflowError> {
        let (eth_to_rsweth, rsweth_to_eth, rate) = tokio::try_join!(
            self.read_scaled("ethToRswETHRate"),
            self.read_scaled("rswETHToEthRate"),
            self.read_scaled("getRate"),
        )?;
        Ok(StakingRates {
            eth_to_rsweth,
            rsweth_to_eth,
            rate,
        })
    }

    async fn read_scaled(&self, function_name: &str) -> Result<Decimal, WorkflowError> {
        let value = self
            .engine
            .read_contract(
                &self.config.chain_id,
                &self.config.contract,
                function_name,
                &[],
                self.config.abi.as_ref(),
            )
            .await
            .map_err(|e| WorkflowError::ContractRead(format!("{}: {}", function_name, e)))?;

        let raw = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            other => {
                return Err(WorkflowError::ContractRead(format!(
                    "{}: unexpected value {}",
                    function_name, other
                )));
            }
        };
        from_wei(&raw)
    }
}
