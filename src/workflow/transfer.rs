//! Transfer Workflow
//!
//! Native asset: one value-carrying transfer.
//! ERC-20: allowance, then transfer. The transfer is submitted only after
//! the allowance is Mined. If the allowance escalates to background
//! tracking, a continuation supervised by the `BackgroundSupervisor`
//! waits for it and submits the transfer once it is Mined; the request
//! returns with `TransferOutcome::AllowancePending`.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::amount::{parse_amount, parse_wei};
use super::error::WorkflowError;
use super::registry::{TokenEntry, TokenRegistry, validate_address};
use super::sequence::{StepResult, StepRunner, StepSequence, StepStatus, WorkflowStep};
use crate::core_types::{Address, QueueId};
use crate::finality::{BackgroundOutcome, FinalityHandle, FinalityTracker};
use crate::submit::{Operation, OperationSubmitter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub token_symbol: String,
    /// Display units, e.g. "1.5"
    pub amount: String,
    pub from_wallet: Address,
    pub to_address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Every step Mined
    Confirmed,
    /// Final step accepted, confirmation pending in background
    ConfirmationPending,
    /// Allowance accepted, transfer deferred until it is Mined
    AllowancePending,
}

#[derive(Debug)]
pub struct TransferReceipt {
    pub symbol: String,
    pub chain_id: String,
    pub amount: String,
    pub outcome: TransferOutcome,
    pub steps: Vec<WorkflowStep>,
    /// Background tracking of the last step, when it escalated
    pub background: Option<FinalityHandle>,
    /// Transfer step waiting on a background-tracked allowance
    pub deferred: Option<DeferredTransfer>,
}

impl TransferReceipt {
    /// Queue id of the last submitted step
    pub fn queue_id(&self) -> Option<&QueueId> {
        self.steps.last().map(|s| &s.queue_id)
    }

    pub fn message(&self) -> String {
        let queue_id = self.queue_id().map(QueueId::as_str).unwrap_or_default();
        match self.outcome {
            TransferOutcome::Confirmed => format!(
                "Transfer of {} {} confirmed: {}",
                self.amount, self.symbol, queue_id
            ),
            TransferOutcome::ConfirmationPending => format!(
                "Transfer of {} {} submitted: {}, confirmation pending",
                self.amount, self.symbol, queue_id
            ),
            TransferOutcome::AllowancePending => format!(
                "Allowance {} submitted, transfer of {} {} will follow once it is confirmed",
                queue_id, self.amount, self.symbol
            ),
        }
    }
}

/// Result of a deferred transfer step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredReceipt {
    pub outcome: TransferOutcome,
    pub steps: Vec<WorkflowStep>,
}

/// Transfer waiting for its allowance to be Mined in background
#[derive(Debug)]
pub struct DeferredTransfer {
    allowance: QueueId,
    task: JoinHandle<Result<DeferredReceipt, WorkflowError>>,
}

impl DeferredTransfer {
    pub fn allowance_queue_id(&self) -> &QueueId {
        &self.allowance
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the allowance and, if it was Mined, the transfer
    pub async fn result(self) -> Result<DeferredReceipt, WorkflowError> {
        self.task
            .await
            .map_err(|e| WorkflowError::ContinuationFailed(e.to_string()))?
    }
}

pub struct TransferWorkflow {
    runner: StepRunner,
    registry: TokenRegistry,
}

impl TransferWorkflow {
    pub fn new(
        submitter: OperationSubmitter,
        tracker: Arc<FinalityTracker>,
        registry: TokenRegistry,
    ) -> Self {
        Self {
            runner: StepRunner::new(submitter, tracker),
            registry,
        }
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Transfer `amount` of a registered token
    ///
    /// Resolves once the last step is Mined or escalated. Fails only on
    /// invalid input, a rejected submission, a Cancelled step, or an
    /// ordering violation.
    pub async fn transfer(&self, req: TransferRequest) -> Result<TransferReceipt, WorkflowError> {
        let token = self.registry.resolve(&req.token_symbol)?.clone();
        validate_address(&req.from_wallet)?;
        validate_address(&req.to_address)?;

        info!(
            symbol = %token.symbol,
            chain = %token.chain_id,
            amount = %req.amount,
            from = %req.from_wallet,
            to = %req.to_address,
            "Transfer requested"
        );

        if token.is_native() {
            self.transfer_native(&token, &req).await
        } else {
            self.transfer_erc20(&token, &req).await
        }
    }

    async fn transfer_native(
        &self,
        token: &TokenEntry,
        req: &TransferRequest,
    ) -> Result<TransferReceipt, WorkflowError> {
        let value_wei = parse_wei(&req.amount)?;
        let op = Operation::native_transfer(
            token.chain_id.clone(),
            req.from_wallet.clone(),
            req.to_address.clone(),
            value_wei,
        );

        let mut sequence = StepSequence::new();
        let result = self.runner.run(&mut sequence, &op).await?;
        Ok(finish(token, &req.amount, sequence, result))
    }

    async fn transfer_erc20(
        &self,
        token: &TokenEntry,
        req: &TransferRequest,
    ) -> Result<TransferReceipt, WorkflowError> {
        let amount = parse_amount(&req.amount)?.to_string();

        // The smart wallet approves itself, then pulls via transfer-from
        let allowance = Operation::set_allowance(
            token.chain_id.clone(),
            token.contract.clone(),
            req.from_wallet.clone(),
            req.from_wallet.clone(),
            amount.clone(),
        );
        let transfer = Operation::erc20_transfer(
            token.chain_id.clone(),
            token.contract.clone(),
            req.from_wallet.clone(),
            req.to_address.clone(),
            amount.clone(),
        );

        let mut sequence = StepSequence::new();
        match self.runner.run(&mut sequence, &allowance).await? {
            StepResult::Mined(_) => {
                let result = self.runner.run(&mut sequence, &transfer).await?;
                Ok(finish(token, &amount, sequence, result))
            }
            StepResult::Escalated(handle) => {
                let steps = sequence.steps().to_vec();
                let deferred = self.defer_transfer(sequence, handle, transfer);
                Ok(TransferReceipt {
                    symbol: token.symbol.clone(),
                    chain_id: token.chain_id.clone(),
                    amount,
                    outcome: TransferOutcome::AllowancePending,
                    steps,
                    background: None,
                    deferred: Some(deferred),
                })
            }
        }
    }

    /// Submit `transfer` once the background-tracked allowance is Mined
    fn defer_transfer(
        &self,
        mut sequence: StepSequence,
        allowance: FinalityHandle,
        transfer: Operation,
    ) -> DeferredTransfer {
        let allowance_id = allowance.queue_id().clone();
        let index = sequence.steps().len() - 1;
        let runner = self.runner.clone();

        info!(queue_id = %allowance_id, "Transfer deferred until allowance is mined");

        let task_allowance = allowance_id.clone();
        let supervisor = Arc::clone(self.runner.supervisor());
        let task = supervisor.spawn_continuation(allowance_id.clone(), async move {
            let outcome = allowance.outcome().await;
            sequence.resolve(index, StepStatus::from(outcome));

            if outcome != BackgroundOutcome::Mined {
                error!(
                    queue_id = %task_allowance,
                    ?outcome,
                    "Allowance did not reach finality, transfer not submitted"
                );
                return Err(WorkflowError::AllowanceNotFinal(task_allowance));
            }

            info!(queue_id = %task_allowance, "Allowance mined in background, submitting transfer");
            let outcome = match runner.run(&mut sequence, &transfer).await? {
                StepResult::Mined(_) => TransferOutcome::Confirmed,
                StepResult::Escalated(_) => {
                    warn!(queue_id = %task_allowance, "Deferred transfer escalated to background");
                    TransferOutcome::ConfirmationPending
                }
            };
            Ok(DeferredReceipt {
                outcome,
                steps: sequence.into_steps(),
            })
        });

        DeferredTransfer {
            allowance: allowance_id,
            task,
        }
    }
}

fn finish(
    token: &TokenEntry,
    amount: &str,
    sequence: StepSequence,
    result: StepResult,
) -> TransferReceipt {
    let (outcome, background) = match result {
        StepResult::Mined(_) => (TransferOutcome::Confirmed, None),
        StepResult::Escalated(handle) => (TransferOutcome::ConfirmationPending, Some(handle)),
    };
    TransferReceipt {
        symbol: token.symbol.clone(),
        chain_id: token.chain_id.clone(),
        amount: amount.to_string(),
        outcome,
        steps: sequence.into_steps(),
        background,
        deferred: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_tokens;
    use crate::engine::{MockEngine, MockStatus};
    use crate::finality::{BackgroundSupervisor, StatusPoller, TrackingPolicy};
    use crate::submit::OperationKind;
    use std::time::Duration;

    const FROM: &str = "0x1111111111111111111111111111111111111111";
    const TO: &str = "0x2222222222222222222222222222222222222222";

    fn setup() -> (Arc<MockEngine>, TransferWorkflow) {
        let engine = Arc::new(MockEngine::new());
        let poller = StatusPoller::new(engine.clone());
        let supervisor = Arc::new(BackgroundSupervisor::new(
            poller.clone(),
            TrackingPolicy::new(Duration::from_millis(1), 10, 10),
            4,
        ));
        let tracker = Arc::new(FinalityTracker::new(
            poller,
            TrackingPolicy::new(Duration::from_millis(1), 3, 3),
            supervisor,
        ));
        let workflow = TransferWorkflow::new(
            OperationSubmitter::new(engine.clone()),
            tracker,
            TokenRegistry::new(&default_tokens()),
        );
        (engine, workflow)
    }

    fn request(symbol: &str, amount: &str) -> TransferRequest {
        TransferRequest {
            token_symbol: symbol.to_string(),
            amount: amount.to_string(),
            from_wallet: FROM.to_string(),
            to_address: TO.to_string(),
        }
    }

    #[tokio::test]
    async fn test_native_transfer() {
        let (engine, workflow) = setup();

        let receipt = workflow.transfer(request("ETH", "0.25")).await.unwrap();

        assert_eq!(receipt.outcome, TransferOutcome::Confirmed);
        assert_eq!(receipt.steps.len(), 1);
        assert_eq!(receipt.steps[0].kind, OperationKind::NativeTransfer);

        let calls = engine.submissions();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body["valueOverride"], "250000000000000000");
    }

    #[tokio::test]
    async fn test_erc20_allowance_then_transfer() {
        let (engine, workflow) = setup();

        let receipt = workflow.transfer(request("dagri", "10")).await.unwrap();

        assert_eq!(receipt.outcome, TransferOutcome::Confirmed);
        let kinds: Vec<_> = receipt.steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![OperationKind::SetAllowance, OperationKind::Erc20Transfer]
        );
        assert!(receipt.steps.iter().all(|s| s.status == StepStatus::Mined));

        let calls = engine.submissions();
        assert_eq!(calls[0].method, "submit_allowance");
        assert_eq!(calls[0].body["spenderWallet"], FROM);
        assert_eq!(calls[1].method, "submit_erc20_transfer");
        assert_eq!(calls[1].body["toAddress"], TO);
        assert_eq!(calls[1].chain, "1923");
    }

    #[tokio::test]
    async fn test_cancelled_allowance_never_submits_transfer() {
        let (engine, workflow) = setup();
        engine.script_next_submission(vec![MockStatus::PENDING, MockStatus::CANCELLED]);

        let err = workflow.transfer(request("SWELL", "5")).await.unwrap_err();

        assert!(matches!(err, WorkflowError::Cancelled { .. }));
        assert_eq!(engine.submission_count("submit_erc20_transfer"), 0);
    }

    #[tokio::test]
    async fn test_invalid_input_submits_nothing() {
        let (engine, workflow) = setup();

        assert!(matches!(
            workflow.transfer(request("DOGE", "1")).await,
            Err(WorkflowError::UnknownToken(_))
        ));
        assert!(matches!(
            workflow.transfer(request("ETH", "0")).await,
            Err(WorkflowError::InvalidAmount(_))
        ));
        let mut bad_to = request("SWELL", "1");
        bad_to.to_address = "0x12".to_string();
        assert!(matches!(
            workflow.transfer(bad_to).await,
            Err(WorkflowError::InvalidAddress(_))
        ));
        assert!(engine.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_escalated_allowance_defers_transfer() {
        let (engine, workflow) = setup();
        // 3 foreground polls exhaust the pending budget, then Mined in background
        engine.script_next_submission(vec![
            MockStatus::PENDING,
            MockStatus::PENDING,
            MockStatus::PENDING,
            MockStatus::PENDING,
            MockStatus::MINED,
        ]);

        let mut receipt = workflow.transfer(request("RSWETH", "2")).await.unwrap();

        assert_eq!(receipt.outcome, TransferOutcome::AllowancePending);
        assert_eq!(receipt.steps.len(), 1);
        assert_eq!(receipt.steps[0].status, StepStatus::Escalated);
        assert_eq!(engine.submission_count("submit_erc20_transfer"), 0);

        let deferred = receipt.deferred.take().unwrap();
        assert_eq!(deferred.allowance_queue_id(), &receipt.steps[0].queue_id);
        let done = deferred.result().await.unwrap();

        assert_eq!(done.outcome, TransferOutcome::Confirmed);
        assert_eq!(done.steps.len(), 2);
        assert_eq!(done.steps[0].status, StepStatus::Mined);
        assert_eq!(engine.submission_count("submit_erc20_transfer"), 1);
    }

    #[tokio::test]
    async fn test_escalated_allowance_cancelled_in_background() {
        let (engine, workflow) = setup();
        engine.script_next_submission(vec![
            MockStatus::PENDING,
            MockStatus::PENDING,
            MockStatus::PENDING,
            MockStatus::CANCELLED,
        ]);

        let mut receipt = workflow.transfer(request("SWELL", "1")).await.unwrap();
        let err = receipt.deferred.take().unwrap().result().await.unwrap_err();

        assert!(matches!(err, WorkflowError::AllowanceNotFinal(_)));
        assert_eq!(engine.submission_count("submit_erc20_transfer"), 0);
    }

    #[tokio::test]
    async fn test_drain_waits_for_deferred_transfer() {
        let (engine, workflow) = setup();
        engine.script_next_submission(vec![
            MockStatus::PENDING,
            MockStatus::PENDING,
            MockStatus::PENDING,
            MockStatus::PENDING,
            MockStatus::MINED,
        ]);
        engine.script_next_submission(vec![
            MockStatus::PENDING,
            MockStatus::PENDING,
            MockStatus::MINED,
        ]);
        let supervisor = Arc::clone(workflow.runner.supervisor());

        let receipt = workflow.transfer(request("SWELL", "4")).await.unwrap();
        let allowance = receipt.steps[0].queue_id.clone();
        assert_eq!(supervisor.continuations(), vec![allowance]);
        drop(receipt);

        supervisor.drain().await;

        let calls = engine.submissions();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].method, "submit_erc20_transfer");
        assert_eq!(engine.status_calls(&calls[1].queue_id), 3);
        assert!(supervisor.continuations().is_empty());
        assert!(supervisor.ownership().is_empty());
    }
}
