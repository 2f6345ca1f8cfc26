//! Mock engine for testing
//!
//! Each queue id follows a status script. Scripts are either registered
//! for a known queue id or queued up for the next submissions in order.
//! The last scripted status repeats once the script runs out.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use super::error::EngineError;
use super::{
    AllowanceParams, ContractWriteParams, Erc20TransferParams, ExecutionEngine,
    NativeTransferParams,
};
use crate::core_types::QueueId;

/// One scripted answer to a status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockStatus {
    Status(&'static str),
    NetworkError,
}

impl MockStatus {
    pub const MINED: MockStatus = MockStatus::Status("mined");
    pub const PENDING: MockStatus = MockStatus::Status("sent");
    pub const ERRORED: MockStatus = MockStatus::Status("errored");
    pub const CANCELLED: MockStatus = MockStatus::Status("cancelled");
}

/// Record of one submission, in call order
#[derive(Debug, Clone)]
pub struct SubmittedCall {
    pub method: &'static str,
    pub chain: String,
    pub contract: String,
    pub wallet: String,
    pub queue_id: QueueId,
    pub body: Value,
}

#[derive(Default)]
struct Script {
    steps: VecDeque<MockStatus>,
    last: Option<MockStatus>,
}

impl Script {
    fn new(steps: Vec<MockStatus>) -> Self {
        Self {
            steps: steps.into(),
            last: None,
        }
    }

    fn next(&mut self) -> MockStatus {
        if let Some(step) = self.steps.pop_front() {
            self.last = Some(step.clone());
            step
        } else {
            self.last.clone().unwrap_or(MockStatus::MINED)
        }
    }
}

pub struct MockEngine {
    scripts: Mutex<HashMap<QueueId, Script>>,
    /// Scripts handed to the next submissions, in order
    upcoming: Mutex<VecDeque<Vec<MockStatus>>>,
    submissions: Mutex<Vec<SubmittedCall>>,
    reads: Mutex<HashMap<String, Value>>,
    fail_submit: Mutex<Option<EngineError>>,
    fail_retry_failed: Mutex<Option<EngineError>>,
    fail_sync_retry: Mutex<Option<EngineError>>,
    status_calls: Mutex<HashMap<QueueId, usize>>,
    retry_failed_count: AtomicUsize,
    sync_retry_count: AtomicUsize,
    next_id: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            upcoming: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
            reads: Mutex::new(HashMap::new()),
            fail_submit: Mutex::new(None),
            fail_retry_failed: Mutex::new(None),
            fail_sync_retry: Mutex::new(None),
            status_calls: Mutex::new(HashMap::new()),
            retry_failed_count: AtomicUsize::new(0),
            sync_retry_count: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Script status answers for an already known queue id
    pub fn script(&self, queue_id: &QueueId, steps: Vec<MockStatus>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(queue_id.clone(), Script::new(steps));
    }

    /// Script status answers for the next submission
    pub fn script_next_submission(&self, steps: Vec<MockStatus>) {
        self.upcoming.lock().unwrap().push_back(steps);
    }

    /// Make every following submission fail with `err`
    pub fn set_fail_submit(&self, err: Option<EngineError>) {
        *self.fail_submit.lock().unwrap() = err;
    }

    /// Make every following `retry_failed` call fail with `err`
    pub fn set_fail_retry_failed(&self, err: Option<EngineError>) {
        *self.fail_retry_failed.lock().unwrap() = err;
    }

    /// Make every following `sync_retry` call fail with `err`
    pub fn set_fail_sync_retry(&self, err: Option<EngineError>) {
        *self.fail_sync_retry.lock().unwrap() = err;
    }

    /// Answer for `read_contract(function_name)`
    pub fn set_read(&self, function_name: &str, value: Value) {
        self.reads
            .lock()
            .unwrap()
            .insert(function_name.to_string(), value);
    }

    pub fn submissions(&self) -> Vec<SubmittedCall> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submission_count(&self, method: &str) -> usize {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn status_calls(&self, queue_id: &QueueId) -> usize {
        self.status_calls
            .lock()
            .unwrap()
            .get(queue_id)
            .copied()
            .unwrap_or(0)
    }

    /// `retry_failed` calls, failed ones included
    pub fn retry_failed_count(&self) -> usize {
        self.retry_failed_count.load(Ordering::SeqCst)
    }

    /// `sync_retry` calls, failed ones included
    pub fn sync_retry_count(&self) -> usize {
        self.sync_retry_count.load(Ordering::SeqCst)
    }

    fn record(
        &self,
        method: &'static str,
        chain: &str,
        contract: &str,
        wallet: &str,
        body: Value,
    ) -> Result<QueueId, EngineError> {
        if let Some(err) = self.fail_submit.lock().unwrap().clone() {
            return Err(err);
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let queue_id = QueueId::new(format!("mock-{}-{}", n, uuid::Uuid::new_v4()));

        let steps = self
            .upcoming
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![MockStatus::MINED]);
        self.script(&queue_id, steps);

        self.submissions.lock().unwrap().push(SubmittedCall {
            method,
            chain: chain.to_string(),
            contract: contract.to_string(),
            wallet: wallet.to_string(),
            queue_id: queue_id.clone(),
            body,
        });

        Ok(queue_id)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn submit_native_transfer(
        &self,
        chain: &str,
        contract: &str,
        from_wallet: &str,
        params: NativeTransferParams,
    ) -> Result<QueueId, EngineError> {
        let body = serde_json::to_value(&params).unwrap_or_default();
        self.record("submit_native_transfer", chain, contract, from_wallet, body)
    }

    async fn submit_allowance(
        &self,
        chain: &str,
        contract: &str,
        owner_wallet: &str,
        params: AllowanceParams,
    ) -> Result<QueueId, EngineError> {
        let body = serde_json::to_value(&params).unwrap_or_default();
        self.record("submit_allowance", chain, contract, owner_wallet, body)
    }

    async fn submit_erc20_transfer(
        &self,
        chain: &str,
        contract: &str,
        from_wallet: &str,
        params: Erc20TransferParams,
    ) -> Result<QueueId, EngineError> {
        let body = serde_json::to_value(&params).unwrap_or_default();
        self.record("submit_erc20_transfer", chain, contract, from_wallet, body)
    }

    async fn submit_contract_write(
        &self,
        chain: &str,
        contract: &str,
        wallet: &str,
        params: ContractWriteParams,
    ) -> Result<QueueId, EngineError> {
        let body = serde_json::to_value(&params).unwrap_or_default();
        self.record("submit_contract_write", chain, contract, wallet, body)
    }

    async fn read_contract(
        &self,
        _chain: &str,
        _contract: &str,
        function_name: &str,
        _args: &[String],
        _abi: Option<&Value>,
    ) -> Result<Value, EngineError> {
        self.reads
            .lock()
            .unwrap()
            .get(function_name)
            .cloned()
            .ok_or_else(|| EngineError::Rejected {
                status: 400,
                message: format!("unknown function {}", function_name),
            })
    }

    async fn get_status(&self, queue_id: &QueueId) -> Result<String, EngineError> {
        *self
            .status_calls
            .lock()
            .unwrap()
            .entry(queue_id.clone())
            .or_default() += 1;

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(queue_id)
            .map(Script::next)
            .ok_or_else(|| EngineError::Rejected {
                status: 404,
                message: format!("queue id {} not found", queue_id),
            })?;

        match step {
            MockStatus::Status(s) => Ok(s.to_string()),
            MockStatus::NetworkError => Err(EngineError::Network("mock timeout".to_string())),
        }
    }

    async fn retry_failed(&self, _queue_id: &QueueId) -> Result<(), EngineError> {
        self.retry_failed_count.fetch_add(1, Ordering::SeqCst);
        match self.fail_retry_failed.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn sync_retry(&self, _queue_id: &QueueId) -> Result<(), EngineError> {
        self.sync_retry_count.fetch_add(1, Ordering::SeqCst);
        match self.fail_sync_retry.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
