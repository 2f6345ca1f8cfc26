use std::sync::Arc;
use std::time::Duration;

use engine_finality::engine::{MockEngine, MockStatus};
use engine_finality::finality::{
    BackgroundOutcome, BackgroundSupervisor, Finality, FinalityTracker, Owner, StatusPoller,
    TrackError, TrackingPolicy,
};
use engine_finality::submit::{OperationKind, OperationSubmitter};
use engine_finality::workflow::{
    StakeWorkflow, StepStatus, TokenRegistry, TransferOutcome, TransferRequest,
    TransferWorkflow, WorkflowError,
};
use engine_finality::{QueueId, config::AppConfig};

const FROM: &str = "0xaAaAaAaaAaAaAaaAaAAAAAAAAaaaAaAaAaaAaaAa";
const TO: &str = "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB";

struct Harness {
    engine: Arc<MockEngine>,
    supervisor: Arc<BackgroundSupervisor>,
    tracker: Arc<FinalityTracker>,
}

/// Foreground 3/3, background 20/20, 1ms poll interval
fn harness() -> Harness {
    let engine = Arc::new(MockEngine::new());
    let poller = StatusPoller::new(engine.clone());
    let supervisor = Arc::new(BackgroundSupervisor::new(
        poller.clone(),
        TrackingPolicy::new(Duration::from_millis(1), 20, 20),
        8,
    ));
    let tracker = Arc::new(FinalityTracker::new(
        poller,
        TrackingPolicy::new(Duration::from_millis(1), 3, 3),
        supervisor.clone(),
    ));
    Harness {
        engine,
        supervisor,
        tracker,
    }
}

impl Harness {
    fn transfers(&self) -> TransferWorkflow {
        let config = AppConfig::from_yaml_str(
            r#"
log_level: "info"
log_dir: "./logs"
log_file: "test.log"
use_json: false
rotation: "never"
enable_tracing: false
engine:
  url: "http://127.0.0.1:3005"
"#,
        )
        .unwrap();
        TransferWorkflow::new(
            OperationSubmitter::new(self.engine.clone()),
            self.tracker.clone(),
            TokenRegistry::new(&config.tokens),
        )
    }

    fn stakes(&self) -> StakeWorkflow {
        StakeWorkflow::new(
            OperationSubmitter::new(self.engine.clone()),
            self.tracker.clone(),
            self.engine.clone(),
            Default::default(),
        )
    }
}

fn erc20(symbol: &str, amount: &str) -> TransferRequest {
    TransferRequest {
        token_symbol: symbol.to_string(),
        amount: amount.to_string(),
        from_wallet: FROM.to_string(),
        to_address: TO.to_string(),
    }
}

#[tokio::test]
async fn stake_mined_on_first_poll_references_queue_id() {
    let h = harness();

    let receipt = h.stakes().stake(FROM, "1.5").await.unwrap();

    assert!(receipt.is_confirmed());
    assert!(receipt.message().contains(receipt.queue_id.as_str()));
    assert_eq!(h.engine.status_calls(&receipt.queue_id), 1);
    assert_eq!(h.engine.retry_failed_count(), 0);
    assert_eq!(h.engine.sync_retry_count(), 0);
}

#[tokio::test]
async fn errored_max_times_then_mined_issues_exactly_max_retry_pairs() {
    let h = harness();
    let id = QueueId::new("q-errored");
    h.engine.script(
        &id,
        vec![
            MockStatus::ERRORED,
            MockStatus::ERRORED,
            MockStatus::ERRORED,
            MockStatus::MINED,
        ],
    );

    let finality = h.tracker.track(&id).await.unwrap();

    assert!(finality.is_mined());
    assert_eq!(h.engine.retry_failed_count(), 3);
    assert_eq!(h.engine.sync_retry_count(), 3);
}

#[tokio::test]
async fn always_pending_escalates_after_exactly_max_polls() {
    let h = harness();
    let id = QueueId::new("q-pending");
    h.engine.script(&id, vec![MockStatus::PENDING]);

    let finality = h.tracker.track(&id).await.unwrap();

    // Background task has not polled yet on this runtime
    assert_eq!(h.engine.status_calls(&id), 3);
    let Finality::Escalated(handle) = finality else {
        panic!("expected escalation");
    };
    assert_eq!(h.supervisor.active(), vec![id.clone()]);

    // Counters carry over: 17 more polls reach the background budget of 20
    assert_eq!(handle.outcome().await, BackgroundOutcome::Exhausted);
    assert_eq!(h.engine.status_calls(&id), 20);
    assert_eq!(h.supervisor.exhausted()[0].queue_id, id);
}

#[tokio::test]
async fn network_errors_never_consume_budget() {
    let h = harness();
    let id = QueueId::new("q-flaky");
    let mut script = vec![MockStatus::NetworkError; 10];
    script.push(MockStatus::PENDING);
    script.push(MockStatus::PENDING);
    script.push(MockStatus::MINED);
    h.engine.script(&id, script);

    let finality = h.tracker.track(&id).await.unwrap();

    assert!(finality.is_mined());
    assert_eq!(h.engine.status_calls(&id), 13);
    assert_eq!(h.engine.retry_failed_count(), 0);
}

#[tokio::test]
async fn queue_id_has_one_owner_across_escalation() {
    let h = harness();
    let id = QueueId::new("q-owned");
    h.engine.script(
        &id,
        vec![
            MockStatus::PENDING,
            MockStatus::PENDING,
            MockStatus::PENDING,
            MockStatus::PENDING,
            MockStatus::MINED,
        ],
    );
    let mut events = h.supervisor.subscribe();

    let Finality::Escalated(handle) = h.tracker.track(&id).await.unwrap() else {
        panic!("expected escalation");
    };
    assert_eq!(h.supervisor.ownership().owner(&id), Some(Owner::Background));

    // A second foreground tracker must not start polling the same queue id
    let err = h.tracker.track(&id).await.unwrap_err();
    assert_eq!(
        err,
        TrackError::AlreadyTracked {
            queue_id: id.clone(),
            owner: Owner::Background,
        }
    );

    assert_eq!(handle.outcome().await, BackgroundOutcome::Mined);
    let event = events.recv().await.unwrap();
    assert_eq!(event.outcome, BackgroundOutcome::Mined);
    assert_eq!(event.pending_retries, 4);
    assert_eq!(h.supervisor.ownership().owner(&id), None);
    assert_eq!(h.engine.status_calls(&id), 5);
}

#[tokio::test]
async fn erc20_transfer_submitted_only_after_allowance_mined() {
    let h = harness();
    h.engine
        .script_next_submission(vec![MockStatus::PENDING, MockStatus::ERRORED, MockStatus::MINED]);

    let receipt = h.transfers().transfer(erc20("SWELL", "12.5")).await.unwrap();

    assert_eq!(receipt.outcome, TransferOutcome::Confirmed);
    let calls = h.engine.submissions();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].method, "submit_allowance");
    assert_eq!(calls[1].method, "submit_erc20_transfer");
    assert_eq!(h.engine.status_calls(&calls[0].queue_id), 3);
    assert_eq!(receipt.steps[0].kind, OperationKind::SetAllowance);
    assert_eq!(receipt.steps[0].status, StepStatus::Mined);
    assert_eq!(calls[1].body["amount"], "12.5");
}

#[tokio::test]
async fn cancelled_allowance_rejects_and_never_submits_transfer() {
    let h = harness();
    h.engine.script_next_submission(vec![MockStatus::CANCELLED]);

    let err = h
        .transfers()
        .transfer(erc20("DAGRI", "3"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Cancelled {
            kind: OperationKind::SetAllowance,
            ..
        }
    ));
    assert_eq!(h.engine.submission_count("submit_erc20_transfer"), 0);
}

#[tokio::test]
async fn exhausted_allowance_never_leads_to_transfer() {
    let h = harness();
    h.engine.script_next_submission(vec![MockStatus::PENDING]);

    let mut receipt = h.transfers().transfer(erc20("RSWETH", "1")).await.unwrap();
    assert_eq!(receipt.outcome, TransferOutcome::AllowancePending);

    let err = receipt.deferred.take().unwrap().result().await.unwrap_err();

    assert!(matches!(err, WorkflowError::AllowanceNotFinal(_)));
    assert_eq!(h.engine.submission_count("submit_erc20_transfer"), 0);
    assert_eq!(h.supervisor.exhausted().len(), 1);
}
