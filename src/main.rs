//! Engine Finality CLI
//!
//! ```text
//! engine_finality [--env dev] stake <wallet> <amount>
//! engine_finality [--env dev] transfer <symbol> <amount> <from> <to>
//! engine_finality [--env dev] rates
//! ```
//!
//! The process stays up until every background tracker and deferred
//! transfer it started has stopped.

use std::sync::Arc;

use anyhow::{Context, bail};

use engine_finality::config::AppConfig;
use engine_finality::engine::{ExecutionEngine, HttpEngineClient};
use engine_finality::finality::{
    BackgroundSupervisor, FinalityTracker, StatusPoller, TrackingPolicy,
};
use engine_finality::submit::OperationSubmitter;
use engine_finality::workflow::{
    StakeWorkflow, TokenRegistry, TransferOutcome, TransferRequest, TransferWorkflow,
};

const USAGE: &str = "usage: engine_finality [--env <env>] \
    (stake <wallet> <amount> | transfer <symbol> <amount> <from> <to> | rates)";

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Positional arguments with `--env <value>` removed
fn get_command() -> Vec<String> {
    let mut rest = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--env" || arg == "-e" {
            args.next();
        } else {
            rest.push(arg);
        }
    }
    rest
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let command = get_command();

    let app_config = AppConfig::load(&env).with_context(|| format!("loading {} config", env))?;
    let _log_guard = engine_finality::logging::init_logging(&app_config);

    tracing::info!(
        git = env!("GIT_HASH"),
        engine = %app_config.engine.url,
        "Starting engine_finality in {} mode",
        env
    );

    let engine: Arc<dyn ExecutionEngine> = Arc::new(HttpEngineClient::new(&app_config.engine)?);
    tracing::info!(engine = engine.name(), "Execution engine ready");
    let poller = StatusPoller::new(engine.clone());
    let tracking = &app_config.tracking;
    let supervisor = Arc::new(BackgroundSupervisor::new(
        poller.clone(),
        TrackingPolicy::from(&tracking.background),
        tracking.max_concurrent_background,
    ));
    let tracker = Arc::new(FinalityTracker::new(
        poller,
        TrackingPolicy::from(&tracking.foreground),
        supervisor.clone(),
    ));
    let submitter = OperationSubmitter::new(engine.clone());

    match command.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["stake", wallet, amount] => {
            let workflow = StakeWorkflow::new(
                submitter,
                tracker,
                engine.clone(),
                app_config.staking.clone(),
            );
            let receipt = workflow.stake(wallet, amount).await?;
            println!("{}", receipt.message());
        }
        ["transfer", symbol, amount, from, to] => {
            let workflow = TransferWorkflow::new(
                submitter,
                tracker,
                TokenRegistry::new(&app_config.tokens),
            );
            let receipt = workflow
                .transfer(TransferRequest {
                    token_symbol: symbol.to_string(),
                    amount: amount.to_string(),
                    from_wallet: from.to_string(),
                    to_address: to.to_string(),
                })
                .await?;
            println!("{}", receipt.message());

            if let Some(deferred) = receipt.deferred {
                let done = deferred.result().await?;
                if let Some(step) = done.steps.last() {
                    let note = match done.outcome {
                        TransferOutcome::Confirmed => "confirmed",
                        _ => "confirmation pending",
                    };
                    println!("Transfer {} {}", step.queue_id, note);
                }
            }
        }
        ["rates"] => {
            let workflow =
                StakeWorkflow::new(submitter, tracker, engine.clone(), app_config.staking.clone());
            let rates = workflow.rates().await?;
            println!("ETH -> rswETH: {}", rates.eth_to_rsweth);
            println!("rswETH -> ETH: {}", rates.rsweth_to_eth);
            println!("rate:          {}", rates.rate);
        }
        _ => bail!(USAGE),
    }

    supervisor.drain().await;
    for record in supervisor.exhausted() {
        tracing::error!(
            queue_id = %record.queue_id,
            last_status = ?record.last_status,
            pending_retries = record.pending_retries,
            error_retries = record.error_retries,
            "Unreconciled transaction"
        );
    }

    Ok(())
}
