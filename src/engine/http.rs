//! HTTP Engine Client
//!
//! REST client for the execution engine. Every wallet-scoped write carries
//! the backend wallet in the `x-backend-wallet-address` header and every
//! response is wrapped in a `{ "result": ... }` envelope.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::error::EngineError;
use super::{
    AllowanceParams, ContractWriteParams, Erc20TransferParams, ExecutionEngine,
    NativeTransferParams,
};
use crate::config::EngineConfig;
use crate::core_types::QueueId;

const WALLET_HEADER: &str = "x-backend-wallet-address";

/// Response envelope
#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueuedResult {
    queue_id: String,
}

#[derive(Deserialize)]
struct StatusResult {
    status: Option<String>,
}

/// Execution engine REST client
pub struct HttpEngineClient {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl HttpEngineClient {
    /// Create a new client from configuration
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        if config.url.is_empty() {
            return Err(EngineError::Config("engine url is empty".to_string()));
        }

        info!("Initializing engine client at {}", config.url);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| EngineError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn contract_path(chain: &str, contract: &str, action: &str) -> String {
        format!("/contract/{}/{}/{}", chain, contract, action)
    }

    /// Send a request and unwrap the result envelope
    async fn send<R: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<R, EngineError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(EngineError::from)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<R> = response
            .json()
            .await
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        Ok(envelope.result)
    }

    async fn post_queued(
        &self,
        path: String,
        wallet: &str,
        body: Value,
    ) -> Result<QueueId, EngineError> {
        let request = self
            .client
            .post(self.url(&path))
            .header(WALLET_HEADER, wallet)
            .json(&body);

        let queued: QueuedResult = self.send(request).await?;
        debug!(queue_id = %queued.queue_id, path = %path, "Operation queued");
        Ok(QueueId::new(queued.queue_id))
    }
}

#[async_trait]
impl ExecutionEngine for HttpEngineClient {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn submit_native_transfer(
        &self,
        chain: &str,
        contract: &str,
        from_wallet: &str,
        params: NativeTransferParams,
    ) -> Result<QueueId, EngineError> {
        let body = json!({
            "fromAddress": from_wallet,
            "toAddress": params.to_address,
            "amount": params.amount,
            "txOverrides": { "value": params.value_override },
        });
        self.post_queued(
            Self::contract_path(chain, contract, "erc20/transfer-from"),
            from_wallet,
            body,
        )
        .await
    }

    async fn submit_allowance(
        &self,
        chain: &str,
        contract: &str,
        owner_wallet: &str,
        params: AllowanceParams,
    ) -> Result<QueueId, EngineError> {
        let body = json!({
            "spenderAddress": params.spender_wallet,
            "amount": params.amount,
        });
        self.post_queued(
            Self::contract_path(chain, contract, "erc20/set-allowance"),
            owner_wallet,
            body,
        )
        .await
    }

    async fn submit_erc20_transfer(
        &self,
        chain: &str,
        contract: &str,
        from_wallet: &str,
        params: Erc20TransferParams,
    ) -> Result<QueueId, EngineError> {
        let body = json!({
            "fromAddress": from_wallet,
            "toAddress": params.to_address,
            "amount": params.amount,
        });
        self.post_queued(
            Self::contract_path(chain, contract, "erc20/transfer-from"),
            from_wallet,
            body,
        )
        .await
    }

    async fn submit_contract_write(
        &self,
        chain: &str,
        contract: &str,
        wallet: &str,
        params: ContractWriteParams,
    ) -> Result<QueueId, EngineError> {
        let mut body = json!({
            "functionName": params.function_signature,
            "args": params.args,
        });
        if let Some(value) = params.value_override {
            body["txOverrides"] = json!({ "value": value });
        }
        if let Some(abi) = params.abi {
            body["abi"] = abi;
        }
        self.post_queued(Self::contract_path(chain, contract, "write"), wallet, body)
            .await
    }

    async fn read_contract(
        &self,
        chain: &str,
        contract: &str,
        function_name: &str,
        args: &[String],
        abi: Option<&Value>,
    ) -> Result<Value, EngineError> {
        let mut query = vec![("functionName", function_name.to_string())];
        if !args.is_empty() {
            query.push(("args", args.join(",")));
        }
        if let Some(abi) = abi {
            query.push(("abi", abi.to_string()));
        }

        let request = self
            .client
            .get(self.url(&Self::contract_path(chain, contract, "read")))
            .query(&query);
        self.send(request).await
    }

    async fn get_status(&self, queue_id: &QueueId) -> Result<String, EngineError> {
        let request = self
            .client
            .get(self.url(&format!("/transaction/status/{}", queue_id)));
        let result: StatusResult = self.send(request).await?;
        result
            .status
            .ok_or_else(|| EngineError::Decode(format!("no status for queue id {}", queue_id)))
    }

    async fn retry_failed(&self, queue_id: &QueueId) -> Result<(), EngineError> {
        let request = self
            .client
            .post(self.url("/transaction/retry-failed"))
            .json(&json!({ "queueId": queue_id }));
        let _: Value = self.send(request).await?;
        Ok(())
    }

    async fn sync_retry(&self, queue_id: &QueueId) -> Result<(), EngineError> {
        let request = self
            .client
            .post(self.url("/transaction/sync-retry"))
            .json(&json!({ "queueId": queue_id }));
        let _: Value = self.send(request).await?;
        Ok(())
    }
}
