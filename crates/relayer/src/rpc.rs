//! JSON-RPC over a single duplex connection.
//!
//! Every request carries a correlation id and parks on a oneshot receiver.
//! One demultiplexing task reads responses and routes them by id, so
//! concurrent callers never consume each other's replies.

use async_trait::async_trait;
use cosmwasm_std::Uint256;
use intent_settle_types::NetworkId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{ChainClient, ChainError, Confirmation, RedeemableClaim, Transaction, TxHash};

/// Error codes the node uses for typed failures.
pub mod codes {
    pub const STALE_SEQUENCE: i64 = -32001;
    pub const INSUFFICIENT_LIQUIDITY: i64 = -32002;
    pub const SLIPPAGE_EXCEEDED: i64 = -32003;
    pub const ALREADY_PROCESSED: i64 = -32004;
    pub const REVERTED: i64 = -32005;
    pub const NOT_FOUND: i64 = -32006;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// Outbound half of the connection.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send(&self, request: RpcRequest) -> Result<(), ChainError>;
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<RpcResponse>>>>;

pub struct RpcMultiplexer {
    transport: Arc<dyn RpcTransport>,
    pending: PendingMap,
    next_id: AtomicU64,
    request_timeout: Duration,
    demux: JoinHandle<()>,
}

/// Removes the pending entry however the call ends.
struct PendingGuard {
    pending: PendingMap,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.id);
        }
    }
}

impl RpcMultiplexer {
    /// Start the demultiplexer over the inbound `responses` stream.
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        mut responses: mpsc::Receiver<RpcResponse>,
        request_timeout: Duration,
    ) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let table = pending.clone();

        let demux = tokio::spawn(async move {
            while let Some(response) = responses.recv().await {
                let waiter = match table.lock() {
                    Ok(mut table) => table.remove(&response.id),
                    Err(_) => break,
                };
                match waiter {
                    Some(tx) => {
                        // Receiver gone means the caller already gave up.
                        let _ = tx.send(response);
                    }
                    None => debug!(id = response.id, "Dropping response with no waiter"),
                }
            }
            // Connection closed: wake every waiter with a closed channel.
            if let Ok(mut table) = table.lock() {
                table.clear();
            }
        });

        Self {
            transport,
            pending,
            next_id: AtomicU64::new(1),
            request_timeout,
            demux,
        }
    }

    /// Requests still awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| ChainError::Rpc("pending table poisoned".to_string()))?
            .insert(id, tx);
        let _guard = PendingGuard {
            pending: self.pending.clone(),
            id,
        };

        self.transport
            .send(RpcRequest {
                jsonrpc: "2.0".to_string(),
                id,
                method: method.to_string(),
                params,
            })
            .await?;

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(ChainError::ConnectionFailed("connection closed".to_string())),
            Err(_) => {
                warn!(id, method, "RPC request timed out");
                return Err(ChainError::Timeout(format!(
                    "{method} got no response within {:?}",
                    self.request_timeout
                )));
            }
        };

        match (response.result, response.error) {
            (_, Some(error)) => Err(map_rpc_error(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }

    pub async fn call_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainError> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| ChainError::Rpc(format!("malformed {method} response: {e}")))
    }
}

impl Drop for RpcMultiplexer {
    fn drop(&mut self) {
        self.demux.abort();
    }
}

fn map_rpc_error(error: RpcErrorObject) -> ChainError {
    let data = error.data.unwrap_or(Value::Null);
    match error.code {
        codes::STALE_SEQUENCE => ChainError::StaleSequence {
            expected: data["expected"].as_u64().unwrap_or_default(),
            got: data["got"].as_u64().unwrap_or_default(),
        },
        codes::INSUFFICIENT_LIQUIDITY => ChainError::InsufficientLiquidity(error.message),
        codes::SLIPPAGE_EXCEEDED => ChainError::SlippageExceeded(error.message),
        codes::ALREADY_PROCESSED => ChainError::AlreadyProcessed {
            tx_hash: data["tx_hash"].as_str().map(str::to_string),
        },
        codes::REVERTED => ChainError::Reverted(error.message),
        -32099..=-32000 => ChainError::Rejected(error.message),
        _ => ChainError::Rpc(format!("{} ({})", error.message, error.code)),
    }
}

#[derive(Debug, Deserialize)]
struct SequenceResult {
    sequence: u64,
}

#[derive(Debug, Deserialize)]
struct BroadcastResult {
    tx_hash: TxHash,
}

#[derive(Debug, Deserialize)]
struct TxStatusResult {
    confirmed: bool,
    #[serde(default)]
    height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ClaimResult {
    claim_id: String,
    asset: String,
    amount: Uint256,
}

/// [`ChainClient`] over a multiplexed JSON-RPC connection.
pub struct RpcChainClient {
    rpc: Arc<RpcMultiplexer>,
    poll_interval: Duration,
}

impl RpcChainClient {
    pub fn new(rpc: Arc<RpcMultiplexer>) -> Self {
        Self {
            rpc,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_sequence_number(
        &self,
        network: &NetworkId,
        account: &str,
    ) -> Result<u64, ChainError> {
        let result: SequenceResult = self
            .rpc
            .call_typed(
                "account_sequence",
                json!({ "network": network, "account": account }),
            )
            .await?;
        Ok(result.sequence)
    }

    async fn submit(&self, tx: Transaction) -> Result<TxHash, ChainError> {
        let params = serde_json::to_value(&tx)
            .map_err(|e| ChainError::Rpc(format!("failed to encode transaction: {e}")))?;
        let result: BroadcastResult = self.rpc.call_typed("broadcast_tx", params).await?;
        Ok(result.tx_hash)
    }

    async fn await_confirmation(
        &self,
        network: &NetworkId,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<Confirmation, ChainError> {
        let poll = async {
            loop {
                let status: TxStatusResult = match self
                    .rpc
                    .call_typed("tx_status", json!({ "network": network, "tx_hash": tx_hash }))
                    .await
                {
                    Ok(status) => status,
                    Err(e) => return Err(e),
                };
                if status.confirmed {
                    return Ok::<_, ChainError>(Confirmation {
                        tx_hash: tx_hash.to_string(),
                        height: status.height.unwrap_or_default(),
                    });
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| ChainError::Timeout(format!("{tx_hash} unconfirmed after {timeout:?}")))?
    }

    async fn redeemable_claims(
        &self,
        network: &NetworkId,
        account: &str,
        asset: &str,
    ) -> Result<Vec<RedeemableClaim>, ChainError> {
        let claims: Vec<ClaimResult> = self
            .rpc
            .call_typed(
                "redeemable_claims",
                json!({ "network": network, "account": account, "asset": asset }),
            )
            .await?;
        Ok(claims
            .into_iter()
            .map(|c| RedeemableClaim {
                claim_id: c.claim_id,
                asset: c.asset,
                amount: c.amount,
            })
            .collect())
    }
}

/// In-process transport that hands requests to a channel. Used by tests and
/// by servers embedding the engine.
pub struct ChannelTransport {
    outbound: mpsc::Sender<RpcRequest>,
}

impl ChannelTransport {
    pub fn new(outbound: mpsc::Sender<RpcRequest>) -> Self {
        Self { outbound }
    }
}

#[async_trait]
impl RpcTransport for ChannelTransport {
    async fn send(&self, request: RpcRequest) -> Result<(), ChainError> {
        self.outbound
            .send(request)
            .await
            .map_err(|_| ChainError::ConnectionFailed("transport closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn harness(
        timeout: Duration,
    ) -> (
        Arc<RpcMultiplexer>,
        mpsc::Receiver<RpcRequest>,
        mpsc::Sender<RpcResponse>,
    ) {
        let (req_tx, req_rx) = mpsc::channel(64);
        let (resp_tx, resp_rx) = mpsc::channel(64);
        let rpc = RpcMultiplexer::new(Arc::new(ChannelTransport::new(req_tx)), resp_rx, timeout);
        (Arc::new(rpc), req_rx, resp_tx)
    }

    fn ok(id: u64, result: Value) -> RpcResponse {
        RpcResponse {
            id,
            result: Some(result),
            error: None,
        }
    }

    #[tokio::test]
    async fn test_out_of_order_responses_reach_their_callers() {
        let (rpc, mut requests, responses) = harness(Duration::from_secs(5));

        let server = tokio::spawn(async move {
            let mut batch = Vec::new();
            for _ in 0..3 {
                batch.push(requests.recv().await.unwrap());
            }
            for request in batch.into_iter().rev() {
                let echo = request.params["n"].clone();
                responses.send(ok(request.id, echo)).await.unwrap();
            }
        });

        let calls = (0..3u64).map(|n| {
            let rpc = rpc.clone();
            tokio::spawn(async move { rpc.call("echo", json!({ "n": n })).await })
        });
        let calls: Vec<_> = calls.collect();

        for (n, call) in calls.into_iter().enumerate() {
            assert_eq!(call.await.unwrap().unwrap(), json!(n as u64));
        }
        server.await.unwrap();
        assert_eq!(rpc.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_removes_pending_entry() {
        let (rpc, _requests, _responses) = harness(Duration::from_millis(20));

        let result = rpc.call("silent", Value::Null).await;
        assert!(matches!(result, Err(ChainError::Timeout(_))));
        assert_eq!(rpc.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_caller_removes_pending_entry() {
        let (rpc, mut requests, _responses) = harness(Duration::from_secs(5));

        let caller = {
            let rpc = rpc.clone();
            tokio::spawn(async move { rpc.call("slow", Value::Null).await })
        };
        requests.recv().await.unwrap();
        assert_eq!(rpc.pending_count(), 1);

        caller.abort();
        let _ = caller.await;
        assert_eq!(rpc.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_typed_errors() {
        let (rpc, mut requests, responses) = harness(Duration::from_secs(5));
        let client = RpcChainClient::new(rpc.clone());

        tokio::spawn(async move {
            let request = requests.recv().await.unwrap();
            responses
                .send(RpcResponse {
                    id: request.id,
                    result: None,
                    error: Some(RpcErrorObject {
                        code: codes::ALREADY_PROCESSED,
                        message: "nonce used".to_string(),
                        data: Some(json!({ "tx_hash": "0xfirst" })),
                    }),
                })
                .await
                .unwrap();
        });

        let tx = Transaction {
            network: NetworkId::from("base"),
            account: "relayer".to_string(),
            sequence: 0,
            payload: crate::TxPayload::RedeemClaim {
                claim_id: "c".to_string(),
            },
        };
        assert_eq!(
            client.submit(tx).await,
            Err(ChainError::AlreadyProcessed {
                tx_hash: Some("0xfirst".to_string())
            })
        );
    }

    #[tokio::test]
    async fn test_closed_connection_fails_waiters() {
        let (rpc, mut requests, responses) = harness(Duration::from_secs(5));

        let caller = {
            let rpc = rpc.clone();
            tokio::spawn(async move { rpc.call("doomed", Value::Null).await })
        };
        requests.recv().await.unwrap();
        drop(responses);

        assert!(matches!(
            caller.await.unwrap(),
            Err(ChainError::ConnectionFailed(_))
        ));
    }
}
