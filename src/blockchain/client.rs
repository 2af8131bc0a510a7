//! Blockchain RPC client with endpoint rotation and retries.
//!
//! # Responsibilities
//! - Connect to every JSON-RPC endpoint of the active network profile
//! - Run each call against the current endpoint under the retry policy
//! - Rotate to the next endpoint after each transient failure
//! - Provide health check for blockchain connectivity

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::{RpcError, TransportError, TransportResult};

use crate::blockchain::network::NetworkProfile;
use crate::blockchain::types::{BlockchainError, BlockchainResult, ChainId};
use crate::observability::metrics;
use crate::resilience::retries::{message_is_transient, retry, AttemptError, Retryable, RetryPolicy};

/// Shared handle to one alloy HTTP provider.
pub type DynProvider = Arc<dyn Provider + Send + Sync>;

/// JSON-RPC error code used by several nodes for "limit exceeded".
const LIMIT_EXCEEDED_CODE: i64 = -32005;

impl Retryable for TransportError {
    fn is_transient(&self) -> bool {
        match self {
            RpcError::ErrorResp(payload) => {
                payload.code == LIMIT_EXCEEDED_CODE || message_is_transient(&payload.message)
            }
            RpcError::SerError(_) | RpcError::UnsupportedFeature(_) | RpcError::LocalUsageError(_) => {
                false
            }
            _ => true,
        }
    }
}

struct Endpoint {
    url: String,
    provider: DynProvider,
}

/// Blockchain RPC client wrapper with failover support.
#[derive(Clone)]
pub struct RpcClient {
    /// Endpoints in rotation order.
    endpoints: Arc<Vec<Endpoint>>,
    /// Index of the endpoint used for the next call.
    cursor: Arc<AtomicUsize>,
    /// Network this client talks to.
    profile: NetworkProfile,
    /// Retry schedule for every call.
    policy: RetryPolicy,
}

impl RpcClient {
    /// Create a client for a network profile.
    ///
    /// The first URL must be valid; later URLs that fail to parse are skipped.
    pub fn new(profile: NetworkProfile, policy: RetryPolicy) -> BlockchainResult<Self> {
        let mut endpoints = Vec::with_capacity(profile.rpc_urls.len());

        for (i, url_str) in profile.rpc_urls.iter().enumerate() {
            match url_str.parse::<url::Url>() {
                Ok(url) => endpoints.push(Endpoint {
                    url: url_str.clone(),
                    provider: Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider,
                }),
                Err(e) if i == 0 => {
                    return Err(BlockchainError::Rpc(format!(
                        "Invalid RPC URL '{}': {}",
                        url_str, e
                    )));
                }
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        if endpoints.is_empty() {
            return Err(BlockchainError::Rpc(format!(
                "No RPC endpoints configured for {}",
                profile.name
            )));
        }

        tracing::debug!(
            network = %profile.name,
            chain_id = profile.chain_id,
            endpoints = endpoints.len(),
            "RPC client created"
        );

        Ok(Self {
            endpoints: Arc::new(endpoints),
            cursor: Arc::new(AtomicUsize::new(0)),
            profile,
            policy,
        })
    }

    /// Run `op` against the current endpoint, rotating and retrying on
    /// transient failures.
    pub async fn call<T, Op, Fut>(&self, method: &'static str, op: Op) -> BlockchainResult<T>
    where
        Op: Fn(DynProvider) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        let result = retry(
            &self.policy,
            method,
            |_| op(self.current_provider()),
            |_| self.rotate(),
        )
        .await;

        match result {
            Ok(value) => {
                metrics::record_rpc_request(method, "ok");
                Ok(value)
            }
            Err(AttemptError::TimedOut(d)) => {
                metrics::record_rpc_request(method, "timeout");
                Err(BlockchainError::Timeout(d.as_millis() as u64))
            }
            Err(AttemptError::Failed(e)) => {
                metrics::record_rpc_request(method, "error");
                Err(map_transport_error(e))
            }
        }
    }

    /// Switch to the next endpoint in the rotation.
    pub fn rotate(&self) {
        let len = self.endpoints.len();
        let previous = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| Some((i + 1) % len))
            .unwrap_or(0);
        let next = (previous + 1) % len;

        metrics::record_rpc_failover();
        tracing::info!(
            from = %self.endpoints[previous % len].url,
            to = %self.endpoints[next].url,
            "Switching RPC endpoint"
        );
    }

    fn current_provider(&self) -> DynProvider {
        let idx = self.cursor.load(Ordering::SeqCst) % self.endpoints.len();
        self.endpoints[idx].provider.clone()
    }

    /// URL of the endpoint used for the next call.
    pub fn current_url(&self) -> &str {
        let idx = self.cursor.load(Ordering::SeqCst) % self.endpoints.len();
        &self.endpoints[idx].url
    }

    /// Number of usable endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Network profile this client was built from.
    pub fn profile(&self) -> &NetworkProfile {
        &self.profile
    }

    /// Retry policy applied to every call.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Verify the connected chain ID matches the profile.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.profile.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.profile.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        self.call("eth_chainId", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId)
    }

    /// Get the latest block number.
    pub async fn get_block_number(&self) -> BlockchainResult<u64> {
        self.call("eth_blockNumber", |p| async move { p.get_block_number().await })
            .await
    }

    /// Get the balance of an address.
    pub async fn get_balance(&self, address: Address) -> BlockchainResult<U256> {
        self.call("eth_getBalance", move |p| async move {
            p.get_balance(address).await
        })
        .await
    }

    /// Get the pending transaction count (nonce) for an address.
    pub async fn get_pending_nonce(&self, address: Address) -> BlockchainResult<u64> {
        self.call("eth_getTransactionCount", move |p| async move {
            p.get_transaction_count(address).pending().await
        })
        .await
    }

    /// Get current gas price in wei.
    pub async fn get_gas_price(&self) -> BlockchainResult<u128> {
        self.call("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
    }

    /// Estimate the gas a transaction would use.
    pub async fn estimate_gas(&self, tx: TransactionRequest) -> BlockchainResult<u64> {
        self.call("eth_estimateGas", move |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(tx).await }
        })
        .await
    }

    /// Execute a read-only call.
    pub async fn eth_call(&self, tx: TransactionRequest) -> BlockchainResult<Bytes> {
        self.call("eth_call", move |p| {
            let tx = tx.clone();
            async move { p.call(tx).await }
        })
        .await
    }

    /// Get the deployed code at an address.
    pub async fn get_code(&self, address: Address) -> BlockchainResult<Bytes> {
        self.call("eth_getCode", move |p| async move {
            p.get_code_at(address).await
        })
        .await
    }

    /// Broadcast a signed, EIP-2718 encoded transaction.
    pub async fn send_raw_transaction(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        self.call("eth_sendRawTransaction", move |p| {
            let raw = raw.clone();
            async move {
                let pending = p.send_raw_transaction(&raw).await?;
                Ok(*pending.tx_hash())
            }
        })
        .await
    }

    /// Get a transaction receipt by hash.
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> BlockchainResult<Option<TransactionReceipt>> {
        self.call("eth_getTransactionReceipt", move |p| async move {
            p.get_transaction_receipt(tx_hash).await
        })
        .await
    }

    /// Check if the blockchain is reachable and healthy.
    ///
    /// Returns true if we can query the block number.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.get_block_number().await.is_ok();
        metrics::record_rpc_health(&self.profile.name, healthy);
        healthy
    }
}

fn map_transport_error(error: TransportError) -> BlockchainError {
    if let RpcError::ErrorResp(payload) = &error {
        let message = payload.message.to_string();
        if message.to_lowercase().contains("revert") {
            return BlockchainError::Reverted(message);
        }
    }
    BlockchainError::Rpc(error.to_string())
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("network", &self.profile.name)
            .field("chain_id", &self.profile.chain_id)
            .field("current_url", &self.current_url())
            .field("endpoints", &self.endpoints.len())
            .finish()
    }
}
