//! Transaction building, signing, and confirmation monitoring.
//!
//! # Responsibilities
//! - Check the balance before anything is signed
//! - Estimate gas and apply the configured safety buffer
//! - Build, sign, and broadcast legacy (type 0) transactions
//! - Monitor confirmations

use std::time::Duration;

use alloy::consensus::TxLegacy;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use serde::Serialize;
use tokio::time::{interval, timeout};

use crate::blockchain::client::RpcClient;
use crate::blockchain::types::{
    format_ether, BlockchainError, BlockchainResult, ConfirmationStatus,
};
use crate::blockchain::wallet::Wallet;
use crate::config::TransactionConfig;
use crate::observability::metrics;
use crate::storage::TxKind;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// A transaction that made it on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentTransaction {
    pub hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub nonce: u64,
}

/// Block and gas of a transaction that reached the required depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub block_number: u64,
    pub gas_used: u64,
}

/// Transaction builder for the wallet's signer.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    client: RpcClient,
    wallet: Wallet,
    config: TransactionConfig,
}

impl TxBuilder {
    /// Create a new transaction builder.
    pub fn new(client: RpcClient, wallet: Wallet, config: TransactionConfig) -> Self {
        Self {
            client,
            wallet,
            config,
        }
    }

    /// Get the wallet address.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Client used for every call.
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// Gas limit with the configured buffer on top of `estimate`.
    pub fn buffered_gas_limit(&self, estimate: u64) -> u64 {
        apply_gas_buffer(estimate, self.config.gas_buffer_percent)
    }

    /// Read-only contract call from the wallet address.
    pub async fn call(&self, to: Address, data: Bytes) -> BlockchainResult<Bytes> {
        let request = TransactionRequest::default()
            .with_from(self.wallet.address())
            .with_to(to)
            .with_input(data);
        self.client.eth_call(request).await
    }

    /// Build, sign, broadcast, and confirm a transaction.
    ///
    /// # Arguments
    /// * `to` - Destination address
    /// * `value` - Amount of native token to send, in wei
    /// * `data` - Call data (empty for plain transfers)
    /// * `kind` - Label used for metrics and logs
    pub async fn send(
        &self,
        to: Address,
        value: U256,
        data: Bytes,
        kind: TxKind,
    ) -> BlockchainResult<SentTransaction> {
        let result = self.submit(to, value, data, kind).await;
        let status = match &result {
            Ok(_) => "confirmed",
            Err(BlockchainError::Reverted(_)) => "reverted",
            Err(BlockchainError::InsufficientBalance { .. })
            | Err(BlockchainError::Validation(_))
            | Err(BlockchainError::GasPriceTooHigh { .. }) => "rejected",
            Err(_) => "failed",
        };
        metrics::record_transaction(kind.as_str(), status);
        result
    }

    async fn submit(
        &self,
        to: Address,
        value: U256,
        data: Bytes,
        kind: TxKind,
    ) -> BlockchainResult<SentTransaction> {
        let from = self.wallet.address();

        let balance = self.client.get_balance(from).await?;
        if balance < value {
            return Err(insufficient(balance, value));
        }

        let gas_price = self.client.get_gas_price().await?;
        let gas_price_gwei = gas_price / WEI_PER_GWEI;
        if gas_price_gwei > self.config.max_gas_price_gwei as u128 {
            return Err(BlockchainError::GasPriceTooHigh {
                current_gwei: gas_price_gwei as u64,
                max_gwei: self.config.max_gas_price_gwei,
            });
        }

        let request = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(value)
            .with_input(data.clone());
        let estimate = self
            .client
            .estimate_gas(request)
            .await
            .map_err(|e| map_funds_error(e, balance, value))?;
        let gas_limit = self.buffered_gas_limit(estimate);

        let required = value + U256::from(gas_limit) * U256::from(gas_price);
        if balance < required {
            return Err(insufficient(balance, required));
        }

        let chain_nonce = self.client.get_pending_nonce(from).await?;
        let nonce = self.wallet.reserve_nonce(chain_nonce);

        let tx = TxLegacy {
            chain_id: Some(self.wallet.chain_id()),
            nonce,
            gas_price,
            gas_limit,
            to: alloy::primitives::TxKind::Call(to),
            value,
            input: data,
        };
        let (local_hash, raw) = self.wallet.sign_legacy(tx)?;

        let tx_hash = match self.client.send_raw_transaction(raw).await {
            Ok(hash) => hash,
            Err(e) => {
                self.wallet.release_nonce(nonce);
                return Err(map_funds_error(e, balance, required));
            }
        };
        if tx_hash != local_hash {
            tracing::warn!(local = %local_hash, remote = %tx_hash, "Node returned a different transaction hash");
        }

        tracing::info!(
            tx_hash = %tx_hash,
            kind = %kind,
            nonce = nonce,
            gas_limit = gas_limit,
            "Transaction broadcast"
        );

        let confirmation = self.wait_for_confirmation(tx_hash).await?;
        tracing::info!(
            tx_hash = %tx_hash,
            block_number = confirmation.block_number,
            "Transaction confirmed"
        );
        Ok(SentTransaction {
            hash: tx_hash,
            block_number: confirmation.block_number,
            gas_used: confirmation.gas_used,
            gas_limit,
            gas_price,
            nonce,
        })
    }

    /// Where a transaction stands right now, from one receipt read.
    pub async fn confirmation_status(&self, tx_hash: TxHash) -> BlockchainResult<ConfirmationStatus> {
        let required = self.config.confirmations.max(1);

        let Some(receipt) = self.client.get_transaction_receipt(tx_hash).await? else {
            return Ok(ConfirmationStatus::Pending);
        };
        if !receipt.status() {
            return Ok(ConfirmationStatus::Failed("Transaction reverted".to_string()));
        }

        let current_block = self.client.get_block_number().await?;
        let tx_block = receipt.block_number.unwrap_or(current_block);
        let current = (current_block.saturating_sub(tx_block) + 1) as u32;

        if current >= required {
            Ok(ConfirmationStatus::Confirmed {
                block_number: tx_block,
                gas_used: receipt.gas_used,
            })
        } else {
            Ok(ConfirmationStatus::Confirming { current, required })
        }
    }

    /// Poll until the transaction reaches the configured confirmation depth.
    /// A reverted receipt is returned as `Reverted`.
    pub async fn wait_for_confirmation(&self, tx_hash: TxHash) -> BlockchainResult<Confirmation> {
        let required_confirmations = self.config.confirmations.max(1);
        let timeout_duration = Duration::from_secs(self.config.confirmation_timeout_secs);
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms.max(1));

        let result: Result<BlockchainResult<Confirmation>, _> = timeout(timeout_duration, async {
            let mut ticker = interval(poll_interval);

            loop {
                ticker.tick().await;

                match self.confirmation_status(tx_hash).await? {
                    ConfirmationStatus::Confirmed {
                        block_number,
                        gas_used,
                    } => {
                        return Ok(Confirmation {
                            block_number,
                            gas_used,
                        })
                    }
                    ConfirmationStatus::Failed(reason) => {
                        return Err(BlockchainError::Reverted(format!("{} ({})", reason, tx_hash)))
                    }
                    ConfirmationStatus::Pending => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                    }
                    ConfirmationStatus::Confirming { current, required } => {
                        tracing::debug!(
                            tx_hash = %tx_hash,
                            confirmations = current,
                            required = required,
                            "Waiting for confirmations"
                        );
                    }
                }
            }
        })
        .await;

        match result {
            Ok(confirmation) => confirmation,
            Err(_) => Err(BlockchainError::ConfirmationTimeout(required_confirmations)),
        }
    }
}

/// `estimate + estimate * percent / 100`.
pub fn apply_gas_buffer(estimate: u64, percent: u64) -> u64 {
    estimate.saturating_add(estimate.saturating_mul(percent) / 100)
}

fn insufficient(available: U256, required: U256) -> BlockchainError {
    BlockchainError::InsufficientBalance {
        available: format_ether(available),
        required: format_ether(required),
    }
}

/// Nodes report a short balance as an RPC error; surface it as
/// `InsufficientBalance` instead.
fn map_funds_error(error: BlockchainError, available: U256, required: U256) -> BlockchainError {
    match &error {
        BlockchainError::Rpc(message) | BlockchainError::Reverted(message)
            if message.to_lowercase().contains("insufficient funds") =>
        {
            insufficient(available, required)
        }
        _ => error,
    }
}
