//! Wallet key handling and transaction signing.
//!
//! # Security
//! - Keys come from the secret store or a freshly generated random key
//! - Keys are never logged; `Debug` shows the address only
//! - `private_key_hex` exists for persistence and export only

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxHash, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, Signer};

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Wallet for transaction signing with nonce management.
#[derive(Clone)]
pub struct Wallet {
    /// The underlying signer (private key).
    signer: PrivateKeySigner,
    /// Next nonce for sequential transactions.
    nonce: Arc<AtomicU64>,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl Wallet {
    /// Generate a wallet with a new random key.
    pub fn random(chain_id: u64) -> Self {
        let signer = PrivateKeySigner::random().with_chain_id(Some(chain_id));
        tracing::info!(address = %signer.address(), chain_id = chain_id, "New wallet generated");
        Self {
            signer,
            nonce: Arc::new(AtomicU64::new(0)),
            chain_id,
        }
    }

    /// Create a wallet from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `chain_id` - Chain ID for transaction signing
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> BlockchainResult<Self> {
        let trimmed = private_key_hex.trim();
        let key_hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;
        let signer = signer.with_chain_id(Some(chain_id));

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Wallet loaded"
        );

        Ok(Self {
            signer,
            nonce: Arc::new(AtomicU64::new(0)),
            chain_id,
        })
    }

    /// Same key bound to another chain. The nonce counter starts over.
    pub fn with_chain_id(&self, chain_id: u64) -> Self {
        Self {
            signer: self.signer.clone().with_chain_id(Some(chain_id)),
            nonce: Arc::new(AtomicU64::new(0)),
            chain_id,
        }
    }

    /// Get the wallet's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Get the chain ID this wallet is configured for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// `0x`-prefixed private key, for writing to the secret store.
    pub fn private_key_hex(&self) -> String {
        alloy::hex::encode_prefixed(self.signer.to_bytes())
    }

    /// Get and increment the nonce atomically.
    pub fn get_and_increment_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }

    /// Take the next nonce, never below `chain_nonce`, in one atomic step.
    pub fn reserve_nonce(&self, chain_nonce: u64) -> u64 {
        let previous = self
            .nonce
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |local| {
                Some(local.max(chain_nonce).saturating_add(1))
            })
            .unwrap_or_else(|current| current);
        previous.max(chain_nonce)
    }

    /// Hand `nonce` back if it is still the last one reserved.
    pub fn release_nonce(&self, nonce: u64) {
        let _ = self.nonce.compare_exchange(
            nonce.saturating_add(1),
            nonce,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Set the nonce to a specific value (e.g., after querying from chain).
    pub fn set_nonce(&self, nonce: u64) {
        self.nonce.store(nonce, Ordering::SeqCst);
    }

    /// Get current nonce without incrementing.
    pub fn current_nonce(&self) -> u64 {
        self.nonce.load(Ordering::SeqCst)
    }

    /// Sign a 32-byte hash.
    pub async fn sign_hash(&self, hash: B256) -> BlockchainResult<Signature> {
        self.signer
            .sign_hash(&hash)
            .await
            .map_err(|e| BlockchainError::Wallet(format!("Signing failed: {}", e)))
    }

    /// Sign arbitrary message bytes (with Ethereum prefix).
    pub async fn sign_message(&self, message: &[u8]) -> BlockchainResult<Signature> {
        self.signer
            .sign_message(message)
            .await
            .map_err(|e| BlockchainError::Wallet(format!("Message signing failed: {}", e)))
    }

    /// Sign a legacy (type 0) transaction.
    ///
    /// Returns the transaction hash and the EIP-2718 encoded bytes ready for
    /// `eth_sendRawTransaction`.
    pub fn sign_legacy(&self, mut tx: TxLegacy) -> BlockchainResult<(TxHash, Bytes)> {
        if tx.chain_id.is_none() {
            tx.chain_id = Some(self.chain_id);
        }

        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| BlockchainError::Wallet(format!("Transaction signing failed: {}", e)))?;

        let signed = tx.into_signed(signature);
        let hash = *signed.hash();
        let envelope = TxEnvelope::from(signed);

        Ok((hash, Bytes::from(envelope.encoded_2718())))
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .field("nonce", &self.current_nonce())
            .finish()
    }
}
