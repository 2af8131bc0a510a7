//! Leveraged bucket façade (CrescaBucketProtocol).

use alloy::primitives::{Address, I256, U256};

use crate::blockchain::transaction::{SentTransaction, TxBuilder};
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::contracts::abi::ICrescaBucketProtocol;
use crate::contracts::{ensure_positive, indexed, Bucket, ContractHandle, Position};
use crate::storage::{TransactionHistory, TxKind};

pub const MIN_LEVERAGE: u8 = 1;
pub const MAX_LEVERAGE: u8 = 150;
/// Weights of a bucket must add up to exactly this.
pub const TOTAL_WEIGHT: u64 = 100;

/// Façade over the bucket protocol contract.
#[derive(Debug, Clone)]
pub struct BucketContract {
    inner: ContractHandle,
}

impl BucketContract {
    pub fn new(tx: TxBuilder, address: Address, history: TransactionHistory) -> Self {
        Self {
            inner: ContractHandle::new(tx, address, history),
        }
    }

    pub fn address(&self) -> Address {
        self.inner.address
    }

    /// Whether contract code exists at the configured address.
    pub async fn is_deployed(&self) -> BlockchainResult<bool> {
        let code = self.inner.tx.client().get_code(self.inner.address).await?;
        Ok(!code.is_empty())
    }

    pub async fn create_bucket(
        &self,
        assets: &[Address],
        weights: &[u64],
        leverage: u8,
    ) -> BlockchainResult<SentTransaction> {
        validate_bucket(assets, weights, leverage)?;

        tracing::info!(assets = assets.len(), leverage = leverage, "Creating bucket");

        let call = ICrescaBucketProtocol::createBucketCall {
            assets: assets.to_vec(),
            weights: weights.to_vec(),
            leverage,
        };
        self.inner
            .write(call, U256::ZERO, TxKind::BucketCreate, None)
            .await
    }

    pub async fn rebalance(&self, bucket_id: u64, weights: &[u64]) -> BlockchainResult<SentTransaction> {
        validate_weights(weights)?;
        let call = ICrescaBucketProtocol::rebalanceBucketCall {
            bucketId: bucket_id,
            newWeights: weights.to_vec(),
        };
        self.inner
            .write(call, U256::ZERO, TxKind::BucketRebalance, None)
            .await
    }

    pub async fn deposit_collateral(&self, amount: U256) -> BlockchainResult<SentTransaction> {
        ensure_positive(amount, "Collateral amount")?;
        self.inner
            .write(
                ICrescaBucketProtocol::depositCollateralCall {},
                amount,
                TxKind::CollateralDeposit,
                None,
            )
            .await
    }

    pub async fn withdraw_collateral(&self, amount: U256) -> BlockchainResult<SentTransaction> {
        ensure_positive(amount, "Collateral amount")?;
        self.inner
            .write(
                ICrescaBucketProtocol::withdrawCollateralCall { amount },
                U256::ZERO,
                TxKind::CollateralWithdraw,
                None,
            )
            .await
    }

    /// Collateral held by the contract for `user`, in wei.
    pub async fn collateral_balance(&self, user: Address) -> BlockchainResult<U256> {
        self.inner
            .read(ICrescaBucketProtocol::getCollateralBalanceCall { user })
            .await
    }

    /// Open a position; the margin is taken from deposited collateral.
    pub async fn open_position(
        &self,
        bucket_id: u64,
        is_long: bool,
        margin: U256,
    ) -> BlockchainResult<SentTransaction> {
        ensure_positive(margin, "Margin")?;
        let call = ICrescaBucketProtocol::openPositionCall {
            bucketId: bucket_id,
            isLong: is_long,
            margin,
        };
        self.inner
            .write(call, U256::ZERO, TxKind::PositionOpen, None)
            .await
    }

    /// Close a position and wait for confirmation.
    pub async fn close_position(&self, position_id: u64) -> BlockchainResult<SentTransaction> {
        let call = ICrescaBucketProtocol::closePositionCall {
            positionId: U256::from(position_id),
        };
        self.inner
            .write(call, U256::ZERO, TxKind::PositionClose, None)
            .await
    }

    pub async fn user_buckets(&self, user: Address) -> BlockchainResult<Vec<Bucket>> {
        let buckets = self
            .inner
            .read(ICrescaBucketProtocol::getUserBucketsCall { user })
            .await?;
        Ok(indexed(buckets))
    }

    pub async fn user_positions(&self, user: Address) -> BlockchainResult<Vec<Position>> {
        let positions = self
            .inner
            .read(ICrescaBucketProtocol::getUserPositionsCall { user })
            .await?;
        Ok(indexed(positions))
    }

    /// Signed PnL of a position in wei.
    pub async fn unrealized_pnl(&self, owner: Address, position_id: u64) -> BlockchainResult<I256> {
        self.inner
            .read(ICrescaBucketProtocol::getUnrealizedPnLCall {
                owner,
                positionId: U256::from(position_id),
            })
            .await
    }
}

/// Checks the contract would otherwise revert on.
pub fn validate_bucket(assets: &[Address], weights: &[u64], leverage: u8) -> BlockchainResult<()> {
    if assets.is_empty() || weights.is_empty() {
        return Err(BlockchainError::Validation(
            "At least one asset must be selected".to_string(),
        ));
    }
    if assets.len() != weights.len() {
        return Err(BlockchainError::Validation(
            "Asset and weight arrays must have the same length".to_string(),
        ));
    }
    validate_weights(weights)?;
    if !(MIN_LEVERAGE..=MAX_LEVERAGE).contains(&leverage) {
        return Err(BlockchainError::Validation(format!(
            "Leverage must be between {}x and {}x",
            MIN_LEVERAGE, MAX_LEVERAGE
        )));
    }
    Ok(())
}

fn validate_weights(weights: &[u64]) -> BlockchainResult<()> {
    if weights.is_empty() {
        return Err(BlockchainError::Validation(
            "At least one weight is required".to_string(),
        ));
    }
    let total = weights.iter().try_fold(0u64, |acc, w| acc.checked_add(*w));
    if total != Some(TOTAL_WEIGHT) {
        return Err(BlockchainError::Validation(format!(
            "Asset weights must sum to exactly {}",
            TOTAL_WEIGHT
        )));
    }
    Ok(())
}
