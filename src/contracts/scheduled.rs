//! Scheduled payments façade (CrescaCalendarPayments).

use alloy::primitives::{Address, U256};

use crate::blockchain::transaction::{SentTransaction, TxBuilder};
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::contracts::abi::ICrescaCalendarPayments;
use crate::contracts::{ensure_positive, indexed, ContractHandle, ScheduledPayment};
use crate::storage::{TransactionHistory, TxKind};

/// Largest number of occurrences one schedule may have.
pub const MAX_OCCURRENCES: u64 = 1000;

/// Parameters of a new schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSchedule {
    pub recipient: Address,
    /// Amount per occurrence, in wei.
    pub amount: U256,
    /// Unix time of the first execution.
    pub execute_at: u64,
    /// Seconds between executions; 0 for a one-time payment.
    pub interval_secs: u64,
    pub occurrences: u64,
}

impl NewSchedule {
    /// Escrow the contract expects up front: `amount * occurrences`.
    pub fn total_value(&self) -> BlockchainResult<U256> {
        self.amount
            .checked_mul(U256::from(self.occurrences))
            .ok_or_else(|| BlockchainError::InvalidAmount("Schedule total overflows".to_string()))
    }

    pub fn validate(&self) -> BlockchainResult<()> {
        if self.occurrences == 0 || self.occurrences > MAX_OCCURRENCES {
            return Err(BlockchainError::Validation(format!(
                "Invalid number of occurrences (1-{})",
                MAX_OCCURRENCES
            )));
        }
        ensure_positive(self.amount, "Payment amount")
    }
}

/// Façade over the scheduled payments contract.
#[derive(Debug, Clone)]
pub struct ScheduledPaymentsContract {
    inner: ContractHandle,
}

impl ScheduledPaymentsContract {
    pub fn new(tx: TxBuilder, address: Address, history: TransactionHistory) -> Self {
        Self {
            inner: ContractHandle::new(tx, address, history),
        }
    }

    pub fn address(&self) -> Address {
        self.inner.address
    }

    /// Wallet address that signs every write.
    pub fn signer(&self) -> Address {
        self.inner.tx.address()
    }

    /// Create a schedule, escrowing `amount * occurrences`.
    pub async fn create_schedule(&self, schedule: NewSchedule) -> BlockchainResult<SentTransaction> {
        schedule.validate()?;
        let total = schedule.total_value()?;

        tracing::info!(
            recipient = %schedule.recipient,
            occurrences = schedule.occurrences,
            execute_at = schedule.execute_at,
            "Creating scheduled payment"
        );

        let call = ICrescaCalendarPayments::createScheduleCall {
            recipient: schedule.recipient,
            amount: schedule.amount,
            executeAt: U256::from(schedule.execute_at),
            intervalSeconds: U256::from(schedule.interval_secs),
            occurrences: U256::from(schedule.occurrences),
        };
        self.inner
            .write(call, total, TxKind::ScheduleCreate, Some(schedule.recipient))
            .await
    }

    /// Execute a due schedule of `payer`.
    pub async fn execute(&self, payer: Address, schedule_id: u64) -> BlockchainResult<SentTransaction> {
        let call = ICrescaCalendarPayments::executeScheduleCall {
            payer,
            scheduleId: U256::from(schedule_id),
        };
        self.inner
            .write(call, U256::ZERO, TxKind::ScheduleExecute, Some(payer))
            .await
    }

    /// Cancel one of the wallet's own schedules; the contract refunds the escrow.
    pub async fn cancel(&self, schedule_id: u64) -> BlockchainResult<SentTransaction> {
        let call = ICrescaCalendarPayments::cancelScheduleCall {
            scheduleId: U256::from(schedule_id),
        };
        self.inner
            .write(call, U256::ZERO, TxKind::ScheduleCancel, None)
            .await
    }

    pub async fn user_schedules(&self, user: Address) -> BlockchainResult<Vec<ScheduledPayment>> {
        let schedules = self
            .inner
            .read(ICrescaCalendarPayments::getUserSchedulesCall { user })
            .await?;
        Ok(indexed(schedules))
    }

    /// Active schedules of `user`, keeping their ids.
    pub async fn active_schedules(&self, user: Address) -> BlockchainResult<Vec<ScheduledPayment>> {
        let schedules = self.user_schedules(user).await?;
        Ok(schedules.into_iter().filter(|s| s.active).collect())
    }

    pub async fn is_executable(&self, payer: Address, schedule_id: u64) -> BlockchainResult<bool> {
        self.inner
            .read(ICrescaCalendarPayments::isExecutableCall {
                payer,
                scheduleId: U256::from(schedule_id),
            })
            .await
    }

    /// Unix time of the next execution.
    pub async fn next_execution_time(
        &self,
        payer: Address,
        schedule_id: u64,
    ) -> BlockchainResult<u64> {
        let time = self
            .inner
            .read(ICrescaCalendarPayments::getNextExecutionTimeCall {
                payer,
                scheduleId: U256::from(schedule_id),
            })
            .await?;
        Ok(time.saturating_to())
    }

    /// Total escrow held for `user`, in wei.
    pub async fn total_escrowed(&self, user: Address) -> BlockchainResult<U256> {
        self.inner
            .read(ICrescaCalendarPayments::getTotalEscrowedCall { user })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(occurrences: u64, interval_secs: u64) -> NewSchedule {
        NewSchedule {
            recipient: Address::repeat_byte(2),
            amount: U256::from(1_000u64),
            execute_at: 1_700_000_000,
            interval_secs,
            occurrences,
        }
    }

    #[test]
    fn test_occurrence_bounds() {
        assert!(schedule(1, 0).validate().is_ok());
        assert!(schedule(1000, 60).validate().is_ok());
        assert!(schedule(0, 60).validate().is_err());
        assert!(schedule(1001, 60).validate().is_err());
    }

    #[test]
    fn test_interval_left_to_the_contract() {
        assert!(schedule(3, 0).validate().is_ok());
    }

    #[test]
    fn test_total_value() {
        assert_eq!(schedule(12, 60).total_value().unwrap(), U256::from(12_000u64));

        let huge = NewSchedule {
            amount: U256::MAX,
            ..schedule(2, 60)
        };
        assert!(huge.total_value().is_err());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let zero = NewSchedule {
            amount: U256::ZERO,
            ..schedule(1, 0)
        };
        assert!(matches!(zero.validate(), Err(BlockchainError::InvalidAmount(_))));
    }
}
