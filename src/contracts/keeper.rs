//! Scheduled payment keeper.
//!
//! Periodically checks the schedules of a set of payers and executes the
//! ones the contract reports as executable.

use std::time::Duration;

use alloy::primitives::Address;
use tokio::time::interval;

use crate::blockchain::types::BlockchainResult;
use crate::contracts::scheduled::ScheduledPaymentsContract;
use crate::lifecycle::Shutdown;

/// Outcome of one keeper round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeeperReport {
    /// Active schedules inspected.
    pub checked: usize,
    /// Schedules executed successfully.
    pub executed: usize,
    /// Schedules (or payers) that could not be processed.
    pub failed: usize,
}

/// Service that executes due schedules.
pub struct ScheduleKeeper {
    contract: ScheduledPaymentsContract,
    payers: Vec<Address>,
    interval: Duration,
}

impl ScheduleKeeper {
    /// Create a keeper. The signing wallet is always among the payers.
    pub fn new(contract: ScheduledPaymentsContract, mut payers: Vec<Address>, interval: Duration) -> Self {
        let own = contract.signer();
        if !payers.contains(&own) {
            payers.insert(0, own);
        }
        Self {
            contract,
            payers,
            interval,
        }
    }

    pub fn payers(&self) -> &[Address] {
        &self.payers
    }

    /// Run rounds until `shutdown` fires.
    pub async fn run(&self, shutdown: &Shutdown) {
        let stopped = shutdown.wait();
        tokio::pin!(stopped);
        let mut ticker = interval(self.interval);

        tracing::info!(
            contract = %self.contract.address(),
            payers = self.payers.len(),
            interval_secs = self.interval.as_secs(),
            "Starting schedule keeper"
        );

        loop {
            tokio::select! {
                _ = &mut stopped => {
                    tracing::info!("Schedule keeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let report = self.run_once().await;
                    tracing::info!(
                        checked = report.checked,
                        executed = report.executed,
                        failed = report.failed,
                        "Keeper round finished"
                    );
                }
            }
        }
    }

    /// One pass over every payer's active schedules.
    pub async fn run_once(&self) -> KeeperReport {
        let mut report = KeeperReport::default();

        for payer in &self.payers {
            let schedules = match self.contract.active_schedules(*payer).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(payer = %payer, error = %e, "Failed to load schedules");
                    report.failed += 1;
                    continue;
                }
            };

            for schedule in schedules {
                report.checked += 1;
                match self.execute_if_due(*payer, schedule.id).await {
                    Ok(true) => report.executed += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(
                            payer = %payer,
                            schedule_id = schedule.id,
                            error = %e,
                            "Failed to execute schedule"
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        report
    }

    async fn execute_if_due(&self, payer: Address, schedule_id: u64) -> BlockchainResult<bool> {
        if !self.contract.is_executable(payer, schedule_id).await? {
            return Ok(false);
        }
        let sent = self.contract.execute(payer, schedule_id).await?;
        tracing::info!(
            payer = %payer,
            schedule_id = schedule_id,
            tx_hash = %sent.hash,
            "Scheduled payment executed"
        );
        Ok(true)
    }
}
