//! Cresca module calls on the Move network.

use std::sync::Arc;

use alloy::hex;
use serde_json::{json, Value};

use crate::contracts::bucket::{MAX_LEVERAGE, MIN_LEVERAGE, TOTAL_WEIGHT};
use crate::contracts::payments::MAX_MEMO_CHARS;
use crate::movement::client::MovementClient;
use crate::movement::types::{
    format_octas, normalize_address, parse_octas, value_as_u64, EntryFunction, MovementError,
    MovementResult, PaymentStats,
};
use crate::observability::metrics;
use crate::storage::{TransactionHistory, TxKind, TxRecord, TxStatus};

/// Façade over the `payments`, `wallet` and `bucket_protocol` modules.
#[derive(Debug, Clone)]
pub struct MovementService {
    client: Arc<MovementClient>,
    module_address: String,
    history: TransactionHistory,
}

impl MovementService {
    pub fn new(client: Arc<MovementClient>, history: TransactionHistory) -> MovementResult<Self> {
        let module_address = normalize_address(&client.config().contract_address)?;
        Ok(Self {
            client,
            module_address,
            history,
        })
    }

    pub fn client(&self) -> &MovementClient {
        &self.client
    }

    fn function(&self, module: &str, name: &str) -> String {
        format!("{}::{}::{}", self.module_address, module, name)
    }

    async fn submit(
        &self,
        module: &str,
        name: &str,
        arguments: Vec<Value>,
        kind: TxKind,
        amount: u64,
        counterparty: Option<String>,
    ) -> MovementResult<String> {
        let payload = EntryFunction::new(self.function(module, name), arguments);

        match self.client.submit_entry_function(payload).await {
            Ok(hash) => {
                metrics::record_transaction(kind.as_str(), "confirmed");
                let record = TxRecord::new(
                    hash.clone(),
                    kind,
                    format_octas(amount),
                    counterparty,
                    TxStatus::Confirmed,
                );
                if let Err(e) = self.history.record(record) {
                    tracing::warn!(tx_hash = %hash, error = %e, "Failed to record transaction history");
                }
                Ok(hash)
            }
            Err(e) => {
                let status = match e {
                    MovementError::TransactionFailed { .. } => "reverted",
                    _ => "failed",
                };
                metrics::record_transaction(kind.as_str(), status);
                tracing::error!(function = %self.function(module, name), error = %e, "Move transaction failed");
                Err(e)
            }
        }
    }

    // ---------------------------------------------------------------
    // Payments
    // ---------------------------------------------------------------

    /// Send `amount` coins with a memo (sent as hex bytes).
    pub async fn send_payment(&self, recipient: &str, amount: &str, memo: &str) -> MovementResult<String> {
        let recipient = normalize_address(recipient)?;
        let octas = parse_octas(amount)?;
        if memo.chars().count() > MAX_MEMO_CHARS {
            return Err(MovementError::Validation(format!(
                "Memo too long (max {} characters)",
                MAX_MEMO_CHARS
            )));
        }

        self.submit(
            "payments",
            "send_payment",
            vec![
                json!(recipient),
                json!(octas.to_string()),
                json!(hex::encode_prefixed(memo.trim().as_bytes())),
            ],
            TxKind::Payment,
            octas,
            Some(recipient.clone()),
        )
        .await
    }

    pub async fn tap_to_pay(&self, recipient: &str, amount: &str) -> MovementResult<String> {
        let recipient = normalize_address(recipient)?;
        let octas = parse_octas(amount)?;

        self.submit(
            "payments",
            "tap_to_pay",
            vec![json!(recipient), json!(octas.to_string())],
            TxKind::TapToPay,
            octas,
            Some(recipient.clone()),
        )
        .await
    }

    pub async fn batch_send(&self, recipients: &[&str], amounts: &[&str]) -> MovementResult<String> {
        if recipients.is_empty() {
            return Err(MovementError::Validation("No recipients".to_string()));
        }
        if recipients.len() != amounts.len() {
            return Err(MovementError::Validation(
                "Recipients and amounts must have the same length".to_string(),
            ));
        }

        let recipients = recipients
            .iter()
            .map(|r| normalize_address(r))
            .collect::<MovementResult<Vec<_>>>()?;
        let amounts = amounts
            .iter()
            .map(|a| parse_octas(a))
            .collect::<MovementResult<Vec<_>>>()?;
        let total = amounts
            .iter()
            .try_fold(0u64, |acc, a| acc.checked_add(*a))
            .ok_or_else(|| MovementError::InvalidAmount("Batch total overflows".to_string()))?;

        let amount_args: Vec<String> = amounts.iter().map(u64::to_string).collect();
        self.submit(
            "payments",
            "batch_send",
            vec![json!(recipients), json!(amount_args)],
            TxKind::BatchSend,
            total,
            None,
        )
        .await
    }

    /// Payment counters and volumes of `address` (or the loaded account).
    pub async fn payment_stats(&self, address: Option<&str>) -> MovementResult<PaymentStats> {
        let address = self.client.resolve_address(address)?;

        let counts = self
            .client
            .view(self.function("payments", "get_payment_count"), vec![json!(address)])
            .await?;
        let volumes = self
            .client
            .view(self.function("payments", "get_total_volume"), vec![json!(address)])
            .await?;

        let [sent_count, received_count] = pair(&counts)?;
        let [total_sent, total_received] = pair(&volumes)?;

        Ok(PaymentStats {
            sent_count,
            received_count,
            total_sent: format_octas(total_sent),
            total_received: format_octas(total_received),
        })
    }

    /// Whether `address` has a payments resource.
    pub async fn is_payments_initialized(&self, address: Option<&str>) -> MovementResult<bool> {
        let address = self.client.resolve_address(address)?;
        let result = self
            .client
            .view(self.function("payments", "is_initialized"), vec![json!(address)])
            .await?;
        result
            .first()
            .and_then(Value::as_bool)
            .ok_or_else(|| MovementError::InvalidResponse("is_initialized returned no bool".to_string()))
    }

    // ---------------------------------------------------------------
    // Wallet module
    // ---------------------------------------------------------------

    pub async fn initialize_wallet_module(&self) -> MovementResult<String> {
        self.submit("wallet", "initialize_wallet", vec![], TxKind::ModuleInit, 0, None)
            .await
    }

    /// Schedule a payment at `execution_time` (Unix seconds); `interval_secs`
    /// 0 means one-time.
    pub async fn schedule_payment(
        &self,
        recipient: &str,
        amount: &str,
        execution_time: u64,
        interval_secs: u64,
    ) -> MovementResult<String> {
        let recipient = normalize_address(recipient)?;
        let octas = parse_octas(amount)?;

        self.submit(
            "wallet",
            "schedule_payment",
            vec![
                json!(recipient),
                json!(octas.to_string()),
                json!(execution_time.to_string()),
                json!(interval_secs.to_string()),
            ],
            TxKind::ScheduleCreate,
            octas,
            Some(recipient.clone()),
        )
        .await
    }

    // ---------------------------------------------------------------
    // Bucket protocol
    // ---------------------------------------------------------------

    pub async fn initialize_bucket_protocol(&self) -> MovementResult<String> {
        self.submit("bucket_protocol", "init", vec![], TxKind::ModuleInit, 0, None)
            .await
    }

    pub async fn create_bucket(
        &self,
        assets: &[&str],
        weights: &[u64],
        leverage: u8,
    ) -> MovementResult<String> {
        if assets.is_empty() || assets.len() != weights.len() {
            return Err(MovementError::Validation(
                "Each asset needs exactly one weight".to_string(),
            ));
        }
        if weights.iter().try_fold(0u64, |acc, w| acc.checked_add(*w)) != Some(TOTAL_WEIGHT) {
            return Err(MovementError::Validation(format!(
                "Asset weights must sum to exactly {}",
                TOTAL_WEIGHT
            )));
        }
        if !(MIN_LEVERAGE..=MAX_LEVERAGE).contains(&leverage) {
            return Err(MovementError::Validation(format!(
                "Leverage must be between {}x and {}x",
                MIN_LEVERAGE, MAX_LEVERAGE
            )));
        }

        let assets = assets
            .iter()
            .map(|a| normalize_address(a))
            .collect::<MovementResult<Vec<_>>>()?;
        let weights: Vec<String> = weights.iter().map(u64::to_string).collect();

        self.submit(
            "bucket_protocol",
            "create_bucket",
            vec![json!(assets), json!(weights), json!(leverage.to_string())],
            TxKind::BucketCreate,
            0,
            None,
        )
        .await
    }

    pub async fn open_position(&self, bucket_id: u64, is_long: bool, margin: &str) -> MovementResult<String> {
        let octas = parse_octas(margin)?;
        self.submit(
            "bucket_protocol",
            "open_position",
            vec![json!(bucket_id.to_string()), json!(is_long), json!(octas.to_string())],
            TxKind::PositionOpen,
            octas,
            None,
        )
        .await
    }

    pub async fn close_position(&self, position_id: u64) -> MovementResult<String> {
        self.submit(
            "bucket_protocol",
            "close_position",
            vec![json!(position_id.to_string())],
            TxKind::PositionClose,
            0,
            None,
        )
        .await
    }

    /// Locally recorded Move transactions, newest first.
    pub fn transaction_history(&self) -> MovementResult<Vec<TxRecord>> {
        Ok(self.history.list()?)
    }
}

fn pair(values: &[Value]) -> MovementResult<[u64; 2]> {
    match values {
        [a, b, ..] => Ok([value_as_u64(a)?, value_as_u64(b)?]),
        _ => Err(MovementError::InvalidResponse(format!(
            "expected two values, got {}",
            values.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MovementConfig;
    use crate::storage::{LocalStore, MemorySecretStore};

    fn service() -> MovementService {
        let local = Arc::new(LocalStore::in_memory());
        let client = MovementClient::new(
            MovementConfig::default(),
            Arc::new(MemorySecretStore::new()),
            local.clone(),
        )
        .unwrap();
        MovementService::new(
            Arc::new(client),
            TransactionHistory::new(local, "movement_transaction_history", 10),
        )
        .unwrap()
    }

    #[test]
    fn test_function_ids() {
        let service = service();
        assert_eq!(
            service.function("payments", "tap_to_pay"),
            "0x3aa36fb1c8226096d5216f0c5b45bd24b3b37cc55a7e68cdfd2762c5f82e3796::payments::tap_to_pay"
        );
    }

    #[test]
    fn test_pair() {
        assert_eq!(pair(&[json!("3"), json!("4")]).unwrap(), [3, 4]);
        assert!(pair(&[json!("3")]).is_err());
    }

    #[tokio::test]
    async fn test_validation_happens_before_network() {
        let service = service();

        assert!(matches!(
            service.send_payment("0x2", "1", &"x".repeat(201)).await,
            Err(MovementError::Validation(_))
        ));
        assert!(matches!(
            service.batch_send(&["0x2"], &[]).await,
            Err(MovementError::Validation(_))
        ));
        assert!(matches!(
            service.create_bucket(&["0x1", "0x2"], &[60, 30], 5).await,
            Err(MovementError::Validation(_))
        ));
        assert!(matches!(
            service.create_bucket(&["0x1"], &[100], 151).await,
            Err(MovementError::Validation(_))
        ));
        assert!(matches!(
            service.tap_to_pay("0x2", "0").await,
            Err(MovementError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_writes_need_wallet() {
        let service = service();
        assert!(matches!(
            service.close_position(1).await,
            Err(MovementError::WalletNotInitialized)
        ));
    }
}
