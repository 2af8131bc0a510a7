//! REST client for the Move network.
//!
//! # Responsibilities
//! - Load, create, or import the Ed25519 account (`movement_` storage keys)
//! - Read balances and account sequence numbers
//! - Submit entry functions: encode_submission → sign → submit → wait
//! - Call view functions and the testnet faucet

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy::hex;
use arc_swap::ArcSwapOption;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config::MovementConfig;
use crate::movement::account::MoveAccount;
use crate::movement::types::{
    normalize_address, value_as_u64, AccountInfo, ApiErrorBody, EntryFunction, MoveInitOutcome,
    MovementError, MovementResult, SubmittedTransaction, TransactionStatus, ViewRequest,
};
use crate::storage::{
    movement_key, LocalStore, SecretStore, KEY_PRIVATE_KEY, KEY_WALLET_ADDRESS, KEY_WALLET_NAME,
};

const COIN_STORE: &str = "0x1::coin::CoinStore<0x1::aptos_coin::AptosCoin>";
/// Octas minted per faucet request.
pub const FAUCET_AMOUNT: u64 = 100_000_000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Client for an Aptos-compatible REST API.
pub struct MovementClient {
    http: reqwest::Client,
    config: MovementConfig,
    base_url: String,
    secrets: Arc<dyn SecretStore>,
    local: Arc<LocalStore>,
    account: ArcSwapOption<MoveAccount>,
    init_lock: Mutex<()>,
}

impl MovementClient {
    pub fn new(
        config: MovementConfig,
        secrets: Arc<dyn SecretStore>,
        local: Arc<LocalStore>,
    ) -> MovementResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: config.rpc_url.trim_end_matches('/').to_string(),
            config,
            secrets,
            local,
            account: ArcSwapOption::empty(),
            init_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    // ---------------------------------------------------------------
    // Account
    // ---------------------------------------------------------------

    /// Load the stored key or create and persist a new one.
    pub async fn initialize_wallet(&self) -> MovementResult<MoveInitOutcome> {
        let _guard = self.init_lock.lock().await;

        if let Some(account) = self.account.load_full() {
            return Ok(MoveInitOutcome {
                address: account.address().to_string(),
                is_new: false,
            });
        }

        let (account, is_new) = match self.secrets.get(&movement_key(KEY_PRIVATE_KEY))? {
            Some(key) => (MoveAccount::from_private_key(&key)?, false),
            None => {
                let account = MoveAccount::generate();
                self.persist(&account, "Movement Wallet")?;
                (account, true)
            }
        };

        let address = account.address().to_string();
        self.account.store(Some(Arc::new(account)));
        tracing::info!(address = %address, is_new = is_new, "Move wallet initialized");

        Ok(MoveInitOutcome { address, is_new })
    }

    /// Import a hex private key and make it the active account.
    pub async fn import_wallet(&self, private_key: &str) -> MovementResult<String> {
        let _guard = self.init_lock.lock().await;

        let account = MoveAccount::from_private_key(private_key)?;
        self.persist(&account, "Imported Movement Wallet")?;

        let address = account.address().to_string();
        self.account.store(Some(Arc::new(account)));
        tracing::info!(address = %address, "Move wallet imported");
        Ok(address)
    }

    pub fn address(&self) -> Option<String> {
        self.account
            .load()
            .as_ref()
            .map(|a| a.address().to_string())
    }

    fn persist(&self, account: &MoveAccount, name: &str) -> MovementResult<()> {
        self.secrets
            .set(&movement_key(KEY_PRIVATE_KEY), &account.private_key_hex())?;
        self.local
            .set(&movement_key(KEY_WALLET_ADDRESS), &account.address())?;
        self.local.set(&movement_key(KEY_WALLET_NAME), &name)?;
        Ok(())
    }

    fn require_account(&self) -> MovementResult<Arc<MoveAccount>> {
        self.account
            .load_full()
            .ok_or(MovementError::WalletNotInitialized)
    }

    /// `address` if given, else the loaded account's address.
    pub fn resolve_address(&self, address: Option<&str>) -> MovementResult<String> {
        match address {
            Some(a) => normalize_address(a),
            None => self.address().ok_or(MovementError::WalletNotInitialized),
        }
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Native coin balance in octas. Accounts unknown to the chain have 0.
    pub async fn get_balance(&self, address: Option<&str>) -> MovementResult<u64> {
        let address = self.resolve_address(address)?;
        let url = format!(
            "{}/accounts/{}/resource/{}",
            self.base_url, address, COIN_STORE
        );

        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(address = %address, "Account not found, balance is 0");
            return Ok(0);
        }

        let resource: Value = parse_json(response).await?;
        let value = resource
            .pointer("/data/coin/value")
            .ok_or_else(|| MovementError::InvalidResponse("CoinStore without coin.value".to_string()))?;
        value_as_u64(value)
    }

    pub async fn sequence_number(&self, address: &str) -> MovementResult<u64> {
        let response = self
            .http
            .get(format!("{}/accounts/{}", self.base_url, address))
            .send()
            .await?;
        let info: AccountInfo = parse_json(response).await?;
        info.sequence_number
            .parse()
            .map_err(|_| MovementError::InvalidResponse(format!("sequence_number {}", info.sequence_number)))
    }

    /// Call a view function and return its raw result values.
    pub async fn view(
        &self,
        function: impl Into<String>,
        arguments: Vec<Value>,
    ) -> MovementResult<Vec<Value>> {
        let request = ViewRequest {
            function: function.into(),
            type_arguments: Vec::new(),
            arguments,
        };
        let response = self
            .http
            .post(format!("{}/view", self.base_url))
            .json(&request)
            .send()
            .await?;
        parse_json(response).await
    }

    /// Request test coins for `address` (or the loaded account).
    pub async fn fund_from_faucet(&self, address: Option<&str>) -> MovementResult<()> {
        let address = self.resolve_address(address)?;
        let amount = FAUCET_AMOUNT.to_string();
        let response = self
            .http
            .get(format!("{}/mint", self.config.faucet_url.trim_end_matches('/')))
            .query(&[("address", address.as_str()), ("amount", amount.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        tracing::info!(address = %address, amount = FAUCET_AMOUNT, "Funded account from faucet");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Transactions
    // ---------------------------------------------------------------

    /// Sign, submit, and wait for an entry function call. Returns the hash.
    pub async fn submit_entry_function(&self, payload: EntryFunction) -> MovementResult<String> {
        let account = self.require_account()?;
        let function = payload.function.clone();
        let sequence_number = self.sequence_number(account.address()).await?;
        let expiration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            + self.config.expiration_secs;

        let mut body = json!({
            "sender": account.address(),
            "sequence_number": sequence_number.to_string(),
            "max_gas_amount": self.config.max_gas_amount.to_string(),
            "gas_unit_price": self.config.gas_unit_price.to_string(),
            "expiration_timestamp_secs": expiration.to_string(),
            "payload": payload,
        });

        let response = self
            .http
            .post(format!("{}/transactions/encode_submission", self.base_url))
            .json(&body)
            .send()
            .await?;
        let signing_message: String = parse_json(response).await?;
        let message = hex::decode(&signing_message)
            .map_err(|e| MovementError::InvalidResponse(format!("signing message: {}", e)))?;

        body["signature"] = json!({
            "type": "ed25519_signature",
            "public_key": account.public_key_hex(),
            "signature": account.sign_hex(&message),
        });

        let response = self
            .http
            .post(format!("{}/transactions", self.base_url))
            .json(&body)
            .send()
            .await?;
        let submitted: SubmittedTransaction = parse_json(response).await?;

        tracing::info!(
            tx_hash = %submitted.hash,
            function = %function,
            sequence_number = sequence_number,
            "Move transaction submitted"
        );

        self.wait_for_transaction(&submitted.hash).await?;
        Ok(submitted.hash)
    }

    /// Poll until the transaction is committed. A committed failure is an error.
    pub async fn wait_for_transaction(&self, hash: &str) -> MovementResult<()> {
        let timeout = Duration::from_secs(self.config.confirmation_timeout_secs);
        tokio::time::timeout(timeout, self.poll_transaction(hash))
            .await
            .map_err(|_| MovementError::Timeout(hash.to_string()))?
    }

    async fn poll_transaction(&self, hash: &str) -> MovementResult<()> {
        let url = format!("{}/transactions/by_hash/{}", self.base_url, hash);
        let mut ticker = tokio::time::interval(POLL_INTERVAL);

        loop {
            ticker.tick().await;

            let response = self.http.get(&url).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                continue;
            }

            let status: TransactionStatus = parse_json(response).await?;
            if status.kind == "pending_transaction" {
                continue;
            }

            return match status.success {
                Some(true) => {
                    tracing::debug!(tx_hash = %hash, "Move transaction committed");
                    Ok(())
                }
                _ => Err(MovementError::TransactionFailed {
                    hash: hash.to_string(),
                    vm_status: status.vm_status.unwrap_or_else(|| "unknown".to_string()),
                }),
            };
        }
    }
}

impl std::fmt::Debug for MovementClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovementClient")
            .field("rpc_url", &self.base_url)
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> MovementResult<T> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    Ok(response.json().await?)
}

async fn api_error(response: Response) -> MovementError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);
    MovementError::Api { status, message }
}
