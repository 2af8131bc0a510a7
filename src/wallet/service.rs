//! Wallet service context.
//!
//! # Responsibilities
//! - Own the signing key, the RPC client, and the stores for one wallet
//! - Initialize the wallet exactly once even under concurrent callers
//! - Send native transfers and record them in the local history
//! - Switch networks and persist the preference
//! - Hand out contract façades bound to the current signer

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use arc_swap::{ArcSwap, ArcSwapOption};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::blockchain::client::RpcClient;
use crate::blockchain::network::{NetworkInfo, NetworkKind};
use crate::blockchain::transaction::{SentTransaction, TxBuilder};
use crate::blockchain::types::{
    format_ether, parse_address, parse_ether_amount, BlockchainError, BlockchainResult,
};
use crate::blockchain::wallet::Wallet;
use crate::config::WalletConfig;
use crate::contracts::{BucketContract, PaymentsContract, ScheduledPaymentsContract};
use crate::resilience::RetryPolicy;
use crate::storage::{
    EncryptedFileStore, LocalStore, SecretStore, StorageResult, TransactionHistory, TxKind,
    TxRecord, TxStatus, KEY_NETWORK_TYPE, KEY_PRIVATE_KEY, KEY_TRANSACTION_HISTORY,
    KEY_WALLET_ADDRESS, KEY_WALLET_NAME,
};
use crate::wallet::state::WalletStateManager;

/// File name of the local state store inside the data directory.
pub const LOCAL_STORE_FILE: &str = "local.json";

const NEW_WALLET_NAME: &str = "Cresca Wallet";
const IMPORTED_WALLET_NAME: &str = "Imported Wallet";

/// Result of [`WalletService::initialize_wallet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InitOutcome {
    pub address: Address,
    /// A key was generated during this call.
    pub is_new: bool,
}

/// Network selection plus the client talking to it.
struct ActiveNetwork {
    kind: NetworkKind,
    client: RpcClient,
}

/// Parsed addresses of the feature contracts.
#[derive(Debug, Clone, Copy)]
struct ContractAddresses {
    payments: Address,
    calendar_payments: Address,
    bucket_protocol: Address,
}

/// Explicit context object for one wallet.
pub struct WalletService {
    config: Arc<WalletConfig>,
    secrets: Arc<dyn SecretStore>,
    local: Arc<LocalStore>,
    history: TransactionHistory,
    state: WalletStateManager,
    active: ArcSwap<ActiveNetwork>,
    wallet: ArcSwapOption<Wallet>,
    /// Held while a key is loaded, generated, imported, or removed.
    init_lock: Mutex<()>,
    contracts: ContractAddresses,
}

impl WalletService {
    /// Build a service over the given stores.
    ///
    /// The saved network preference, if any, wins over `config.network.active`.
    pub fn new(
        config: Arc<WalletConfig>,
        secrets: Arc<dyn SecretStore>,
        local: Arc<LocalStore>,
    ) -> BlockchainResult<Self> {
        let kind = match local.get::<NetworkKind>(KEY_NETWORK_TYPE) {
            Ok(Some(saved)) => {
                tracing::info!(network = %saved, "Loaded network preference");
                saved
            }
            Ok(None) => config.network.active,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable network preference");
                config.network.active
            }
        };

        let client = build_client(&config, kind)?;
        let contracts = ContractAddresses {
            payments: parse_address(&config.contracts.payments)?,
            calendar_payments: parse_address(&config.contracts.calendar_payments)?,
            bucket_protocol: parse_address(&config.contracts.bucket_protocol)?,
        };
        let history = TransactionHistory::new(
            local.clone(),
            KEY_TRANSACTION_HISTORY,
            config.transactions.history_limit,
        );

        Ok(Self {
            config,
            secrets,
            local,
            history,
            state: WalletStateManager::new(),
            active: ArcSwap::from_pointee(ActiveNetwork { kind, client }),
            wallet: ArcSwapOption::empty(),
            init_lock: Mutex::new(()),
            contracts,
        })
    }

    /// Build a service with the encrypted file store and local store under
    /// `config.storage.data_dir`.
    pub fn open(config: Arc<WalletConfig>) -> BlockchainResult<Self> {
        let data_dir = Path::new(&config.storage.data_dir);
        let secrets = EncryptedFileStore::from_env(data_dir.join("keys"), &config.storage.password_env)?;
        let local = LocalStore::open(data_dir.join(LOCAL_STORE_FILE))?;
        Self::new(config, Arc::new(secrets), Arc::new(local))
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn state(&self) -> &WalletStateManager {
        &self.state
    }

    /// Local key-value store shared with other backends.
    pub fn local_store(&self) -> Arc<LocalStore> {
        self.local.clone()
    }

    /// Secret store shared with other backends.
    pub fn secret_store(&self) -> Arc<dyn SecretStore> {
        self.secrets.clone()
    }

    /// Client for the active network.
    pub fn client(&self) -> RpcClient {
        self.active.load().client.clone()
    }

    // ---------------------------------------------------------------
    // Wallet lifecycle
    // ---------------------------------------------------------------

    /// Load the stored key, or generate and persist a new one.
    ///
    /// Runs once: concurrent callers wait for the first caller and see its
    /// outcome (`is_new == false`). A failure leaves nothing behind, so a
    /// later call tries again.
    pub async fn initialize_wallet(&self) -> BlockchainResult<InitOutcome> {
        if let Some(wallet) = self.wallet.load_full() {
            return Ok(InitOutcome {
                address: wallet.address(),
                is_new: false,
            });
        }

        let _guard = self.init_lock.lock().await;

        if let Some(wallet) = self.wallet.load_full() {
            return Ok(InitOutcome {
                address: wallet.address(),
                is_new: false,
            });
        }

        self.state.set_initializing(true);
        match self.load_or_create() {
            Ok((wallet, is_new)) => {
                let address = wallet.address();
                self.install_wallet(wallet);
                tracing::info!(address = %address, is_new = is_new, "Wallet initialized");
                Ok(InitOutcome { address, is_new })
            }
            Err(e) => {
                tracing::error!(error = %e, "Wallet initialization failed");
                self.state.set_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Generate a new key, replacing any stored one.
    pub async fn create_new_wallet(&self) -> BlockchainResult<InitOutcome> {
        let _guard = self.init_lock.lock().await;

        let wallet = Wallet::random(self.chain_id());
        self.persist_wallet(&wallet, NEW_WALLET_NAME)?;
        let address = wallet.address();
        self.install_wallet(wallet);

        Ok(InitOutcome {
            address,
            is_new: true,
        })
    }

    /// Import a hex private key, replacing any stored one.
    pub async fn import_wallet(&self, private_key: &str) -> BlockchainResult<Address> {
        let _guard = self.init_lock.lock().await;

        let wallet = Wallet::from_private_key(private_key, self.chain_id())?;
        self.persist_wallet(&wallet, IMPORTED_WALLET_NAME)?;
        let address = wallet.address();
        self.install_wallet(wallet);

        Ok(address)
    }

    /// Forget the key, the cached address, and the history.
    pub async fn reset_wallet(&self) -> BlockchainResult<()> {
        let _guard = self.init_lock.lock().await;

        self.secrets.delete(KEY_PRIVATE_KEY)?;
        self.local.remove(KEY_WALLET_ADDRESS)?;
        self.local.remove(KEY_WALLET_NAME)?;
        self.history.clear()?;
        self.wallet.store(None);
        self.state.reset();

        tracing::info!("Wallet reset");
        Ok(())
    }

    /// Address of the loaded wallet, falling back to the published state.
    pub fn wallet_address(&self) -> Option<Address> {
        self.wallet
            .load()
            .as_ref()
            .map(|w| w.address())
            .or_else(|| self.state.address())
    }

    pub fn is_wallet_initialized(&self) -> bool {
        self.wallet.load().is_some()
    }

    fn load_or_create(&self) -> BlockchainResult<(Wallet, bool)> {
        match self.secrets.get(KEY_PRIVATE_KEY)? {
            Some(key) => {
                tracing::debug!("Loading wallet from secure storage");
                let wallet = Wallet::from_private_key(&key, self.chain_id())?;
                self.local
                    .set(KEY_WALLET_ADDRESS, &wallet.address().to_checksum(None))?;
                Ok((wallet, false))
            }
            None => {
                tracing::info!("No stored wallet, generating a new one");
                let wallet = Wallet::random(self.chain_id());
                self.persist_wallet(&wallet, NEW_WALLET_NAME)?;
                Ok((wallet, true))
            }
        }
    }

    fn persist_wallet(&self, wallet: &Wallet, name: &str) -> StorageResult<()> {
        self.secrets.set(KEY_PRIVATE_KEY, &wallet.private_key_hex())?;
        self.local
            .set(KEY_WALLET_ADDRESS, &wallet.address().to_checksum(None))?;
        self.local.set(KEY_WALLET_NAME, &name)?;
        Ok(())
    }

    /// Publish a wallet and start the background checks.
    fn install_wallet(&self, wallet: Wallet) {
        let address = wallet.address();
        self.wallet.store(Some(Arc::new(wallet)));
        self.state.set_wallet_address(address);
        self.spawn_background_checks(address);
    }

    /// Chain verification and a first balance load, without blocking the caller.
    fn spawn_background_checks(&self, address: Address) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let client = self.client();
        let state = self.state.clone();
        let verify_timeout = Duration::from_millis(self.config.rpc.verify_timeout_ms);

        runtime.spawn(async move {
            match tokio::time::timeout(verify_timeout, client.verify_chain_id()).await {
                Ok(Ok(())) => tracing::debug!(chain_id = client.profile().chain_id, "Chain verified"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Network check failed"),
                Err(_) => tracing::warn!("Network check timed out"),
            }

            match client.get_balance(address).await {
                Ok(balance) => state.set_balance(format_ether(balance)),
                Err(e) => tracing::warn!(error = %e, "Background balance load failed"),
            }
        });
    }

    fn require_wallet(&self) -> BlockchainResult<Arc<Wallet>> {
        self.wallet
            .load_full()
            .ok_or(BlockchainError::WalletNotInitialized)
    }

    // ---------------------------------------------------------------
    // Balance and transfers
    // ---------------------------------------------------------------

    /// Native balance of the wallet, initializing it first if needed.
    pub async fn get_balance(&self) -> BlockchainResult<U256> {
        let address = match self.wallet.load_full() {
            Some(wallet) => wallet.address(),
            None => self.initialize_wallet().await?.address,
        };
        self.client().get_balance(address).await
    }

    /// Fetch the balance and publish it. On failure the last known balance
    /// stays in the state.
    pub async fn refresh_balance(&self) -> BlockchainResult<String> {
        let balance = format_ether(self.get_balance().await?);
        self.state.set_balance(balance.clone());
        Ok(balance)
    }

    /// Send `amount` (decimal, native units) to `to`.
    pub async fn send_native(&self, to: &str, amount: &str) -> BlockchainResult<SentTransaction> {
        let builder = self.tx_builder()?;
        let recipient = parse_address(to)?;
        let value = parse_ether_amount(amount)?;

        tracing::info!(to = %recipient, amount = %format_ether(value), "Sending native transfer");

        let sent = builder
            .send(recipient, value, Bytes::new(), TxKind::Send)
            .await?;

        let record = TxRecord::new(
            sent.hash.to_string(),
            TxKind::Send,
            format_ether(value),
            Some(recipient.to_checksum(None)),
            TxStatus::Confirmed,
        );
        if let Err(e) = self.history.record(record) {
            tracing::warn!(tx_hash = %sent.hash, error = %e, "Failed to record transaction history");
        }

        if let Err(e) = self.refresh_balance().await {
            tracing::debug!(error = %e, "Balance refresh after send failed");
        }

        Ok(sent)
    }

    /// Locally recorded transactions, newest first.
    pub fn transaction_history(&self) -> BlockchainResult<Vec<TxRecord>> {
        Ok(self.history.list()?)
    }

    /// Transaction builder bound to the current wallet and network.
    pub fn tx_builder(&self) -> BlockchainResult<TxBuilder> {
        let wallet = self.require_wallet()?;
        Ok(TxBuilder::new(
            self.client(),
            (*wallet).clone(),
            self.config.transactions.clone(),
        ))
    }

    // ---------------------------------------------------------------
    // Networks
    // ---------------------------------------------------------------

    pub fn current_network(&self) -> NetworkKind {
        self.active.load().kind
    }

    pub fn network_info(&self) -> NetworkInfo {
        let active = self.active.load();
        let profile = active.client.profile();
        NetworkInfo {
            kind: active.kind,
            name: profile.name.clone(),
            chain_id: profile.chain_id,
            rpc_url: active.client.current_url().to_string(),
            explorer_url: profile.explorer_url.clone(),
        }
    }

    /// Switch to another network, persist the choice, and rebind the wallet.
    pub async fn switch_network(&self, kind: NetworkKind) -> BlockchainResult<()> {
        let _guard = self.init_lock.lock().await;

        if self.current_network() == kind {
            tracing::debug!(network = %kind, "Already on network");
            return Ok(());
        }

        let client = build_client(&self.config, kind)?;
        self.local.set(KEY_NETWORK_TYPE, &kind)?;

        let chain_id = client.profile().chain_id;
        self.active.store(Arc::new(ActiveNetwork { kind, client }));
        if let Some(wallet) = self.wallet.load_full() {
            let address = wallet.address();
            self.wallet.store(Some(Arc::new(wallet.with_chain_id(chain_id))));
            self.spawn_background_checks(address);
        }

        tracing::info!(network = %kind, chain_id = chain_id, "Network switched");
        Ok(())
    }

    fn chain_id(&self) -> u64 {
        self.active.load().client.profile().chain_id
    }

    // ---------------------------------------------------------------
    // Contract façades
    // ---------------------------------------------------------------

    pub fn payments(&self) -> BlockchainResult<PaymentsContract> {
        Ok(PaymentsContract::new(
            self.tx_builder()?,
            self.contracts.payments,
            self.history.clone(),
        ))
    }

    pub fn scheduled_payments(&self) -> BlockchainResult<ScheduledPaymentsContract> {
        Ok(ScheduledPaymentsContract::new(
            self.tx_builder()?,
            self.contracts.calendar_payments,
            self.history.clone(),
        ))
    }

    pub fn buckets(&self) -> BlockchainResult<BucketContract> {
        Ok(BucketContract::new(
            self.tx_builder()?,
            self.contracts.bucket_protocol,
            self.history.clone(),
        ))
    }
}

fn build_client(config: &WalletConfig, kind: NetworkKind) -> BlockchainResult<RpcClient> {
    RpcClient::new(
        config.network.profile(kind).clone(),
        RetryPolicy::from(&config.rpc),
    )
}

impl std::fmt::Debug for WalletService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletService")
            .field("network", &self.current_network())
            .field("address", &self.wallet_address())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySecretStore;

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn offline_config() -> Arc<WalletConfig> {
        let mut config = WalletConfig::default();
        config.network.testnet.rpc_urls = vec!["http://127.0.0.1:1".to_string()];
        config.network.mainnet.rpc_urls = vec!["http://127.0.0.1:2".to_string()];
        config.rpc.max_retries = 0;
        config.rpc.timeout_ms = 200;
        config.rpc.verify_timeout_ms = 200;
        Arc::new(config)
    }

    fn service() -> (WalletService, Arc<MemorySecretStore>, Arc<LocalStore>) {
        let secrets = Arc::new(MemorySecretStore::new());
        let local = Arc::new(LocalStore::in_memory());
        let service = WalletService::new(offline_config(), secrets.clone(), local.clone()).unwrap();
        (service, secrets, local)
    }

    #[tokio::test]
    async fn test_first_init_generates_and_persists() {
        let (service, secrets, local) = service();
        assert!(!service.is_wallet_initialized());

        let outcome = service.initialize_wallet().await.unwrap();
        assert!(outcome.is_new);
        assert!(service.state().is_ready());
        assert!(secrets.get(KEY_PRIVATE_KEY).unwrap().is_some());
        assert_eq!(
            local.get::<String>(KEY_WALLET_ADDRESS).unwrap(),
            Some(outcome.address.to_checksum(None))
        );

        let again = service.initialize_wallet().await.unwrap();
        assert_eq!(again.address, outcome.address);
        assert!(!again.is_new);
    }

    #[tokio::test]
    async fn test_stored_key_is_loaded() {
        let (service, secrets, _) = service();
        secrets.set(KEY_PRIVATE_KEY, TEST_PRIVATE_KEY).unwrap();

        let outcome = service.initialize_wallet().await.unwrap();
        assert!(!outcome.is_new);
        assert_eq!(
            outcome.address.to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[tokio::test]
    async fn test_corrupt_key_fails_and_can_retry() {
        let (service, secrets, _) = service();
        secrets.set(KEY_PRIVATE_KEY, "not-a-key").unwrap();

        assert!(service.initialize_wallet().await.is_err());
        assert!(!service.is_wallet_initialized());
        assert!(service.state().snapshot().error.is_some());
        assert!(!service.state().snapshot().is_initializing);

        secrets.set(KEY_PRIVATE_KEY, TEST_PRIVATE_KEY).unwrap();
        assert!(service.initialize_wallet().await.is_ok());
    }

    #[tokio::test]
    async fn test_import_and_reset() {
        let (service, secrets, local) = service();
        let address = service
            .import_wallet(&format!("0x{}", TEST_PRIVATE_KEY))
            .await
            .unwrap();
        assert_eq!(service.wallet_address(), Some(address));
        assert_eq!(
            local.get::<String>(KEY_WALLET_NAME).unwrap().as_deref(),
            Some(IMPORTED_WALLET_NAME)
        );

        service.reset_wallet().await.unwrap();
        assert!(!service.is_wallet_initialized());
        assert_eq!(service.wallet_address(), None);
        assert_eq!(secrets.get(KEY_PRIVATE_KEY).unwrap(), None);
        assert!(!local.contains(KEY_WALLET_ADDRESS));
    }

    #[tokio::test]
    async fn test_create_new_wallet_replaces_key() {
        let (service, _, _) = service();
        let imported = service.import_wallet(TEST_PRIVATE_KEY).await.unwrap();
        let created = service.create_new_wallet().await.unwrap();
        assert!(created.is_new);
        assert_ne!(created.address, imported);
    }

    #[tokio::test]
    async fn test_facades_require_wallet() {
        let (service, _, _) = service();
        assert!(matches!(
            service.payments(),
            Err(BlockchainError::WalletNotInitialized)
        ));
        assert!(matches!(
            service.send_native("0x0000000000000000000000000000000000000001", "1").await,
            Err(BlockchainError::WalletNotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_send_validates_before_rpc() {
        let (service, _, _) = service();
        service.import_wallet(TEST_PRIVATE_KEY).await.unwrap();

        assert!(matches!(
            service.send_native("0x1234", "1").await,
            Err(BlockchainError::InvalidAddress(_))
        ));
        assert!(matches!(
            service
                .send_native("0x0000000000000000000000000000000000000001", "0")
                .await,
            Err(BlockchainError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_switch_network_persists_and_rebinds() {
        let (service, _, local) = service();
        service.import_wallet(TEST_PRIVATE_KEY).await.unwrap();

        service.switch_network(NetworkKind::Mainnet).await.unwrap();
        assert_eq!(service.current_network(), NetworkKind::Mainnet);
        assert_eq!(service.network_info().chain_id, 10141);
        assert_eq!(service.network_info().rpc_url, "http://127.0.0.1:2");
        assert_eq!(
            local.get::<NetworkKind>(KEY_NETWORK_TYPE).unwrap(),
            Some(NetworkKind::Mainnet)
        );
        assert_eq!(service.tx_builder().unwrap().address(), service.wallet_address().unwrap());

        let reopened = WalletService::new(offline_config(), Arc::new(MemorySecretStore::new()), local)
            .unwrap();
        assert_eq!(reopened.current_network(), NetworkKind::Mainnet);
    }
}
