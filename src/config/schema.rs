//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the wallet.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::blockchain::network::{NetworkKind, NetworkProfile};

/// Root configuration for the wallet service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// EVM network profiles and the active selection.
    pub network: NetworkConfig,

    /// RPC retry and timeout settings.
    pub rpc: RpcConfig,

    /// Transaction building and confirmation settings.
    pub transactions: TransactionConfig,

    /// Deployed contract addresses.
    pub contracts: ContractsConfig,

    /// Secure and local storage locations.
    pub storage: StorageConfig,

    /// Price API endpoints and cache settings.
    pub prices: PriceConfig,

    /// Move-based network settings.
    pub movement: MovementConfig,

    /// Scheduled payment keeper settings.
    pub keeper: KeeperConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Network selection plus one profile per network kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network used when no preference has been saved yet.
    pub active: NetworkKind,

    /// Test network profile.
    pub testnet: NetworkProfile,

    /// Main network profile.
    pub mainnet: NetworkProfile,
}

impl NetworkConfig {
    /// Profile for the given network kind.
    pub fn profile(&self, kind: NetworkKind) -> &NetworkProfile {
        match kind {
            NetworkKind::Testnet => &self.testnet,
            NetworkKind::Mainnet => &self.mainnet,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            active: NetworkKind::Testnet,
            testnet: NetworkProfile::monad_testnet(),
            mainnet: NetworkProfile::monad_mainnet(),
        }
    }
}

/// RPC call settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,

    /// Retries after the first attempt (total attempts = max_retries + 1).
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,

    /// Additional delay per attempt in milliseconds.
    pub delay_step_ms: u64,

    /// Timeout for the background chain verification in milliseconds.
    pub verify_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 8_000,
            max_retries: 3,
            base_delay_ms: 1_000,
            delay_step_ms: 500,
            verify_timeout_ms: 5_000,
        }
    }
}

/// Transaction settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Extra gas added on top of the estimate, in percent.
    pub gas_buffer_percent: u64,

    /// Number of block confirmations to wait for.
    pub confirmations: u32,

    /// Maximum time to wait for confirmations in seconds.
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,

    /// Maximum number of entries kept in the local transaction history.
    pub history_limit: usize,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            gas_buffer_percent: 25,
            confirmations: 1,
            confirmation_timeout_secs: 120,
            poll_interval_ms: 1_000,
            max_gas_price_gwei: 500,
            history_limit: 100,
        }
    }
}

/// Addresses of the deployed feature contracts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContractsConfig {
    /// Scheduled (calendar) payments contract.
    pub calendar_payments: String,

    /// Instant payments contract.
    pub payments: String,

    /// Leveraged bucket protocol contract.
    pub bucket_protocol: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            calendar_payments: "0x2eA1b3CA34eaFC5aB9762c962e68E7Ba490674F2".to_string(),
            payments: "0xE058f9da1354e12AB45322215784cf55a129C5bC".to_string(),
            bucket_protocol: "0xA3036Ec7b6F27C6A1cB54FC3e60C39aEB523f2d5".to_string(),
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the encrypted key files and the local state file.
    pub data_dir: String,

    /// Environment variable holding the keystore password.
    pub password_env: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: ".cresca".to_string(),
            password_env: "CRESCA_KEYSTORE_PASSWORD".to_string(),
        }
    }
}

/// Price API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PriceConfig {
    /// CoinGecko API base URL.
    pub coingecko_url: String,

    /// Binance API base URL.
    pub binance_url: String,

    /// Pyth Hermes base URL.
    pub hermes_url: String,

    /// Price cache lifetime in seconds.
    pub cache_ttl_secs: u64,

    /// Pyth cache lifetime in seconds.
    pub pyth_cache_ttl_secs: u64,

    /// Age after which a Pyth price is considered stale, in seconds.
    pub pyth_stale_after_secs: u64,

    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Pyth feed ids by symbol.
    pub pyth_feeds: BTreeMap<String, String>,
}

impl Default for PriceConfig {
    fn default() -> Self {
        let pyth_feeds = [
            ("BTC", "0xe62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43"),
            ("ETH", "0xff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace"),
            ("SOL", "0xef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d"),
            ("MOVE", "0x8963217838ab4cf5cadc172203c1f0b763fbaa45f346d8ee50ba994bbcac3026"),
            ("USDC", "0xeaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a"),
            ("USDT", "0x2b89b9dc8fdf9f34709a5b106b472f0f39bb6ca9ce04b0fd7f2e971688e2e53b"),
        ]
        .into_iter()
        .map(|(symbol, id)| (symbol.to_string(), id.to_string()))
        .collect();

        Self {
            coingecko_url: "https://api.coingecko.com".to_string(),
            binance_url: "https://api.binance.com".to_string(),
            hermes_url: "https://hermes.pyth.network".to_string(),
            cache_ttl_secs: 30,
            pyth_cache_ttl_secs: 10,
            pyth_stale_after_secs: 60,
            request_timeout_secs: 10,
            pyth_feeds,
        }
    }
}

/// Move-based network settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MovementConfig {
    /// REST API base URL (including the `/v1` suffix).
    pub rpc_url: String,

    /// Faucet base URL.
    pub faucet_url: String,

    /// Chain ID.
    pub chain_id: u8,

    /// Address of the module publisher.
    pub contract_address: String,

    /// Maximum gas units per transaction.
    pub max_gas_amount: u64,

    /// Gas unit price in octas.
    pub gas_unit_price: u64,

    /// Transaction expiration window in seconds.
    pub expiration_secs: u64,

    /// Maximum time to wait for a committed transaction in seconds.
    pub confirmation_timeout_secs: u64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://testnet.movementnetwork.xyz/v1".to_string(),
            faucet_url: "https://faucet.testnet.movementnetwork.xyz".to_string(),
            chain_id: 250,
            contract_address:
                "0x3aa36fb1c8226096d5216f0c5b45bd24b3b37cc55a7e68cdfd2762c5f82e3796".to_string(),
            max_gas_amount: 200_000,
            gas_unit_price: 100,
            expiration_secs: 600,
            confirmation_timeout_secs: 60,
        }
    }
}

/// Scheduled payment keeper settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeeperConfig {
    /// Polling interval in seconds.
    pub interval_secs: u64,

    /// Payers whose schedules are watched. The wallet's own address is
    /// always included.
    pub payers: Vec<String>,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            payers: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
