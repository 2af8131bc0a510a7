//! EVM network profiles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which EVM network the wallet talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    #[default]
    Testnet,
    Mainnet,
}

impl NetworkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkKind::Testnet => "testnet",
            NetworkKind::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testnet" => Ok(NetworkKind::Testnet),
            "mainnet" => Ok(NetworkKind::Mainnet),
            other => Err(format!("unknown network '{}' (expected testnet or mainnet)", other)),
        }
    }
}

/// Static description of one EVM network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// Human-readable name.
    pub name: String,

    /// EIP-155 chain ID.
    pub chain_id: u64,

    /// JSON-RPC endpoints in rotation order.
    pub rpc_urls: Vec<String>,

    /// Block explorer base URL.
    pub explorer_url: String,

    /// Native token symbol.
    pub native_symbol: String,
}

impl NetworkProfile {
    pub fn monad_testnet() -> Self {
        Self {
            name: "Monad Testnet".to_string(),
            chain_id: 10143,
            rpc_urls: vec!["https://testnet-rpc.monad.xyz".to_string()],
            explorer_url: "https://monad-testnet.socialscan.io".to_string(),
            native_symbol: "MON".to_string(),
        }
    }

    pub fn monad_mainnet() -> Self {
        Self {
            name: "Monad Mainnet".to_string(),
            chain_id: 10141,
            rpc_urls: vec!["https://rpc.monad.xyz".to_string()],
            explorer_url: "https://monad.socialscan.io".to_string(),
            native_symbol: "MON".to_string(),
        }
    }

    /// Explorer link for a transaction hash.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }
}

/// Snapshot of the network the wallet is currently using.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    pub kind: NetworkKind,
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub explorer_url: String,
}
