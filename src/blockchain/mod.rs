//! EVM blockchain subsystem.
//!
//! # Data Flow
//! ```text
//! Secret store (private key)
//!     → wallet.rs (key loading, signing)
//!     → client.rs (RPC calls with timeouts, retries, endpoint rotation)
//!     → transaction.rs (estimate, build, sign, broadcast, confirm)
//! ```
//!
//! # Security Constraints
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - Balance and address checks run before anything is signed

pub mod client;
pub mod network;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::RpcClient;
pub use network::{NetworkInfo, NetworkKind, NetworkProfile};
pub use transaction::{Confirmation, SentTransaction, TxBuilder};
pub use types::{
    format_amount, format_ether, parse_address, parse_amount, parse_ether_amount,
    BlockchainError, BlockchainResult, ChainId, ConfirmationStatus,
};
pub use wallet::Wallet;
