//! Cresca wallet service layer.
//!
//! Key storage, a failover JSON-RPC client, transaction building, contract
//! façades, price feeds, and a Move network backend.

// Chain access
pub mod blockchain;
pub mod contracts;
pub mod movement;

// Wallet and data
pub mod prices;
pub mod storage;
pub mod wallet;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::WalletConfig;
pub use lifecycle::Shutdown;
pub use wallet::WalletService;
