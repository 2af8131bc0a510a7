//! Wallet subsystem.
//!
//! # Data Flow
//! ```text
//! Caller (CLI command, keeper):
//!     → service.rs (initialize once, load or create the key)
//!     → storage (encrypted key file, local state file, history)
//!     → state.rs (publish address, balance, progress, error)
//!     → blockchain (RpcClient, TxBuilder) for balance and sends
//!     → contracts façades bound to the loaded signer
//! ```
//!
//! # Design Decisions
//! - One explicit `WalletService` context instead of process-wide singletons
//! - Initialization is single-flight; a failed attempt can be retried
//! - Switching networks rebuilds the client and rebinds the signer's chain id

pub mod service;
pub mod state;

pub use service::{InitOutcome, WalletService};
pub use state::{WalletState, WalletStateManager, UNKNOWN_BALANCE};
