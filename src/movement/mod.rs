//! Move network backend.
//!
//! # Data Flow
//! ```text
//! MovementService call (service.rs):
//!     → validate, convert coins to octas, normalize addresses
//!     → MovementClient (client.rs): sequence number → encode_submission
//!     → MoveAccount (account.rs) Ed25519 signature
//!     → POST /transactions → poll /transactions/by_hash
//!     → record in the movement_ transaction history
//! ```
//!
//! # Design Decisions
//! - Secondary backend; the EVM wallet is the primary one
//! - Keys live in the same secure store under `movement_` prefixed names
//! - Scheduled payment queries, execution and cancellation are not offered

pub mod account;
pub mod client;
pub mod service;
pub mod types;

pub use account::MoveAccount;
pub use client::MovementClient;
pub use service::MovementService;
pub use types::{
    format_octas, parse_octas, EntryFunction, MoveInitOutcome, MovementError, MovementResult,
    PaymentStats,
};
