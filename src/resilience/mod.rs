//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! RPC call:
//!     → timeouts.rs (enforce per-attempt deadline)
//!     → On failure: retries.rs (check if transient, rotate endpoint, wait)
//!     → last error surfaced to the caller once attempts run out
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Only transient failures are retried
//! - Retry count and delay are fixed by configuration

pub mod retries;
pub mod timeouts;

pub use retries::{retry, AttemptError, Retryable, RetryPolicy};
pub use timeouts::with_timeout;
