//! Observable wallet state.
//!
//! # Responsibilities
//! - Hold the wallet snapshot shown to users (address, balance, progress, error)
//! - Publish every change to subscribers through a watch channel

use std::sync::Arc;

use alloy::primitives::Address;
use serde::Serialize;
use tokio::sync::watch;

/// Balance shown before the first successful lookup.
pub const UNKNOWN_BALANCE: &str = "0.000";

/// Snapshot of the wallet as seen by the rest of the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletState {
    pub address: Option<Address>,
    /// Native balance formatted in ether units.
    pub balance: String,
    pub is_initialized: bool,
    pub is_initializing: bool,
    pub error: Option<String>,
}

impl Default for WalletState {
    fn default() -> Self {
        Self {
            address: None,
            balance: UNKNOWN_BALANCE.to_string(),
            is_initialized: false,
            is_initializing: false,
            error: None,
        }
    }
}

/// Shared owner of the current [`WalletState`].
///
/// Clones share the same channel.
#[derive(Debug, Clone)]
pub struct WalletStateManager {
    tx: Arc<watch::Sender<WalletState>>,
}

impl WalletStateManager {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(WalletState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Current state.
    pub fn snapshot(&self) -> WalletState {
        self.tx.borrow().clone()
    }

    /// Receiver that sees every later update.
    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.tx.subscribe()
    }

    fn update(&self, apply: impl FnOnce(&mut WalletState)) {
        self.tx.send_modify(apply);
        tracing::debug!(state = ?*self.tx.borrow(), "Wallet state updated");
    }

    pub fn set_wallet_address(&self, address: Address) {
        self.update(|s| {
            s.address = Some(address);
            s.is_initialized = true;
            s.is_initializing = false;
            s.error = None;
        });
    }

    pub fn set_balance(&self, balance: impl Into<String>) {
        let balance = balance.into();
        self.update(|s| s.balance = balance);
    }

    pub fn set_initializing(&self, initializing: bool) {
        self.update(|s| s.is_initializing = initializing);
    }

    /// Record an error; also ends any initialization in progress.
    pub fn set_error(&self, error: Option<String>) {
        self.update(|s| {
            s.error = error;
            s.is_initializing = false;
        });
    }

    pub fn reset(&self) {
        self.update(|s| *s = WalletState::default());
    }

    /// Initialized, has an address, and no initialization in flight.
    pub fn is_ready(&self) -> bool {
        let state = self.tx.borrow();
        state.is_initialized && state.address.is_some() && !state.is_initializing
    }

    pub fn address(&self) -> Option<Address> {
        self.tx.borrow().address
    }

    pub fn balance(&self) -> String {
        self.tx.borrow().balance.clone()
    }
}

impl Default for WalletStateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let manager = WalletStateManager::new();
        assert!(!manager.is_ready());
        assert_eq!(manager.balance(), UNKNOWN_BALANCE);

        manager.set_initializing(true);
        assert!(!manager.is_ready());

        manager.set_wallet_address(Address::repeat_byte(0x11));
        assert!(manager.is_ready());
        assert_eq!(manager.address(), Some(Address::repeat_byte(0x11)));

        manager.set_balance("1.5");
        assert_eq!(manager.snapshot().balance, "1.5");

        manager.reset();
        assert_eq!(manager.snapshot(), WalletState::default());
    }

    #[test]
    fn test_error_ends_initialization() {
        let manager = WalletStateManager::new();
        manager.set_initializing(true);
        manager.set_error(Some("boom".to_string()));

        let state = manager.snapshot();
        assert!(!state.is_initializing);
        assert_eq!(state.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let manager = WalletStateManager::new();
        let mut rx = manager.subscribe();

        manager.clone().set_balance("2.0");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().balance, "2.0");
    }
}
