//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! Signing keys:
//!     → secure.rs (SecretStore: AES-256-GCM files, or memory)
//!
//! Preferences and history:
//!     → local.rs (JSON key-value file)
//!     → history.rs (capped transaction list stored in the local store)
//! ```
//!
//! # Security Constraints
//! - Secret values never leave `SecretStore` except to build a signer
//! - Encrypted files are written owner-only on Unix
//! - Every write goes to a temp file first and is renamed into place

pub mod history;
pub mod local;
pub mod secure;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use history::{TransactionHistory, TxKind, TxRecord, TxStatus};
pub use local::LocalStore;
pub use secure::{EncryptedFileStore, MemorySecretStore, SecretStore};

/// Secret store key for the EVM signing key.
pub const KEY_PRIVATE_KEY: &str = "private_key";
/// Local store key for the cached wallet address.
pub const KEY_WALLET_ADDRESS: &str = "wallet_address";
/// Local store key for the wallet display name.
pub const KEY_WALLET_NAME: &str = "wallet_name";
/// Local store key for the transaction history list.
pub const KEY_TRANSACTION_HISTORY: &str = "transaction_history";
/// Local store key for the preferred network.
pub const KEY_NETWORK_TYPE: &str = "network_type";
/// Prefix for every key owned by the Move network backend.
pub const MOVEMENT_PREFIX: &str = "movement_";

/// Errors raised by the secret and local stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Keystore password not set (expected in {0})")]
    MissingPassword(String),

    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("Corrupted entry '{key}': {reason}")]
    Corrupted { key: String, reason: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Namespace a key for the Move network backend.
pub fn movement_key(key: &str) -> String {
    format!("{}{}", MOVEMENT_PREFIX, key)
}

/// Keys become file names, so only a safe character set is allowed.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Write `bytes` to `path` through a sibling temp file and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8], owner_only: bool) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if owner_only {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = owner_only;

    let mut file = options.open(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    path.with_file_name(name)
}
