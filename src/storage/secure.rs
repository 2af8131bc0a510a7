//! Secure storage for signing keys.
//!
//! # Responsibilities
//! - Store secrets encrypted at rest (AES-256-GCM, Argon2id-derived key)
//! - Provide an in-memory store for tests and ephemeral sessions
//!
//! File layout: `salt (16) || nonce (12) || ciphertext+tag`.

use std::fmt;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use dashmap::DashMap;

use crate::storage::{validate_key, write_atomic, StorageError, StorageResult};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const FILE_EXTENSION: &str = "enc";

/// Key-value store for secret material.
pub trait SecretStore: Send + Sync {
    /// Read a secret, `None` when absent.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Create or replace a secret.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a secret; deleting a missing key is not an error.
    fn delete(&self, key: &str) -> StorageResult<()>;
}

/// Secrets encrypted on disk, one file per key.
pub struct EncryptedFileStore {
    dir: PathBuf,
    password: String,
}

impl EncryptedFileStore {
    /// Open a store rooted at `dir` with an explicit password.
    pub fn new(dir: impl Into<PathBuf>, password: impl Into<String>) -> StorageResult<Self> {
        let password = password.into();
        if password.is_empty() {
            return Err(StorageError::MissingPassword("password argument".to_string()));
        }
        Ok(Self {
            dir: dir.into(),
            password,
        })
    }

    /// Open a store whose password is read from the environment variable `var`.
    pub fn from_env(dir: impl Into<PathBuf>, var: &str) -> StorageResult<Self> {
        let password = std::env::var(var).unwrap_or_default();
        if password.is_empty() {
            return Err(StorageError::MissingPassword(var.to_string()));
        }
        Self::new(dir, password)
    }

    /// Directory holding the encrypted files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.{}", key, FILE_EXTENSION)))
    }
}

impl SecretStore for EncryptedFileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        let blob = match std::fs::read(&path) {
            Ok(blob) => blob,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let plaintext = decrypt(&blob, &self.password).map_err(|reason| StorageError::Corrupted {
            key: key.to_string(),
            reason,
        })?;

        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|_| StorageError::Corrupted {
                key: key.to_string(),
                reason: "secret is not valid UTF-8".to_string(),
            })
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let blob = encrypt(value.as_bytes(), &self.password)?;
        write_atomic(&path, &blob, true)?;
        tracing::debug!(key = key, "Secret stored");
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedFileStore")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

/// Process-local secret store.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: DashMap<String, String>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

impl fmt::Debug for MemorySecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySecretStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Argon2id with m=19456 KiB, t=2, p=1.
fn derive_key(password: &str, salt: &[u8]) -> StorageResult<[u8; 32]> {
    let params = Params::new(19_456, 2, 1, Some(32))
        .map_err(|e| StorageError::Crypto(format!("argon2 params: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| StorageError::Crypto(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

fn encrypt(plaintext: &[u8], password: &str) -> StorageResult<Vec<u8>> {
    let salt: [u8; SALT_LEN] = rand::random();
    let nonce_bytes: [u8; NONCE_LEN] = rand::random();

    let key_bytes = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| StorageError::Crypto(format!("encryption failed: {}", e)))?;

    let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

fn decrypt(blob: &[u8], password: &str) -> Result<Vec<u8>, String> {
    if blob.len() < SALT_LEN + NONCE_LEN {
        return Err(format!(
            "blob too short ({} bytes, need at least {})",
            blob.len(),
            SALT_LEN + NONCE_LEN
        ));
    }

    let (salt, rest) = blob.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key_bytes = derive_key(password, salt).map_err(|e| e.to_string())?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| "decryption failed (wrong password or tampered data)".to_string())
}
