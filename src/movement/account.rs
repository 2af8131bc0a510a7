//! Ed25519 account for the Move network.

use std::fmt;

use alloy::hex;
use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;
use sha3::{Digest, Sha3_256};

use crate::movement::types::{MovementError, MovementResult};

/// Authentication key scheme byte for single Ed25519 keys.
const ED25519_SCHEME: u8 = 0x00;

/// Signing key plus its derived account address.
#[derive(Clone)]
pub struct MoveAccount {
    signing_key: SigningKey,
    address: String,
}

impl MoveAccount {
    /// Fresh random key.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        Self::from_signing_key(SigningKey::from_bytes(&seed))
    }

    /// Load a hex key. Both the 32-byte seed and the 64-byte
    /// seed-plus-public-key layout are accepted.
    pub fn from_private_key(private_key_hex: &str) -> MovementResult<Self> {
        let bytes = hex::decode(private_key_hex.trim())
            .map_err(|e| MovementError::InvalidKey(e.to_string()))?;

        let seed: [u8; 32] = match bytes.len() {
            32 | 64 => bytes[..32]
                .try_into()
                .map_err(|_| MovementError::InvalidKey("bad key length".to_string()))?,
            n => {
                return Err(MovementError::InvalidKey(format!(
                    "expected 32 or 64 bytes, got {}",
                    n
                )))
            }
        };

        Ok(Self::from_signing_key(SigningKey::from_bytes(&seed)))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = derive_address(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            address,
        }
    }

    /// `0x`-prefixed 32-byte address.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode_prefixed(self.signing_key.verifying_key().as_bytes())
    }

    /// Seed as `0x` hex, the form persisted in secure storage.
    pub fn private_key_hex(&self) -> String {
        hex::encode_prefixed(self.signing_key.to_bytes())
    }

    /// Ed25519 signature over `message`, `0x` hex encoded.
    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode_prefixed(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for MoveAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoveAccount")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Address = SHA3-256(public key ‖ scheme byte).
pub fn derive_address(public_key: &[u8]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(public_key);
    hasher.update([ED25519_SCHEME]);
    hex::encode_prefixed(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    #[test]
    fn test_roundtrip_through_hex() {
        let account = MoveAccount::generate();
        let restored = MoveAccount::from_private_key(&account.private_key_hex()).unwrap();
        assert_eq!(restored.address(), account.address());
        assert_eq!(account.address().len(), 66);
        assert!(account.address().starts_with("0x"));
    }

    #[test]
    fn test_accepts_64_byte_secret() {
        let account = MoveAccount::generate();
        let long = format!("{}{}", account.private_key_hex(), &account.public_key_hex()[2..]);
        let restored = MoveAccount::from_private_key(&long).unwrap();
        assert_eq!(restored.address(), account.address());
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(MoveAccount::from_private_key("0x1234").is_err());
        assert!(MoveAccount::from_private_key("not hex").is_err());
    }

    #[test]
    fn test_signature_verifies() {
        let account = MoveAccount::generate();
        let sig_hex = account.sign_hex(b"message");
        let sig_bytes: [u8; 64] = hex::decode(sig_hex).unwrap().try_into().unwrap();
        let signature = Signature::from_bytes(&sig_bytes);
        assert!(account
            .signing_key
            .verifying_key()
            .verify(b"message", &signature)
            .is_ok());
    }

    #[test]
    fn test_address_derivation_is_sha3_of_key_and_scheme() {
        let public_key = [7u8; 32];
        let mut input = public_key.to_vec();
        input.push(0);
        let expected = hex::encode_prefixed(Sha3_256::digest(&input));
        assert_eq!(derive_address(&public_key), expected);
    }

    #[test]
    fn test_debug_hides_key() {
        let account = MoveAccount::generate();
        let debug = format!("{:?}", account);
        assert!(!debug.contains(&account.private_key_hex()[2..]));
    }
}
