//! Key derivation and wrapping for the client pipeline.
//!
//! `master_key` is derived once per account from the password and email and
//! never leaves the device or touches the wire. Every file gets a fresh
//! `file_key`/`base_nonce` pair; only the `file_key`, wrapped under
//! `master_key`, is ever persisted (inside the manifest).

use crate::client::{ClientError, Result};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use xsalsa20poly1305::aead::{Aead, KeyInit};
use xsalsa20poly1305::{Key, Nonce, XSalsa20Poly1305};

pub const PBKDF2_ROUNDS: u32 = 30_000;
pub const MASTER_KEY_LEN: usize = 32;
pub const FILE_KEY_LEN: usize = 32;
pub const BASE_NONCE_LEN: usize = 16;
pub const WRAP_NONCE_LEN: usize = 24;

/// The account-wide secret every file key is wrapped under. Bound to
/// email+password; changing either invalidates every existing wrap.
#[derive(Clone)]
pub struct MasterKey(pub [u8; MASTER_KEY_LEN]);

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MasterKey").field(&"<redacted>").finish()
    }
}

impl MasterKey {
    /// `PBKDF2-HMAC-SHA256(password, lower(email), 30000, 32)`.
    #[must_use]
    pub fn derive(password: &str, email: &str) -> Self {
        let salt = email.to_lowercase();
        let mut out = [0u8; MASTER_KEY_LEN];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut out);
        Self(out)
    }
}

/// A fresh per-file secret. Chunk nonces are derived from `base_nonce` plus
/// the chunk index, never generated independently per chunk.
pub struct FileSecret {
    pub file_key: [u8; FILE_KEY_LEN],
    pub base_nonce: [u8; BASE_NONCE_LEN],
}

impl FileSecret {
    #[must_use]
    pub fn generate() -> Self {
        let mut file_key = [0u8; FILE_KEY_LEN];
        let mut base_nonce = [0u8; BASE_NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut file_key);
        rand::thread_rng().fill_bytes(&mut base_nonce);
        Self { file_key, base_nonce }
    }

    /// Wraps `file_key` under `master_key` with a fresh 24-byte nonce.
    /// Returns `(wrap_nonce, wrapped_file_key)`, both destined for the manifest.
    ///
    /// # Errors
    /// Returns an error if the underlying AEAD seal fails.
    pub fn wrap(&self, master_key: &MasterKey) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut wrap_nonce = vec![0u8; WRAP_NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut wrap_nonce);
        let cipher = XSalsa20Poly1305::new(Key::from_slice(&master_key.0));
        let wrapped = cipher
            .encrypt(Nonce::from_slice(&wrap_nonce), self.file_key.as_slice())
            .map_err(|e| ClientError::Crypto(format!("file key wrap failed: {e}")))?;
        Ok((wrap_nonce, wrapped))
    }

    /// Recovers a wrapped `file_key`, given the manifest's stored nonce.
    ///
    /// # Errors
    /// Returns an error if the AEAD tag doesn't verify or the plaintext has
    /// the wrong length.
    pub fn unwrap_file_key(master_key: &MasterKey, wrap_nonce: &[u8], wrapped_file_key: &[u8]) -> Result<[u8; FILE_KEY_LEN]> {
        let cipher = XSalsa20Poly1305::new(Key::from_slice(&master_key.0));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(wrap_nonce), wrapped_file_key)
            .map_err(|e| ClientError::Crypto(format!("file key unwrap failed: {e}")))?;
        plaintext.try_into().map_err(|_: Vec<u8>| ClientError::Crypto("unwrapped file key has wrong length".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_key_is_deterministic_and_case_folds_email() {
        let a = MasterKey::derive("hunter2", "Alice@X.io");
        let b = MasterKey::derive("hunter2", "alice@x.io");
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn master_key_changes_with_password_or_email() {
        let base = MasterKey::derive("hunter2", "alice@x.io");
        assert_ne!(base.0, MasterKey::derive("different", "alice@x.io").0);
        assert_ne!(base.0, MasterKey::derive("hunter2", "bob@x.io").0);
    }

    #[test]
    fn file_key_round_trips_through_wrap() {
        let master = MasterKey::derive("hunter2", "alice@x.io");
        let secret = FileSecret::generate();
        let (wrap_nonce, wrapped) = secret.wrap(&master).unwrap();
        let recovered = FileSecret::unwrap_file_key(&master, &wrap_nonce, &wrapped).unwrap();
        assert_eq!(recovered, secret.file_key);
    }

    #[test]
    fn unwrap_fails_under_wrong_master_key() {
        let master = MasterKey::derive("hunter2", "alice@x.io");
        let wrong = MasterKey::derive("wrong-password", "alice@x.io");
        let secret = FileSecret::generate();
        let (wrap_nonce, wrapped) = secret.wrap(&master).unwrap();
        assert!(FileSecret::unwrap_file_key(&wrong, &wrap_nonce, &wrapped).is_err());
    }
}
