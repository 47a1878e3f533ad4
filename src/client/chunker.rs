//! Fixed-size chunking and per-chunk AEAD sealing.

use crate::client::keys::{BASE_NONCE_LEN, FileSecret};
use crate::client::{CHUNK_SIZE, ClientError, Result};
use sha2::{Digest, Sha256};
use xsalsa20poly1305::aead::{Aead, KeyInit};
use xsalsa20poly1305::{Key, Nonce, XSalsa20Poly1305};

/// One encrypted, content-addressed chunk, ready for upload as-is.
#[derive(Debug, Clone)]
pub struct EncryptedChunk {
    pub chunk_id: String,
    pub ciphertext: Vec<u8>,
}

/// `base_nonce ∥ little-endian-u64(chunk index)`.
#[must_use]
pub fn chunk_nonce(base_nonce: &[u8; BASE_NONCE_LEN], index: u64) -> [u8; 24] {
    let mut nonce = [0u8; 24];
    nonce[..BASE_NONCE_LEN].copy_from_slice(base_nonce);
    nonce[BASE_NONCE_LEN..].copy_from_slice(&index.to_le_bytes());
    nonce
}

/// Splits `plaintext` into fixed `CHUNK_SIZE` pieces, seals each under
/// `secret.file_key` with its derived nonce, and content-addresses the
/// resulting ciphertext with `SHA-256`.
///
/// # Errors
/// Returns an error if sealing a chunk fails (not expected with valid keys).
pub fn encrypt_chunks(plaintext: &[u8], secret: &FileSecret) -> Result<Vec<EncryptedChunk>> {
    let cipher = XSalsa20Poly1305::new(Key::from_slice(&secret.file_key));
    // An empty file still produces exactly one (empty) chunk, matching the
    // server's expectation that every manifest references at least one id.
    let slices: Vec<&[u8]> = if plaintext.is_empty() { vec![&[][..]] } else { plaintext.chunks(CHUNK_SIZE).collect() };

    slices
        .into_iter()
        .enumerate()
        .map(|(i, plain_chunk)| {
            let nonce = chunk_nonce(&secret.base_nonce, i as u64);
            let ciphertext = cipher
                .encrypt(Nonce::from_slice(&nonce), plain_chunk)
                .map_err(|e| ClientError::Crypto(format!("chunk {i} encryption failed: {e}")))?;
            let chunk_id = hex::encode(Sha256::digest(&ciphertext));
            Ok(EncryptedChunk { chunk_id, ciphertext })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_nonce_is_base_plus_little_endian_index() {
        let base = [1u8; BASE_NONCE_LEN];
        let nonce = chunk_nonce(&base, 1);
        assert_eq!(&nonce[..16], &base[..]);
        assert_eq!(&nonce[16..], &1u64.to_le_bytes());
    }

    #[test]
    fn encrypts_and_addresses_every_chunk() {
        let secret = FileSecret::generate();
        let plaintext = vec![7u8; CHUNK_SIZE * 2 + 10];
        let chunks = encrypt_chunks(&plaintext, &secret).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].ciphertext.len(), 10 + 16);
        for c in &chunks {
            assert_eq!(c.chunk_id.len(), 64);
        }
    }

    #[test]
    fn same_plaintext_different_secret_yields_different_chunk_ids() {
        let plaintext = vec![1u8; 100];
        let a = encrypt_chunks(&plaintext, &FileSecret::generate()).unwrap();
        let b = encrypt_chunks(&plaintext, &FileSecret::generate()).unwrap();
        assert_ne!(a[0].chunk_id, b[0].chunk_id);
    }

    #[test]
    fn empty_file_still_produces_one_chunk() {
        let chunks = encrypt_chunks(&[], &FileSecret::generate()).unwrap();
        assert_eq!(chunks.len(), 1);
    }
}
