//! Manifest construction and sealing. The manifest is the only thing the
//! server ever reads a structured shape out of; its contents are otherwise
//! opaque ciphertext to it.

use crate::client::chunker::EncryptedChunk;
use crate::client::keys::{FileSecret, MasterKey};
use crate::client::{ClientError, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use xsalsa20poly1305::aead::{Aead, KeyInit};
use xsalsa20poly1305::{Key, Nonce, XSalsa20Poly1305};

pub const MANIFEST_VERSION: u32 = 1;

/// The closed record stored (encrypted) per file. New optional fields must
/// land at a new `v`; readers of a given `v` ignore fields they don't know.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientManifest {
    pub v: u32,
    pub asset_id: String,
    pub filename: String,
    pub media_type: String,
    pub original_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif_capture_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif_make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif_model: Option<String>,
    pub base_nonce16: String,
    pub wrap_nonce: String,
    pub wrapped_file_key: String,
    pub chunk_ids: Vec<String>,
    pub chunk_sizes: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perceptual_hash: Option<String>,
}

/// The wire envelope: manifest JSON sealed under `master_key` with a fresh
/// nonce, both hex-encoded for transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedManifest {
    pub manifest_nonce: String,
    pub manifest_box: String,
}

impl SealedManifest {
    /// Nonce hex is always 48 characters (24 bytes), so it's an unambiguous
    /// fixed-width prefix — no delimiter needed in the single opaque string
    /// the server stores as `encryptedManifest`.
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!("{}{}", self.manifest_nonce, self.manifest_box)
    }

    /// Splits a server-stored `encryptedManifest` string back into nonce and box.
    ///
    /// # Errors
    /// Returns an error if the string is shorter than the fixed nonce prefix.
    pub fn from_wire(wire: &str) -> Result<Self> {
        if wire.len() < 48 {
            return Err(ClientError::Crypto("encrypted manifest too short".to_string()));
        }
        let (nonce, sealed_box) = wire.split_at(48);
        Ok(Self { manifest_nonce: nonce.to_string(), manifest_box: sealed_box.to_string() })
    }
}

/// Deterministic manifest id, stable across devices for the same
/// `(filename, size)` pair: `SHA-256("file:" + lower(filename) + ":" +
/// decimal(originalSize))`. Makes reuploads from a different device
/// idempotent when filename and size match.
#[must_use]
pub fn stable_manifest_id(filename: &str, original_size: u64) -> String {
    let input = format!("file:{}:{}", filename.to_lowercase(), original_size);
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Builds the manifest for a file about to be uploaded, wrapping its
/// `file_key` under `master_key` in the process.
///
/// # Errors
/// Returns an error if wrapping the file key fails.
#[allow(clippy::too_many_arguments)]
pub fn build_manifest(
    filename: &str,
    media_type: &str,
    original_size: u64,
    secret: &FileSecret,
    master_key: &MasterKey,
    chunks: &[EncryptedChunk],
    creation_time: Option<String>,
    exif: Option<(Option<String>, Option<String>, Option<String>)>,
    file_hash: Option<String>,
    perceptual_hash: Option<String>,
) -> Result<ClientManifest> {
    let (wrap_nonce, wrapped_file_key) = secret.wrap(master_key)?;
    let (exif_capture_time, exif_make, exif_model) = exif.unwrap_or((None, None, None));
    Ok(ClientManifest {
        v: MANIFEST_VERSION,
        asset_id: stable_manifest_id(filename, original_size),
        filename: filename.to_string(),
        media_type: media_type.to_string(),
        original_size,
        creation_time,
        exif_capture_time,
        exif_make,
        exif_model,
        base_nonce16: hex::encode(secret.base_nonce),
        wrap_nonce: hex::encode(wrap_nonce),
        wrapped_file_key: hex::encode(wrapped_file_key),
        chunk_ids: chunks.iter().map(|c| c.chunk_id.clone()).collect(),
        chunk_sizes: chunks.iter().map(|c| c.ciphertext.len() as u64).collect(),
        file_hash,
        perceptual_hash,
    })
}

/// Seals a manifest's JSON encoding under `master_key` with a fresh 24-byte
/// nonce.
///
/// # Errors
/// Returns an error if JSON encoding or the AEAD seal fails.
pub fn seal_manifest(manifest: &ClientManifest, master_key: &MasterKey) -> Result<SealedManifest> {
    let plaintext = serde_json::to_vec(manifest)?;
    let mut nonce = vec![0u8; 24];
    rand::thread_rng().fill_bytes(&mut nonce);
    let cipher = XSalsa20Poly1305::new(Key::from_slice(&master_key.0));
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|e| ClientError::Crypto(format!("manifest seal failed: {e}")))?;
    Ok(SealedManifest { manifest_nonce: hex::encode(nonce), manifest_box: hex::encode(sealed) })
}

/// Opens a sealed manifest under `master_key`.
///
/// # Errors
/// Returns an error if hex decoding, AEAD verification, or JSON decoding fails.
pub fn open_manifest(sealed: &SealedManifest, master_key: &MasterKey) -> Result<ClientManifest> {
    let nonce = hex::decode(&sealed.manifest_nonce).map_err(|e| ClientError::Crypto(e.to_string()))?;
    let box_bytes = hex::decode(&sealed.manifest_box).map_err(|e| ClientError::Crypto(e.to_string()))?;
    let cipher = XSalsa20Poly1305::new(Key::from_slice(&master_key.0));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), box_bytes.as_slice())
        .map_err(|e| ClientError::Crypto(format!("manifest open failed: {e}")))?;
    Ok(serde_json::from_slice(&plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::keys::FileSecret;

    #[test]
    fn manifest_id_is_stable_across_filename_case() {
        assert_eq!(stable_manifest_id("IMG_0001.HEIC", 100), stable_manifest_id("img_0001.heic", 100));
    }

    #[test]
    fn manifest_id_changes_with_size() {
        assert_ne!(stable_manifest_id("a.jpg", 100), stable_manifest_id("a.jpg", 200));
    }

    #[test]
    fn manifest_round_trips_through_seal() {
        let master = MasterKey::derive("hunter2", "alice@x.io");
        let secret = FileSecret::generate();
        let chunks = vec![EncryptedChunk { chunk_id: "a".repeat(64), ciphertext: vec![1, 2, 3] }];
        let manifest =
            build_manifest("a.jpg", "image/jpeg", 3, &secret, &master, &chunks, None, None, None, None).unwrap();
        let sealed = seal_manifest(&manifest, &master).unwrap();
        let opened = open_manifest(&sealed, &master).unwrap();
        assert_eq!(opened.asset_id, manifest.asset_id);
        assert_eq!(opened.chunk_ids, manifest.chunk_ids);
    }

    #[test]
    fn sealed_manifest_round_trips_through_wire_encoding() {
        let master = MasterKey::derive("hunter2", "alice@x.io");
        let secret = FileSecret::generate();
        let chunks = vec![EncryptedChunk { chunk_id: "a".repeat(64), ciphertext: vec![1, 2, 3] }];
        let manifest =
            build_manifest("a.jpg", "image/jpeg", 3, &secret, &master, &chunks, None, None, None, None).unwrap();
        let sealed = seal_manifest(&manifest, &master).unwrap();
        let wire = sealed.to_wire();
        let decoded = SealedManifest::from_wire(&wire).unwrap();
        assert_eq!(decoded.manifest_nonce, sealed.manifest_nonce);
        assert_eq!(decoded.manifest_box, sealed.manifest_box);
    }

    #[test]
    fn opening_under_wrong_master_key_fails() {
        let master = MasterKey::derive("hunter2", "alice@x.io");
        let wrong = MasterKey::derive("wrong", "alice@x.io");
        let secret = FileSecret::generate();
        let chunks = vec![EncryptedChunk { chunk_id: "a".repeat(64), ciphertext: vec![1, 2, 3] }];
        let manifest =
            build_manifest("a.jpg", "image/jpeg", 3, &secret, &master, &chunks, None, None, None, None).unwrap();
        let sealed = seal_manifest(&manifest, &master).unwrap();
        assert!(open_manifest(&sealed, &wrong).is_err());
    }
}
