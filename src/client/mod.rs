//! Client-side dedup & upload pipeline.
//!
//! Everything under this module runs on the *uploading device*, never on the
//! server: key derivation, chunk encryption, manifest construction, the
//! dedup decision chain, perceptual hashing, and the network pipeline that
//! ties them together. It is pure library surface — there is no axum
//! handler here, and nothing in `api`/`services` depends on it.

pub mod chunker;
pub mod dedup;
pub mod exif;
pub mod filename;
pub mod keys;
pub mod manifest;
pub mod phash;
pub mod pipeline;
pub mod retry;

use thiserror::Error;

/// Fixed plaintext chunk size. Chosen to bound memory per concurrent upload
/// rather than for any wire-format reason.
pub const CHUNK_SIZE: usize = 2 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("encryption error: {0}")]
    Crypto(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported image format for perceptual hashing")]
    UnsupportedImageFormat,
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upload cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ClientError>;
