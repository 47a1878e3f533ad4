use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::path::PathBuf;
use thiserror::Error;

pub mod fs;

pub use fs::LocalFsStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("size limit exceeded")]
    ExceedsLimit,
    #[error("object not found")]
    NotFound,
    #[error("internal storage error: {0}")]
    Internal(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
/// A neutral byte stream using `std::io::Error`, keeping this trait decoupled
/// from the application's error types.
pub type StorageStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// The storage seam: chunk, classic-file, and manifest persistence all go
/// through this trait so workers and services never depend on the concrete
/// filesystem layout directly.
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    /// Streams `stream` to `path`, enforcing `max_size` while writing and
    /// failing with `ExceedsLimit` the moment it is exceeded. Writes go to a
    /// `.uploading` temp file first and are atomically renamed into place.
    async fn put(&self, path: &PathBuf, stream: StorageStream, max_size: u64) -> StorageResult<u64>;
    async fn get(&self, path: &PathBuf) -> StorageResult<(u64, StorageStream)>;
    async fn head(&self, path: &PathBuf) -> StorageResult<u64>;
    async fn delete(&self, path: &PathBuf) -> StorageResult<()>;
}
