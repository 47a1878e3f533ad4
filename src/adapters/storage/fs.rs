use crate::adapters::storage::{ObjectStorage, StorageError, StorageResult, StorageStream};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Plain-filesystem `ObjectStorage`. Backs both the classic object store and
/// the StealthCloud chunk store; neither ever sees a different storage
/// backend.
#[derive(Clone, Debug, Default)]
pub struct LocalFsStorage;

impl LocalFsStorage {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ObjectStorage for LocalFsStorage {
    #[tracing::instrument(skip(self, stream))]
    async fn put(&self, path: &PathBuf, mut stream: StorageStream, max_size: u64) -> StorageResult<u64> {
        let tmp_path = path.with_extension("uploading");
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| StorageError::Internal(e.to_string()))?;
        }

        let mut file = tokio::fs::File::create(&tmp_path).await.map_err(|e| StorageError::Internal(e.to_string()))?;
        let mut total: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    let _ = tokio::fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Internal(e.to_string()));
                }
            };
            total += chunk.len() as u64;
            if total > max_size {
                drop(file);
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(StorageError::ExceedsLimit);
            }
            if let Err(e) = file.write_all(&chunk).await {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(StorageError::Internal(e.to_string()));
            }
        }

        if let Err(e) = file.flush().await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StorageError::Internal(e.to_string()));
        }
        drop(file);

        tokio::fs::rename(&tmp_path, path).await.map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(total)
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, path: &PathBuf) -> StorageResult<(u64, StorageStream)> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(StorageError::NotFound),
            Err(e) => return Err(StorageError::Internal(e.to_string())),
        };

        let file = tokio::fs::File::open(path).await.map_err(|e| StorageError::Internal(e.to_string()))?;
        let reader = tokio_util::io::ReaderStream::new(file);
        let stream: StorageStream = Box::pin(reader);
        Ok((metadata.len(), stream))
    }

    #[tracing::instrument(skip(self))]
    async fn head(&self, path: &PathBuf) -> StorageResult<u64> {
        match tokio::fs::metadata(path).await {
            Ok(m) => Ok(m.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => Err(StorageError::Internal(e.to_string())),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, path: &PathBuf) -> StorageResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Internal(e.to_string())),
        }
    }
}
