use crate::adapters::database::DbPool;
use crate::adapters::database::file_repo::FileRepository;
use crate::adapters::paths::{DataLayout, join_within};
use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;

/// One entry in a classic file listing: filesystem metadata, not the DB row,
/// since the filesystem is authoritative for what a directory listing shows.
#[derive(Debug, Clone)]
pub struct FileListEntry {
    pub filename: String,
    pub size: u64,
    pub modified_time: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub duplicate: bool,
    pub filename: String,
    pub size: i64,
}

/// The multipart and raw upload endpoints converge on `ingest` after each has
/// produced a `(filename, content hash, size, tmp_path)` tuple on its own
/// terms — multipart buffers then hashes, raw hashes incrementally while
/// streaming. From here both paths run one dedup-and-commit routine.
#[derive(Clone)]
pub struct ClassicStoreService {
    pool: DbPool,
    file_repo: FileRepository,
    layout: Arc<DataLayout>,
}

impl ClassicStoreService {
    #[must_use]
    pub fn new(pool: DbPool, file_repo: FileRepository, layout: Arc<DataLayout>) -> Self {
        Self { pool, file_repo, layout }
    }

    /// Commits a fully-written, fully-hashed temp file into the tenant's
    /// upload directory, deduping by filename or content hash.
    ///
    /// # Errors
    /// Returns `AppError::Forbidden` if `filename` escapes the tenant directory,
    /// `AppError::Io` on filesystem failure, `AppError::Database` on DB failure.
    #[tracing::instrument(skip(self, tmp_path))]
    pub async fn ingest(
        &self,
        user_id: i64,
        device_uuid: &str,
        filename: &str,
        mime: Option<&str>,
        size: i64,
        file_hash: &str,
        tmp_path: &Path,
    ) -> Result<IngestOutcome> {
        let dir = self.layout.device_upload_dir(device_uuid);
        tokio::fs::create_dir_all(&dir).await?;
        let target = join_within(&dir, filename)?;

        let mut conn = self.pool.acquire().await?;

        let existing = match self.file_repo.find_by_filename(&mut conn, user_id, filename).await? {
            Some(row) => Some(row),
            None => self.file_repo.find_by_hash(&mut conn, user_id, file_hash).await?,
        };

        if let Some(existing) = existing {
            let existing_path = join_within(&dir, &existing.filename)?;
            if tokio::fs::try_exists(&existing_path).await.unwrap_or(false) {
                let _ = tokio::fs::remove_file(tmp_path).await;
                return Ok(IngestOutcome { duplicate: true, filename: existing.filename, size: existing.size });
            }
            // Row present but file missing: stale index entry, delete and fall through to a fresh write.
            self.file_repo.delete(&mut conn, user_id, &existing.filename).await?;
        }

        tokio::fs::rename(tmp_path, &target).await?;
        let file = self.file_repo.create(&mut conn, user_id, filename, mime, size, file_hash).await?;

        Ok(IngestOutcome { duplicate: false, filename: file.filename, size: file.size })
    }

    /// Lists the tenant's upload directory, skipping dotfiles, sorted
    /// lexicographically by filename, with offset/limit applied after sorting.
    ///
    /// # Errors
    /// Returns `AppError::Io` if the directory cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        device_uuid: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<FileListEntry>, usize)> {
        let dir = self.layout.device_upload_dir(device_uuid);
        tokio::fs::create_dir_all(&dir).await?;

        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            entries.push(FileListEntry {
                filename: name,
                size: metadata.len(),
                modified_time: metadata.modified().ok().map(OffsetDateTime::from),
            });
        }

        entries.sort_by(|a, b| a.filename.cmp(&b.filename));
        let total = entries.len();
        let page = entries.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    /// Resolves the path for a download, prefix-checked against the tenant
    /// directory.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the file does not exist, `AppError::Forbidden`
    /// on a path-escape attempt.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_download_path(&self, device_uuid: &str, filename: &str) -> Result<PathBuf> {
        let dir = self.layout.device_upload_dir(device_uuid);
        let path = join_within(&dir, filename)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AppError::NotFound);
        }
        Ok(path)
    }

    /// Removes the tenant's entire classic upload directory and every index
    /// row for the user, returning the number of files deleted.
    ///
    /// # Errors
    /// Returns `AppError::Io` or `AppError::Database` on failure.
    #[tracing::instrument(skip(self))]
    pub async fn purge(&self, user_id: i64, device_uuid: &str) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        let deleted = self.file_repo.delete_all_for_user(&mut conn, user_id).await?;

        let dir = self.layout.device_upload_dir(device_uuid);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(deleted)
    }
}
