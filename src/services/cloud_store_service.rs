use crate::adapters::database::DbPool;
use crate::adapters::database::chunk_repo::ChunkRepository;
use crate::adapters::database::device_state_repo::DeviceStateRepository;
use crate::adapters::paths::{DataLayout, join_within, migrate_legacy_tenant_dir};
use crate::domain::chunk::is_valid_chunk_id;
use crate::domain::device_state::{CloudDeviceState, MAX_DEVICE_STATE_BYTES};
use crate::domain::manifest::{ManifestEnvelope, ManifestListEntry, sanitize_manifest_id};
use crate::domain::now_millis;
use crate::error::{AppError, QuotaContext, Result};
use crate::services::quota_service::QuotaService;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;

/// StealthCloud chunk and manifest storage. Chunks are content-addressed and
/// write-once; manifests are last-writer-wins JSON envelopes. Neither is ever
/// interpreted by the server beyond the chunk-id/hash and manifest-id checks.
#[derive(Clone)]
pub struct CloudStoreService {
    pool: DbPool,
    chunk_repo: ChunkRepository,
    device_state_repo: DeviceStateRepository,
    layout: Arc<DataLayout>,
    quota_service: QuotaService,
}

impl CloudStoreService {
    #[must_use]
    pub fn new(
        pool: DbPool,
        chunk_repo: ChunkRepository,
        device_state_repo: DeviceStateRepository,
        layout: Arc<DataLayout>,
        quota_service: QuotaService,
    ) -> Self {
        Self { pool, chunk_repo, device_state_repo, layout, quota_service }
    }

    /// Runs legacy tenant-dir migration for `tenant_key`'s first touch this
    /// process, serialized by the same per-tenant mutex `quota_service` uses
    /// for reservations so a concurrent request for the same tenant can never
    /// observe a half-renamed directory.
    async fn migrate_legacy_tenant(&self, user_id: i64, tenant_key: &str, legacy_keys: &[String]) {
        if legacy_keys.is_empty() {
            return;
        }
        let _guard = self.quota_service.tenant_guard(user_id).await;
        migrate_legacy_tenant_dir(&self.layout, tenant_key, legacy_keys);
    }

    /// Checks whether a chunk is already stored, so the caller can skip quota
    /// reservation entirely on the idempotent-replay path.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if `chunk_id` fails the 64-hex format check.
    #[tracing::instrument(skip(self))]
    pub async fn chunk_exists(&self, tenant_key: &str, chunk_id: &str) -> Result<bool> {
        validate_chunk_id(chunk_id)?;
        let path = join_within(&self.layout.tenant_chunks_dir(tenant_key), chunk_id)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Verifies the ciphertext's SHA-256 against the declared chunk id, then
    /// writes it (first writer wins; later writers for the same id are
    /// no-ops) and upserts the DB index.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` on an invalid id or a hash mismatch.
    #[tracing::instrument(skip(self, body, legacy_keys))]
    pub async fn store_chunk(
        &self,
        user_id: i64,
        tenant_key: &str,
        legacy_keys: &[String],
        chunk_id: &str,
        body: &[u8],
    ) -> Result<()> {
        validate_chunk_id(chunk_id)?;

        let digest = hex::encode(Sha256::digest(body));
        if digest != chunk_id {
            return Err(AppError::BadRequest("chunk hash mismatch".into()));
        }

        self.migrate_legacy_tenant(user_id, tenant_key, legacy_keys).await;

        let dir = self.layout.tenant_chunks_dir(tenant_key);
        tokio::fs::create_dir_all(&dir).await?;
        let target = join_within(&dir, chunk_id)?;

        if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
            let tmp = dir.join(format!(".{chunk_id}.uploading"));
            tokio::fs::write(&tmp, body).await?;
            if let Err(e) = tokio::fs::rename(&tmp, &target).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e.into());
            }
        }

        let mut conn = self.pool.acquire().await?;
        self.chunk_repo.upsert(&mut conn, user_id, chunk_id, body.len() as i64).await?;
        Ok(())
    }

    /// Sums the storage footprint of every chunk owned by a user.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    pub async fn used_bytes(&self, user_id: i64) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        self.chunk_repo.total_size_for_user(&mut conn, user_id).await
    }

    /// Resolves a chunk's on-disk path for download.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` on an invalid id, `AppError::NotFound` if absent.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_chunk_path(&self, tenant_key: &str, chunk_id: &str) -> Result<PathBuf> {
        validate_chunk_id(chunk_id)?;
        let path = join_within(&self.layout.tenant_chunks_dir(tenant_key), chunk_id)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AppError::NotFound);
        }
        Ok(path)
    }

    /// Writes a manifest envelope. Last writer for a given id wins.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if `manifest_id_raw` sanitizes to empty
    /// or `chunk_count` is non-positive.
    #[tracing::instrument(skip(self, encrypted_manifest, legacy_keys))]
    pub async fn upload_manifest(
        &self,
        user_id: i64,
        tenant_key: &str,
        legacy_keys: &[String],
        manifest_id_raw: &str,
        encrypted_manifest: String,
        chunk_count: Option<i64>,
    ) -> Result<ManifestEnvelope> {
        let manifest_id = sanitize_manifest_id(manifest_id_raw).ok_or_else(|| AppError::BadRequest("invalid manifest id".into()))?;
        if chunk_count.is_some_and(|c| c <= 0) {
            return Err(AppError::BadRequest("chunkCount must be positive".into()));
        }

        self.migrate_legacy_tenant(user_id, tenant_key, legacy_keys).await;

        let dir = self.layout.tenant_manifests_dir(tenant_key);
        tokio::fs::create_dir_all(&dir).await?;

        let envelope = ManifestEnvelope { manifest_id: manifest_id.clone(), encrypted_manifest, created_at: now_millis() };
        let json = serde_json::to_vec(&envelope).map_err(|_| AppError::Internal)?;

        let target = join_within(&dir, &format!("{manifest_id}.json"))?;
        let tmp = dir.join(format!(".{manifest_id}.json.tmp"));
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &target).await?;

        Ok(envelope)
    }

    /// Lists manifest ids, lexicographically sorted, with offset/limit.
    ///
    /// # Errors
    /// Returns `AppError::Io` if the directory cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn list_manifests(&self, tenant_key: &str, offset: usize, limit: usize) -> Result<(Vec<ManifestListEntry>, usize)> {
        let dir = self.layout.tenant_manifests_dir(tenant_key);
        tokio::fs::create_dir_all(&dir).await?;

        let mut ids = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }

        ids.sort();
        let total = ids.len();
        let page = ids.into_iter().skip(offset).take(limit).map(|manifest_id| ManifestListEntry { manifest_id }).collect();
        Ok((page, total))
    }

    /// Fetches a manifest envelope verbatim.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` on an unsanitizable id, `AppError::NotFound` if absent.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_manifest(&self, tenant_key: &str, manifest_id_raw: &str) -> Result<ManifestEnvelope> {
        let manifest_id = sanitize_manifest_id(manifest_id_raw).ok_or_else(|| AppError::BadRequest("invalid manifest id".into()))?;
        let dir = self.layout.tenant_manifests_dir(tenant_key);
        let path = join_within(&dir, &format!("{manifest_id}.json"))?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|_| AppError::Internal)
    }

    /// Fetches a device's opaque sync-state blob.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    pub async fn get_device_state(&self, user_id: i64, device_uuid: &str) -> Result<Option<CloudDeviceState>> {
        let mut conn = self.pool.acquire().await?;
        self.device_state_repo.find(&mut conn, user_id, device_uuid).await
    }

    /// Replaces a device's opaque sync-state blob.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` for non-object JSON, `AppError::PayloadTooLarge`
    /// over the 100 KiB cap.
    #[tracing::instrument(skip(self, state_json))]
    pub async fn put_device_state(&self, user_id: i64, device_uuid: &str, state_json: String) -> Result<CloudDeviceState> {
        if state_json.len() > MAX_DEVICE_STATE_BYTES {
            return Err(AppError::PayloadTooLarge {
                code: "DEVICE_STATE_TOO_LARGE",
                quota: QuotaContext {
                    quota_bytes: MAX_DEVICE_STATE_BYTES as i64,
                    used_bytes: state_json.len() as i64,
                    remaining_bytes: 0,
                },
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(&state_json).map_err(|_| AppError::BadRequest("device state must be valid JSON".into()))?;
        if !value.is_object() {
            return Err(AppError::BadRequest("device state must be a JSON object".into()));
        }

        let mut conn = self.pool.acquire().await?;
        self.device_state_repo.upsert(&mut conn, user_id, device_uuid, &state_json).await
    }

    /// Removes both chunk and manifest directories for a tenant and deletes
    /// every `cloud_chunks` row for the user.
    ///
    /// # Errors
    /// Returns `AppError::Io` or `AppError::Database` on failure.
    #[tracing::instrument(skip(self))]
    pub async fn purge(&self, user_id: i64, tenant_key: &str) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        let chunks_deleted = self.chunk_repo.delete_all_for_user(&mut conn, user_id).await?;

        for dir in [self.layout.tenant_chunks_dir(tenant_key), self.layout.tenant_manifests_dir(tenant_key)] {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(chunks_deleted)
    }
}

fn validate_chunk_id(chunk_id: &str) -> Result<()> {
    if is_valid_chunk_id(chunk_id) { Ok(()) } else { Err(AppError::BadRequest("invalid chunk id".into())) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::init_pool;

    async fn service(dir: &std::path::Path) -> CloudStoreService {
        let db_path = dir.join("db").join("backup.db");
        std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();
        let pool = init_pool(&db_path).await.unwrap();
        sqlx::query(
            "CREATE TABLE cloud_chunks (user_id INTEGER NOT NULL, chunk_id TEXT NOT NULL, size INTEGER NOT NULL, PRIMARY KEY (user_id, chunk_id))",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE device_states (user_id INTEGER NOT NULL, device_uuid TEXT NOT NULL, state_json TEXT NOT NULL, updated_at TEXT NOT NULL, PRIMARY KEY (user_id, device_uuid))",
        )
        .execute(&pool)
        .await
        .unwrap();

        let layout = Arc::new(DataLayout {
            root: dir.to_path_buf(),
            uploads: dir.join("uploads"),
            cloud: dir.join("cloud"),
            capacity: dir.join("capacity"),
            capacity_file: dir.join("capacity").join("photosync-capacity.json"),
            db_path,
        });
        std::fs::create_dir_all(layout.cloud.join("users")).unwrap();

        CloudStoreService::new(pool, ChunkRepository::new(), DeviceStateRepository::new(), layout, QuotaService::new())
    }

    #[tokio::test]
    async fn chunk_hash_mismatch_is_rejected_and_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let body = b"hello world";
        let wrong_id = "a".repeat(64);

        let err = service.store_chunk(1, "tenant", &[], &wrong_id, body).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(!service.chunk_exists("tenant", &wrong_id).await.unwrap());
    }

    #[tokio::test]
    async fn replaying_the_same_chunk_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let body = b"some ciphertext bytes";
        let chunk_id = hex::encode(Sha256::digest(body));

        service.store_chunk(1, "tenant", &[], &chunk_id, body).await.unwrap();
        service.store_chunk(1, "tenant", &[], &chunk_id, body).await.unwrap();

        assert_eq!(service.used_bytes(1).await.unwrap(), body.len() as i64);
    }

    #[tokio::test]
    async fn store_chunk_migrates_a_legacy_tenant_dir_on_first_touch() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;

        let legacy_chunks_dir = service.layout.tenant_chunks_dir("legacy-tenant");
        std::fs::create_dir_all(&legacy_chunks_dir).unwrap();
        std::fs::write(legacy_chunks_dir.join("old-chunk"), b"stale").unwrap();

        let body = b"fresh ciphertext";
        let chunk_id = hex::encode(Sha256::digest(body));
        service.store_chunk(1, "current-tenant", &["legacy-tenant".to_string()], &chunk_id, body).await.unwrap();

        assert!(!service.layout.tenant_root("legacy-tenant").exists());
        assert!(service.layout.tenant_chunks_dir("current-tenant").join("old-chunk").exists());
        assert!(service.chunk_exists("current-tenant", &chunk_id).await.unwrap());
    }

    #[tokio::test]
    async fn device_state_rejects_non_object_and_oversize() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;

        let err = service.put_device_state(1, "dev", "[1,2,3]".to_string()).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let oversized = format!("{{\"padding\":\"{}\"}}", "x".repeat(MAX_DEVICE_STATE_BYTES + 1));
        let err = service.put_device_state(1, "dev", oversized).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { code: "DEVICE_STATE_TOO_LARGE", .. }));
    }
}
