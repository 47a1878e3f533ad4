use crate::adapters::database::DbPool;
use crate::adapters::database::chunk_repo::ChunkRepository;
use crate::adapters::database::device_repo::DeviceRepository;
use crate::adapters::database::user_repo::UserRepository;
use crate::adapters::paths::{DataLayout, sanitize_key};
use crate::domain::chunk::is_valid_chunk_id;
use crate::error::Result;
use opentelemetry::{global, metrics::Counter};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    rows_upserted: Counter<u64>,
    rows_removed: Counter<u64>,
    errors: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("photosync-server");
        Self {
            rows_upserted: meter
                .u64_counter("photosync_reconciler_rows_upserted_total")
                .with_description("Total chunk index rows corrected to match on-disk content")
                .build(),
            rows_removed: meter
                .u64_counter("photosync_reconciler_rows_removed_total")
                .with_description("Total chunk index rows removed for files no longer on disk")
                .build(),
            errors: meter
                .u64_counter("photosync_reconciler_errors_total")
                .with_description("Total number of per-user errors encountered during reconciliation")
                .build(),
        }
    }
}

/// Walks every user's tenant chunk directories and realigns `cloud_chunks`
/// with what is actually on disk, correcting drift left behind by crashed
/// uploads or out-of-band file operations.
#[derive(Clone)]
pub struct UsageReconcilerWorker {
    pool: DbPool,
    user_repo: UserRepository,
    device_repo: DeviceRepository,
    chunk_repo: ChunkRepository,
    layout: Arc<DataLayout>,
    interval_secs: u64,
    metrics: Metrics,
}

impl std::fmt::Debug for UsageReconcilerWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageReconcilerWorker").field("interval_secs", &self.interval_secs).finish_non_exhaustive()
    }
}

impl UsageReconcilerWorker {
    #[must_use]
    pub fn new(
        pool: DbPool,
        user_repo: UserRepository,
        device_repo: DeviceRepository,
        chunk_repo: ChunkRepository,
        layout: Arc<DataLayout>,
        interval_secs: u64,
    ) -> Self {
        Self { pool, user_repo, device_repo, chunk_repo, layout, interval_secs, metrics: Metrics::new() }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(StdDuration::from_secs(self.interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    async {
                        tracing::debug!("running usage reconciliation cycle");
                        if let Err(e) = self.reconcile_all().await {
                            tracing::error!(error = %e, "reconciliation cycle failed");
                            self.metrics.errors.add(1, &[]);
                        }
                    }
                    .instrument(tracing::info_span!("run_usage_reconciler"))
                    .await;
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("usage reconciler loop shutting down");
    }

    #[tracing::instrument(err, skip(self))]
    async fn reconcile_all(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let user_ids = self.user_repo.list_all_ids(&mut conn).await?;
        drop(conn);

        for user_id in user_ids {
            if let Err(e) = self.reconcile_user(user_id).await {
                tracing::warn!(error = %e, user_id, "failed to reconcile user, will retry next cycle");
                self.metrics.errors.add(1, &[]);
            }
        }
        Ok(())
    }

    async fn reconcile_user(&self, user_id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let devices = self.device_repo.list_for_user(&mut conn, user_id).await?;

        let mut on_disk: HashMap<String, i64> = HashMap::new();
        for device in devices {
            let key = sanitize_key(&device.device_uuid.to_string());
            if key.is_empty() {
                continue;
            }
            let chunks_dir = self.layout.tenant_chunks_dir(&key);
            let mut read_dir = match tokio::fs::read_dir(&chunks_dir).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = read_dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !is_valid_chunk_id(&name) {
                    continue;
                }
                let size = entry.metadata().await?.len() as i64;
                on_disk.insert(name, size);
            }
        }

        let mut upserted = 0;
        for (chunk_id, size) in &on_disk {
            self.chunk_repo.upsert(&mut conn, user_id, chunk_id, *size).await?;
            upserted += 1;
        }

        let indexed: HashSet<String> = on_disk.keys().cloned().collect();
        let removed = self.remove_stale_rows(&mut conn, user_id, &indexed).await?;

        if upserted > 0 {
            self.metrics.rows_upserted.add(upserted, &[]);
        }
        if removed > 0 {
            self.metrics.rows_removed.add(removed, &[]);
        }
        Ok(())
    }

    async fn remove_stale_rows(
        &self,
        conn: &mut sqlx::SqliteConnection,
        user_id: i64,
        on_disk: &HashSet<String>,
    ) -> Result<u64> {
        let indexed_ids = self.chunk_repo.list_ids_for_user(conn, user_id).await?;
        let mut removed = 0;
        for chunk_id in indexed_ids {
            if !on_disk.contains(&chunk_id) {
                self.chunk_repo.delete(conn, user_id, &chunk_id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
