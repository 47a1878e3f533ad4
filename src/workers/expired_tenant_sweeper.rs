use crate::adapters::database::DbPool;
use crate::adapters::database::chunk_repo::ChunkRepository;
use crate::adapters::database::device_repo::DeviceRepository;
use crate::adapters::database::plan_repo::PlanRepository;
use crate::adapters::database::user_repo::UserRepository;
use crate::adapters::paths::{DataLayout, sanitize_key};
use crate::domain::now_millis;
use crate::domain::plan::PlanStatus;
use crate::error::Result;
use opentelemetry::{global, metrics::Counter};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    tenants_deleted: Counter<u64>,
    errors: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("photosync-server");
        Self {
            tenants_deleted: meter
                .u64_counter("photosync_tenants_deleted_total")
                .with_description("Total number of tenants tombstoned after grace expiry")
                .build(),
            errors: meter
                .u64_counter("photosync_sweeper_errors_total")
                .with_description("Total number of per-tenant errors encountered during the sweep")
                .build(),
        }
    }
}

/// Finds plans whose grace period has elapsed and tombstones their
/// StealthCloud tenant data: deletes every candidate tenant directory, clears
/// the chunk index, and marks the plan `deleted`. Each tenant is handled in
/// its own try/catch so one failure never blocks the rest of the sweep.
#[derive(Clone)]
pub struct ExpiredTenantSweeperWorker {
    pool: DbPool,
    plan_repo: PlanRepository,
    user_repo: UserRepository,
    device_repo: DeviceRepository,
    chunk_repo: ChunkRepository,
    layout: Arc<DataLayout>,
    interval_secs: u64,
    metrics: Metrics,
}

impl std::fmt::Debug for ExpiredTenantSweeperWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiredTenantSweeperWorker").field("interval_secs", &self.interval_secs).finish_non_exhaustive()
    }
}

impl ExpiredTenantSweeperWorker {
    #[must_use]
    pub fn new(
        pool: DbPool,
        plan_repo: PlanRepository,
        user_repo: UserRepository,
        device_repo: DeviceRepository,
        chunk_repo: ChunkRepository,
        layout: Arc<DataLayout>,
        interval_secs: u64,
    ) -> Self {
        Self { pool, plan_repo, user_repo, device_repo, chunk_repo, layout, interval_secs, metrics: Metrics::new() }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(StdDuration::from_secs(self.interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    async {
                        tracing::debug!("running expired-tenant sweep cycle");
                        match self.sweep().await {
                            Ok(count) if count > 0 => {
                                tracing::info!(tenants_deleted = count, "sweep cycle tombstoned tenants");
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::error!(error = %e, "sweep cycle failed");
                                self.metrics.errors.add(1, &[]);
                            }
                        }
                    }
                    .instrument(tracing::info_span!("run_expired_tenant_sweeper"))
                    .await;
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("expired-tenant sweeper loop shutting down");
    }

    #[tracing::instrument(err, skip(self))]
    async fn sweep(&self) -> Result<u64> {
        let now = now_millis();
        let mut conn = self.pool.acquire().await?;
        let candidates = self.plan_repo.fetch_transitionable(&mut conn, now, 200).await?;
        drop(conn);

        let mut deleted = 0;
        for plan in candidates {
            if plan.status != PlanStatus::Grace || plan.grace_until.is_none_or(|g| g > now) {
                continue;
            }
            match self.tombstone_tenant(plan.user_id).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::warn!(error = %e, user_id = plan.user_id, "failed to tombstone tenant, will retry next cycle");
                    self.metrics.errors.add(1, &[]);
                }
            }
        }

        self.metrics.tenants_deleted.add(deleted, &[]);
        Ok(deleted)
    }

    async fn tombstone_tenant(&self, user_id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        let mut keys: HashSet<String> = HashSet::new();
        keys.insert(sanitize_key(&user_id.to_string()));
        if let Some(user) = self.user_repo.find_by_id(&mut conn, user_id).await? {
            keys.insert(sanitize_key(&user.user_uuid.to_string()));
        }
        for device in self.device_repo.list_for_user(&mut conn, user_id).await? {
            keys.insert(sanitize_key(&device.device_uuid.to_string()));
        }

        for key in &keys {
            if key.is_empty() {
                continue;
            }
            let root = self.layout.tenant_root(key);
            match tokio::fs::remove_dir_all(&root).await {
                Ok(()) => tracing::debug!(key, "removed tenant directory"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.chunk_repo.delete_all_for_user(&mut conn, user_id).await?;

        let plan = self.plan_repo.find_by_user_id(&mut conn, user_id).await?;
        if let Some(plan) = plan {
            self.plan_repo
                .upsert_state(
                    &mut conn,
                    user_id,
                    plan.plan_gb,
                    &PlanStatus::Deleted.to_string(),
                    plan.trial_until,
                    plan.expires_at,
                    plan.grace_until,
                    Some(now_millis()),
                    plan.external_app_user_id.as_deref(),
                )
                .await?;
        }

        Ok(())
    }
}
