use crate::adapters::database::DbPool;
use crate::adapters::database::plan_repo::PlanRepository;
use crate::adapters::paths::{DataLayout, disk_free_bytes, disk_total_bytes};
use crate::api::schemas::capacity::{CapacityReport, TierCapacity};
use crate::domain::now_millis;
use crate::domain::plan::PLAN_TIERS_GB;
use crate::error::Result;
use opentelemetry::{global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::Instrument;

const BYTES_PER_GB: i64 = 1_000_000_000;
/// Fixed safety margin subtracted from free space and added to the
/// allocation budget before a tier is advertised as creatable.
const SAFETY_MARGIN_BYTES: i64 = 5 * BYTES_PER_GB;

#[derive(Clone, Debug)]
struct Metrics {
    runs: Counter<u64>,
    errors: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("photosync-server");
        Self {
            runs: meter
                .u64_counter("photosync_capacity_report_runs_total")
                .with_description("Total number of capacity report cycles completed")
                .build(),
            errors: meter
                .u64_counter("photosync_capacity_report_errors_total")
                .with_description("Total number of errors encountered writing the capacity report")
                .build(),
        }
    }
}

/// Periodically recomputes free/total disk space on the cloud storage root
/// and per-tier admission flags, writing the result atomically so readers of
/// `/api/capacity` never see a torn file.
#[derive(Clone)]
pub struct CapacityReporterWorker {
    pool: DbPool,
    plan_repo: PlanRepository,
    layout: Arc<DataLayout>,
    interval_secs: u64,
    metrics: Metrics,
}

impl std::fmt::Debug for CapacityReporterWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapacityReporterWorker").field("interval_secs", &self.interval_secs).finish_non_exhaustive()
    }
}

impl CapacityReporterWorker {
    #[must_use]
    pub fn new(pool: DbPool, plan_repo: PlanRepository, layout: Arc<DataLayout>, interval_secs: u64) -> Self {
        Self { pool, plan_repo, layout, interval_secs, metrics: Metrics::new() }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(StdDuration::from_secs(self.interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    async {
                        tracing::debug!("running capacity report cycle");
                        match self.write_report().await {
                            Ok(()) => self.metrics.runs.add(1, &[]),
                            Err(e) => {
                                tracing::error!(error = %e, "capacity report cycle failed");
                                self.metrics.errors.add(1, &[]);
                            }
                        }
                    }
                    .instrument(tracing::info_span!("run_capacity_reporter"))
                    .await;
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("capacity reporter loop shutting down");
    }

    #[tracing::instrument(err, skip(self))]
    async fn write_report(&self) -> Result<()> {
        let root = self.layout.cloud.clone();
        let (free_bytes, total_bytes) = tokio::task::spawn_blocking(move || (disk_free_bytes(&root), disk_total_bytes(&root)))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "disk stat task panicked");
                crate::error::AppError::Internal
            })?;
        let free_bytes = free_bytes.unwrap_or(0);
        let total_bytes = total_bytes.unwrap_or(0);

        let mut conn = self.pool.acquire().await?;
        let committed_gb = self.plan_repo.sum_committed_plan_gb(&mut conn).await?;
        let committed_bytes = committed_gb.saturating_mul(BYTES_PER_GB);

        let tiers = PLAN_TIERS_GB
            .iter()
            .map(|&plan_gb| {
                let tier_bytes = plan_gb.saturating_mul(BYTES_PER_GB);
                let free_space_ok = free_bytes as i64 > tier_bytes.saturating_add(SAFETY_MARGIN_BYTES);
                let allocation_ok = committed_bytes.saturating_add(tier_bytes).saturating_add(SAFETY_MARGIN_BYTES) <= total_bytes as i64;
                TierCapacity { plan_gb, can_create: free_space_ok && allocation_ok }
            })
            .collect();

        let report = CapacityReport { free_bytes, total_bytes, generated_at: now_millis(), tiers };
        let json = serde_json::to_vec_pretty(&report).map_err(|_| crate::error::AppError::Internal)?;

        let target = &self.layout.capacity_file;
        let tmp = target.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, target).await?;

        Ok(())
    }
}
