use crate::adapters::database::DbPool;
use crate::config::HealthConfig;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("photosync-server");
        Self {
            status: meter
                .i64_gauge("photosync_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Backs `/readyz`: a database reachability check and a disk-free check on
/// the cloud storage root, each under its own timeout.
#[derive(Clone, Debug)]
pub struct HealthService {
    pool: DbPool,
    cloud_root: PathBuf,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(pool: DbPool, cloud_root: PathBuf, config: HealthConfig) -> Self {
        Self { pool, cloud_root, config, metrics: Metrics::new() }
    }

    /// Checks database connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the database is unreachable.
    pub async fn check_db(&self) -> Result<(), String> {
        let db_timeout = Duration::from_millis(self.config.db_timeout_ms);

        match timeout(db_timeout, sqlx::query("SELECT 1").execute(&self.pool)).await {
            Ok(Ok(_)) => {
                self.metrics.status.record(1, &[KeyValue::new("component", "database")]);
                Ok(())
            }
            Ok(Err(e)) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "database")]);
                Err(format!("database connection failed: {e}"))
            }
            Err(_) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "database")]);
                Err("database connection timed out".to_string())
            }
        }
    }

    /// Checks that the cloud storage root has free space, via an OS
    /// filesystem-statistics call run on a blocking thread.
    ///
    /// # Errors
    /// Returns a string describing the failure if the disk is unreachable or full.
    pub async fn check_disk(&self) -> Result<(), String> {
        let disk_timeout = Duration::from_millis(self.config.disk_timeout_ms);
        let root = self.cloud_root.clone();

        let probe = tokio::task::spawn_blocking(move || crate::adapters::paths::disk_free_bytes(&root));

        match timeout(disk_timeout, probe).await {
            Ok(Ok(Ok(free))) if free > 0 => {
                self.metrics.status.record(1, &[KeyValue::new("component", "disk")]);
                Ok(())
            }
            Ok(Ok(Ok(_))) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "disk")]);
                Err("cloud storage root has no free space".to_string())
            }
            Ok(Ok(Err(e))) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "disk")]);
                Err(format!("disk statistics unavailable: {e}"))
            }
            Ok(Err(e)) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "disk")]);
                Err(format!("disk check task failed: {e}"))
            }
            Err(_) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "disk")]);
                Err("disk check timed out".to_string())
            }
        }
    }
}

