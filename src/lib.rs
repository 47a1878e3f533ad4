#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::database::DbPool;
use crate::adapters::database::chunk_repo::ChunkRepository;
use crate::adapters::database::device_repo::DeviceRepository;
use crate::adapters::database::device_state_repo::DeviceStateRepository;
use crate::adapters::database::file_repo::FileRepository;
use crate::adapters::database::plan_repo::PlanRepository;
use crate::adapters::database::user_repo::UserRepository;
use crate::adapters::paths::DataLayout;
use crate::adapters::storage::{LocalFsStorage, ObjectStorage};
use crate::api::AppState;
use crate::config::Config;
use crate::services::classic_store_service::ClassicStoreService;
use crate::services::cloud_store_service::CloudStoreService;
use crate::services::credential_service::CredentialService;
use crate::services::health_service::HealthService;
use crate::services::quota_service::QuotaService;
use crate::services::rate_limit_service::RateLimitService;
use crate::services::subscription_service::SubscriptionService;
use crate::workers::{CapacityReporterWorker, ExpiredTenantSweeperWorker, UsageReconcilerWorker};
use std::sync::Arc;
use tokio::sync::watch;

/// The fully wired application: request-handling state plus the three
/// background workers, ready to be handed to their respective routers and
/// `tokio::spawn` calls.
pub struct App {
    pub state: AppState,
    pub health_service: HealthService,
    pub workers: Workers,
}

#[derive(Debug)]
pub struct Workers {
    pub capacity_reporter: CapacityReporterWorker,
    pub expired_tenant_sweeper: ExpiredTenantSweeperWorker,
    pub usage_reconciler: UsageReconcilerWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut tasks = Vec::new();

        let capacity_reporter = self.capacity_reporter;
        let capacity_rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            capacity_reporter.run(capacity_rx).await;
        }));

        let expired_tenant_sweeper = self.expired_tenant_sweeper;
        let sweeper_rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            expired_tenant_sweeper.run(sweeper_rx).await;
        }));

        let usage_reconciler = self.usage_reconciler;
        let reconciler_rx = shutdown_rx;
        tasks.push(tokio::spawn(async move {
            usage_reconciler.run(reconciler_rx).await;
        }));

        tasks
    }
}

/// Builder for constructing and wiring the application object graph.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
    layout: Option<Arc<DataLayout>>,
    shutdown_rx: Option<watch::Receiver<bool>>,
}

impl AppBuilder {
    /// Creates a new builder with the provided configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, pool: None, layout: None, shutdown_rx: None }
    }

    /// Sets the database connection pool.
    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Sets the resolved data layout.
    #[must_use]
    pub fn with_layout(mut self, layout: Arc<DataLayout>) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Sets the shutdown receiver for coordinating graceful exit.
    #[must_use]
    pub fn with_shutdown_rx(mut self, rx: watch::Receiver<bool>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Builds the application components by wiring all services and repositories.
    ///
    /// # Errors
    /// Returns an error if mandatory dependencies (pool, layout) are missing.
    #[tracing::instrument(skip(self))]
    pub async fn initialize(self) -> anyhow::Result<App> {
        let pool = self.pool.ok_or_else(|| anyhow::anyhow!("database pool is required"))?;
        let layout = self.layout.ok_or_else(|| anyhow::anyhow!("data layout is required"))?;
        let _shutdown_rx = self.shutdown_rx.ok_or_else(|| anyhow::anyhow!("shutdown receiver is required"))?;

        let config = &self.config;

        // Initialize repositories
        let user_repo = UserRepository::new();
        let device_repo = DeviceRepository::new();
        let plan_repo = PlanRepository::new();
        let file_repo = FileRepository::new();
        let chunk_repo = ChunkRepository::new();
        let device_state_repo = DeviceStateRepository::new();

        // Initialize storage adapter
        let storage: Arc<dyn ObjectStorage> = Arc::new(LocalFsStorage);

        // Initialize core services
        let credential_service = CredentialService::new(
            pool.clone(),
            user_repo.clone(),
            device_repo.clone(),
            plan_repo.clone(),
            config.auth.clone(),
            config.subscription.clone(),
        );
        let subscription_service = SubscriptionService::new(pool.clone(), plan_repo.clone(), config.subscription.clone());
        let quota_service = QuotaService::new();
        let classic_store_service = ClassicStoreService::new(pool.clone(), file_repo, Arc::clone(&layout));
        let cloud_store_service =
            CloudStoreService::new(pool.clone(), chunk_repo.clone(), device_state_repo, Arc::clone(&layout), quota_service.clone());
        let rate_limit_service = RateLimitService::new();
        let health_service = HealthService::new(pool.clone(), layout.cloud.clone(), config.health.clone());

        let state = AppState {
            pool: pool.clone(),
            credential_service,
            subscription_service,
            quota_service,
            classic_store_service,
            cloud_store_service,
            rate_limit_service,
            storage,
            layout: Arc::clone(&layout),
            auth_config: config.auth.clone(),
            quota_config: config.quota.clone(),
        };

        let workers = Workers {
            capacity_reporter: CapacityReporterWorker::new(
                pool.clone(),
                plan_repo.clone(),
                Arc::clone(&layout),
                config.workers.capacity_report_interval_secs,
            ),
            expired_tenant_sweeper: ExpiredTenantSweeperWorker::new(
                pool.clone(),
                plan_repo,
                user_repo,
                device_repo.clone(),
                chunk_repo.clone(),
                Arc::clone(&layout),
                config.workers.sweeper_interval_secs,
            ),
            usage_reconciler: UsageReconcilerWorker::new(
                pool,
                UserRepository::new(),
                device_repo,
                chunk_repo,
                layout,
                config.workers.reconciler_interval_secs,
            ),
        };

        Ok(App { state, health_service, workers })
    }
}

/// Runs database migrations.
///
/// # Errors
/// Returns an error if migrations fail.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::migrate!().run(pool).await.map_err(Into::into)
}

/// Sets up a panic hook that logs the panic message and location.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info.payload();
        let msg = payload
            .downcast_ref::<&str>()
            .map_or_else(|| payload.downcast_ref::<String>().map_or_else(|| "Box<Any>", String::as_str), |s| *s);

        let location = panic_info.location().map_or_else(
            || "unknown".to_string(),
            |location| format!("{}:{}:{}", location.file(), location.line(), location.column()),
        );

        tracing::error!(
            panic.message = %msg,
            panic.location = %location,
            "application panicked"
        );
    }));
}

/// Returns a future that completes when a termination signal is received.
///
/// # Panics
/// Panics if the signal handlers cannot be installed.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received, starting graceful shutdown");
}

/// Spawns a task that listens for OS signals and broadcasts a shutdown signal.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });
}
