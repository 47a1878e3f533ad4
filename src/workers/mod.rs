pub mod capacity_reporter;
pub mod expired_tenant_sweeper;
pub mod usage_reconciler;

pub use capacity_reporter::CapacityReporterWorker;
pub use expired_tenant_sweeper::ExpiredTenantSweeperWorker;
pub use usage_reconciler::UsageReconcilerWorker;
