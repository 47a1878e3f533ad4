use crate::adapters::database::DbPool;
use crate::adapters::database::plan_repo::PlanRepository;
use crate::config::SubscriptionConfig;
use crate::domain::now_millis;
use crate::domain::plan::PlanStatus;
use crate::error::{AppError, Result};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// The resolved, client-facing view of a `UserPlan` row after any pending
/// state transitions have been applied.
#[derive(Debug, Clone)]
pub struct ResolvedSubscription {
    pub allowed_upload: bool,
    pub allowed_read: bool,
    pub status: PlanStatus,
    pub plan_gb: Option<i64>,
    pub expires_at: Option<i64>,
    pub grace_until: Option<i64>,
    pub trial_until: Option<i64>,
    pub deleted_at: Option<i64>,
}

/// Resolves plan status against wall-clock time and performs the monotone
/// forward transitions the data model promises: `trial` → `trial_expired`,
/// `active` → `grace` on expiry, `grace` → `grace_expired` on its own
/// deadline. Tenant data deletion itself is performed by the sweeper worker,
/// not here.
#[derive(Clone)]
pub struct SubscriptionService {
    pool: DbPool,
    plan_repo: PlanRepository,
    config: SubscriptionConfig,
}

impl SubscriptionService {
    #[must_use]
    pub fn new(pool: DbPool, plan_repo: PlanRepository, config: SubscriptionConfig) -> Self {
        Self { pool, plan_repo, config }
    }

    /// Resolves the current subscription state for a user, persisting any
    /// transitions triggered by the passage of time.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the user has no plan row.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, user_id: i64) -> Result<ResolvedSubscription> {
        let mut conn = self.pool.acquire().await?;
        let mut plan = self.plan_repo.find_by_user_id(&mut conn, user_id).await?.ok_or(AppError::NotFound)?;
        let now = now_millis();
        let mut mutated = false;

        if plan.status == PlanStatus::Trial && plan.trial_until.is_some_and(|t| t <= now) {
            plan.status = PlanStatus::TrialExpired;
            mutated = true;
        }

        if let Some(expires_at) = plan.expires_at
            && expires_at <= now
            && plan.grace_until.is_none()
        {
            plan.grace_until = Some(expires_at + self.config.subscription_grace_days * MILLIS_PER_DAY);
            plan.status = PlanStatus::Grace;
            mutated = true;
        }

        if plan.status == PlanStatus::Grace && plan.grace_until.is_some_and(|g| g <= now) {
            plan.status = PlanStatus::GraceExpired;
            mutated = true;
        }

        if mutated {
            plan = self
                .plan_repo
                .upsert_state(
                    &mut conn,
                    user_id,
                    plan.plan_gb,
                    &plan.status.to_string(),
                    plan.trial_until,
                    plan.expires_at,
                    plan.grace_until,
                    plan.deleted_at,
                    plan.external_app_user_id.as_deref(),
                )
                .await?;
        }

        Ok(ResolvedSubscription {
            allowed_upload: matches!(plan.status, PlanStatus::Active | PlanStatus::Trial),
            allowed_read: plan.status != PlanStatus::Deleted,
            status: plan.status,
            plan_gb: plan.plan_gb,
            expires_at: plan.expires_at,
            grace_until: plan.grace_until,
            trial_until: plan.trial_until,
            deleted_at: plan.deleted_at,
        })
    }

    /// Gates an upload-class endpoint, returning the machine error code a
    /// client renders a paywall from.
    ///
    /// # Errors
    /// Returns `AppError::Gone` or `AppError::PaymentRequired` when not admitted.
    pub fn gate_upload(resolved: &ResolvedSubscription) -> Result<()> {
        if resolved.allowed_upload {
            return Ok(());
        }
        match resolved.status {
            PlanStatus::Deleted => Err(AppError::Gone),
            PlanStatus::TrialExpired => Err(AppError::PaymentRequired { code: "TRIAL_EXPIRED" }),
            PlanStatus::Grace | PlanStatus::GraceExpired => Err(AppError::PaymentRequired { code: "SUBSCRIPTION_EXPIRED" }),
            PlanStatus::None | PlanStatus::Active | PlanStatus::Trial => {
                Err(AppError::PaymentRequired { code: "SUBSCRIPTION_REQUIRED" })
            }
        }
    }

    /// Gates a read-class endpoint: everything short of tombstoning is admitted.
    ///
    /// # Errors
    /// Returns `AppError::Gone` once the tenant has been tombstoned.
    pub fn gate_read(resolved: &ResolvedSubscription) -> Result<()> {
        if resolved.allowed_read { Ok(()) } else { Err(AppError::Gone) }
    }

    /// Applies an external subscription event (e.g. a `RevenueCat` webhook),
    /// keyed by the external app-user id bound at login.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if no plan is bound to that external id.
    #[tracing::instrument(skip(self))]
    pub async fn apply_external_event(
        &self,
        external_app_user_id: &str,
        status: &str,
        plan_gb: Option<i64>,
        expires_at: Option<i64>,
        grace_until: Option<i64>,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let plan = self
            .plan_repo
            .find_by_external_app_user_id(&mut conn, external_app_user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        self.plan_repo
            .upsert_state(
                &mut conn,
                plan.user_id,
                plan_gb.or(plan.plan_gb),
                status,
                plan.trial_until,
                expires_at,
                grace_until,
                plan.deleted_at,
                Some(external_app_user_id),
            )
            .await?;

        tracing::info!(user.id = plan.user_id, status, "applied external subscription event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(status: PlanStatus) -> ResolvedSubscription {
        ResolvedSubscription {
            allowed_upload: matches!(status, PlanStatus::Active | PlanStatus::Trial),
            allowed_read: status != PlanStatus::Deleted,
            status,
            plan_gb: Some(100),
            expires_at: None,
            grace_until: None,
            trial_until: None,
            deleted_at: None,
        }
    }

    #[test]
    fn upload_gate_codes_match_spec() {
        assert!(SubscriptionService::gate_upload(&resolved(PlanStatus::Active)).is_ok());
        assert!(SubscriptionService::gate_upload(&resolved(PlanStatus::Trial)).is_ok());
        assert!(matches!(
            SubscriptionService::gate_upload(&resolved(PlanStatus::None)),
            Err(AppError::PaymentRequired { code: "SUBSCRIPTION_REQUIRED" })
        ));
        assert!(matches!(
            SubscriptionService::gate_upload(&resolved(PlanStatus::TrialExpired)),
            Err(AppError::PaymentRequired { code: "TRIAL_EXPIRED" })
        ));
        assert!(matches!(SubscriptionService::gate_upload(&resolved(PlanStatus::Deleted)), Err(AppError::Gone)));
    }

    #[test]
    fn read_gate_only_blocks_deleted() {
        assert!(SubscriptionService::gate_read(&resolved(PlanStatus::GraceExpired)).is_ok());
        assert!(matches!(SubscriptionService::gate_read(&resolved(PlanStatus::Deleted)), Err(AppError::Gone)));
    }
}
