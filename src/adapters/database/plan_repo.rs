use crate::adapters::database::records::PlanRecord;
use crate::domain::plan::UserPlan;
use crate::error::Result;
use sqlx::SqliteConnection;

#[derive(Clone, Debug, Default)]
pub struct PlanRepository {}

impl PlanRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Finds the plan row for a user.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_user_id(&self, conn: &mut SqliteConnection, user_id: i64) -> Result<Option<UserPlan>> {
        let record = sqlx::query_as::<_, PlanRecord>("SELECT * FROM user_plans WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(conn)
            .await?;

        Ok(record.map(Into::into))
    }

    /// Creates the default "none" plan row for a freshly registered user.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn create_default(&self, conn: &mut SqliteConnection, user_id: i64) -> Result<UserPlan> {
        let record = sqlx::query_as::<_, PlanRecord>(
            r"
            INSERT INTO user_plans (user_id, status)
            VALUES (?, 'none')
            ON CONFLICT (user_id) DO UPDATE SET user_id = excluded.user_id
            RETURNING *
            ",
        )
        .bind(user_id)
        .fetch_one(conn)
        .await?;

        Ok(record.into())
    }

    /// Overwrites the full plan state for a user, as driven by the subscription
    /// resolver or a webhook ingestion.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn upsert_state(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        plan_gb: Option<i64>,
        status: &str,
        trial_until: Option<i64>,
        expires_at: Option<i64>,
        grace_until: Option<i64>,
        deleted_at: Option<i64>,
        external_app_user_id: Option<&str>,
    ) -> Result<UserPlan> {
        let record = sqlx::query_as::<_, PlanRecord>(
            r"
            INSERT INTO user_plans (user_id, plan_gb, status, trial_until, expires_at, grace_until, deleted_at, external_app_user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                plan_gb = excluded.plan_gb,
                status = excluded.status,
                trial_until = excluded.trial_until,
                expires_at = excluded.expires_at,
                grace_until = excluded.grace_until,
                deleted_at = excluded.deleted_at,
                external_app_user_id = excluded.external_app_user_id
            RETURNING *
            ",
        )
        .bind(user_id)
        .bind(plan_gb)
        .bind(status)
        .bind(trial_until)
        .bind(expires_at)
        .bind(grace_until)
        .bind(deleted_at)
        .bind(external_app_user_id)
        .fetch_one(conn)
        .await?;

        Ok(record.into())
    }

    /// Finds a plan by the payment provider's external app-user id, used when
    /// ingesting subscription webhooks.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_external_app_user_id(
        &self,
        conn: &mut SqliteConnection,
        external_app_user_id: &str,
    ) -> Result<Option<UserPlan>> {
        let record = sqlx::query_as::<_, PlanRecord>("SELECT * FROM user_plans WHERE external_app_user_id = ?")
            .bind(external_app_user_id)
            .fetch_optional(conn)
            .await?;

        Ok(record.map(Into::into))
    }

    /// Sums committed capacity (plan_gb in bytes) across every plan not yet
    /// tombstoned, for the capacity reporter's allocation-budget test.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn sum_committed_plan_gb(&self, conn: &mut SqliteConnection) -> Result<i64> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT SUM(plan_gb) FROM user_plans WHERE status != 'deleted' AND plan_gb IS NOT NULL")
                .fetch_one(conn)
                .await?;

        Ok(total.unwrap_or(0))
    }

    /// Fetches every plan row in `grace` or `trial` state whose deadline has
    /// elapsed, for the expired-tenant sweeper.
    ///
    /// # Errors
    /// Returns `sqlx::Error` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn fetch_transitionable(
        &self,
        conn: &mut SqliteConnection,
        now_millis: i64,
        limit: i64,
    ) -> Result<Vec<UserPlan>> {
        let records = sqlx::query_as::<_, PlanRecord>(
            r"
            SELECT * FROM user_plans
            WHERE (status = 'trial' AND trial_until < ?)
               OR (status = 'active' AND expires_at < ?)
               OR (status = 'grace' AND grace_until < ?)
            LIMIT ?
            ",
        )
        .bind(now_millis)
        .bind(now_millis)
        .bind(now_millis)
        .bind(limit)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }
}
