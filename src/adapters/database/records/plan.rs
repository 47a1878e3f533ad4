use crate::domain::plan::{PlanStatus, UserPlan};
use sqlx::FromRow;
use std::str::FromStr;

#[derive(Debug, FromRow)]
pub struct PlanRecord {
    pub user_id: i64,
    pub plan_gb: Option<i64>,
    pub status: String,
    pub trial_until: Option<i64>,
    pub expires_at: Option<i64>,
    pub grace_until: Option<i64>,
    pub deleted_at: Option<i64>,
    pub external_app_user_id: Option<String>,
}

impl From<PlanRecord> for UserPlan {
    fn from(record: PlanRecord) -> Self {
        Self {
            user_id: record.user_id,
            plan_gb: record.plan_gb,
            status: PlanStatus::from_str(&record.status).unwrap_or(PlanStatus::None),
            trial_until: record.trial_until,
            expires_at: record.expires_at,
            grace_until: record.grace_until,
            deleted_at: record.deleted_at,
            external_app_user_id: record.external_app_user_id,
        }
    }
}
