use crate::domain::plan::PlanStatus;
use crate::services::subscription_service::ResolvedSubscription;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusResponse {
    pub allowed: bool,
    pub status: PlanStatus,
    pub plan_gb: Option<i64>,
    pub expires_at: Option<i64>,
    pub grace_until: Option<i64>,
    pub trial_until: Option<i64>,
    pub deleted_at: Option<i64>,
}

impl From<&ResolvedSubscription> for SubscriptionStatusResponse {
    fn from(resolved: &ResolvedSubscription) -> Self {
        Self {
            allowed: resolved.allowed_read,
            status: resolved.status,
            plan_gb: resolved.plan_gb,
            expires_at: resolved.expires_at,
            grace_until: resolved.grace_until,
            trial_until: resolved.trial_until,
            deleted_at: resolved.deleted_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueCatWebhookRequest {
    pub external_app_user_id: String,
    pub status: String,
    pub plan_gb: Option<i64>,
    pub expires_at: Option<i64>,
    pub grace_until: Option<i64>,
}
