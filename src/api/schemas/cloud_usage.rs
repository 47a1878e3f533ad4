use crate::api::schemas::subscription::SubscriptionStatusResponse;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudUsageResponse {
    pub plan_gb: Option<i64>,
    pub quota_bytes: i64,
    pub used_bytes: i64,
    pub remaining_bytes: i64,
    pub margin_bytes: i64,
    pub subscription: SubscriptionStatusResponse,
    pub server_free_bytes: u64,
}
