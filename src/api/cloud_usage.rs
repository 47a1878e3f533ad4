use crate::adapters::paths::{disk_free_bytes, tenant_key};
use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::cloud_usage::CloudUsageResponse;
use crate::api::schemas::subscription::SubscriptionStatusResponse;
use crate::error::Result;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

/// Reports quota headroom and server-wide free space for the caller's
/// StealthCloud tenant. Never subscription-gated: a user must be able to see
/// why they are blocked even when blocked.
///
/// # Errors
/// Returns `AppError::NotFound` if the user has no plan row.
pub async fn usage(auth: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    let plan_bytes = resolved.plan_gb.map_or(0, |gb| gb.saturating_mul(1_000_000_000));
    let margin_bytes = state.quota_config.user_quota_margin_bytes;

    let key = tenant_key(&auth.device_uuid, &auth.user_uuid.to_string(), auth.user_id);
    let used_bytes = state.cloud_store_service.used_bytes(auth.user_id).await? + state.quota_service.reserved_bytes(auth.user_id);

    let quota_bytes = if plan_bytes > 0 { plan_bytes + margin_bytes } else { 0 };
    let remaining_bytes = if plan_bytes > 0 { (plan_bytes - used_bytes).max(0) } else { i64::MAX };

    let root = state.layout.tenant_root(&key);
    let server_free_bytes = disk_free_bytes(&root).unwrap_or(0);

    Ok(Json(CloudUsageResponse {
        plan_gb: resolved.plan_gb,
        quota_bytes,
        used_bytes,
        remaining_bytes,
        margin_bytes,
        subscription: SubscriptionStatusResponse::from(&resolved),
        server_free_bytes,
    }))
}
