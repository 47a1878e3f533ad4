use crate::api::AppState;
use crate::api::middleware::{AuthUser, WebhookAuth};
use crate::api::schemas::subscription::{RevenueCatWebhookRequest, SubscriptionStatusResponse};
use crate::error::Result;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

/// Resolves and returns the caller's current subscription state.
///
/// # Errors
/// Returns `AppError::NotFound` if the user has no plan row.
pub async fn status(auth: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    Ok(Json(SubscriptionStatusResponse::from(&resolved)))
}

/// Ingests an external subscription event (e.g. from a payment provider),
/// authenticated by a shared bearer secret rather than a user session.
///
/// # Errors
/// Returns `AppError::NotFound` if no plan is bound to the external app-user id.
pub async fn webhook(
    _auth: WebhookAuth,
    State(state): State<AppState>,
    Json(payload): Json<RevenueCatWebhookRequest>,
) -> Result<impl IntoResponse> {
    state
        .subscription_service
        .apply_external_event(
            &payload.external_app_user_id,
            &payload.status,
            payload.plan_gb,
            payload.expires_at,
            payload.grace_until,
        )
        .await?;
    Ok(axum::http::StatusCode::OK)
}
