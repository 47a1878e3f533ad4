use crate::api::AppState;
use crate::api::schemas::auth::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use crate::error::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

/// Creates a new user and, when `planGb` is present and non-zero, starts a trial.
///
/// # Errors
/// Returns `AppError::Conflict` if the normalized email is already registered.
pub async fn register(State(state): State<AppState>, Json(payload): Json<RegisterRequest>) -> Result<impl IntoResponse> {
    let user = state.credential_service.register(&payload.email, &payload.password, payload.plan_gb).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id: user.id, email: user.email })))
}

/// Verifies credentials and mints a device-bound session token.
///
/// # Errors
/// Returns `AppError::Unauthorized` if the email/password pair is invalid.
pub async fn login(State(state): State<AppState>, Json(payload): Json<LoginRequest>) -> Result<impl IntoResponse> {
    let (session, _device) = state
        .credential_service
        .login(&payload.email, &payload.password, payload.device_uuid, payload.device_name.as_deref())
        .await?;
    Ok(Json(LoginResponse { token: session.token, user_id: session.user_id }))
}
