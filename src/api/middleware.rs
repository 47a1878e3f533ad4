use crate::api::AppState;
use crate::error::AppError;
use axum::extract::{FromRequestParts, Request};
use axum::http::{HeaderValue, header, request::Parts};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

/// The authenticated caller, resolved from `Authorization: Bearer <token>`
/// plus `X-Device-UUID`. Binding the device uuid at extraction time — not
/// just at login — is what makes a stolen token useless from any other
/// device.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub user_uuid: Uuid,
    pub email: String,
    pub device_uuid: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts.headers.get(header::AUTHORIZATION).ok_or(AppError::Unauthorized)?;
        let auth_str = auth_header.to_str().map_err(|_| AppError::Unauthorized)?;
        let token = auth_str.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;

        let device_header = parts
            .headers
            .get("x-device-uuid")
            .ok_or_else(|| AppError::BadRequest("missing X-Device-UUID header".into()))?;
        let device_uuid =
            device_header.to_str().map_err(|_| AppError::BadRequest("invalid X-Device-UUID header".into()))?;

        let claims = state.credential_service.verify_token(token)?;
        if claims.device_uuid != device_uuid {
            return Err(AppError::Forbidden("device uuid does not match session".into()));
        }

        Ok(Self {
            user_id: claims.sub,
            user_uuid: claims.user_uuid,
            email: claims.email,
            device_uuid: claims.device_uuid,
        })
    }
}

/// Verifies the `Authorization: Bearer <webhook secret>` header against the
/// configured `REVENUECAT_WEBHOOK_SECRET`, independent of user sessions.
pub struct WebhookAuth;

impl FromRequestParts<AppState> for WebhookAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = &state.auth_config.revenuecat_webhook_secret else {
            return Err(AppError::Unauthorized);
        };

        let auth_header = parts.headers.get(header::AUTHORIZATION).ok_or(AppError::Unauthorized)?;
        let auth_str = auth_header.to_str().map_err(|_| AppError::Unauthorized)?;
        let token = auth_str.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;

        if token != expected {
            return Err(AppError::Unauthorized);
        }

        Ok(Self)
    }
}

/// Adds the fixed set of security headers to every response, ahead of CORS
/// in the middleware stack's admission order.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}
