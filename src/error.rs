use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// A quota-denial detail attached to `PayloadTooLarge`, so the client can
/// render remaining headroom without a second round-trip.
#[derive(Debug, Clone, Copy)]
pub struct QuotaContext {
    pub quota_bytes: i64,
    pub used_bytes: i64,
    pub remaining_bytes: i64,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found")]
    NotFound,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Subscription data deleted")]
    Gone,
    #[error("Payment required: {code}")]
    PaymentRequired { code: &'static str },
    #[error("Payload too large: {code}")]
    PayloadTooLarge { code: &'static str, quota: QuotaContext },
    #[error("Too many requests")]
    TooManyRequests,
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Database(e) => {
                tracing::error!(error = %e, "database error");
                err_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None, &[])
            }
            Self::Io(e) => {
                tracing::error!(error = %e, "io error");
                err_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None, &[])
            }
            Self::Unauthorized => {
                tracing::debug!("unauthorized");
                err_response(StatusCode::UNAUTHORIZED, "Unauthorized", None, &[])
            }
            Self::Forbidden(msg) => {
                tracing::debug!(message = %msg, "forbidden");
                err_response(StatusCode::FORBIDDEN, &msg, None, &[])
            }
            Self::NotFound => err_response(StatusCode::NOT_FOUND, "Not found", None, &[]),
            Self::BadRequest(msg) => {
                tracing::debug!(message = %msg, "bad request");
                err_response(StatusCode::BAD_REQUEST, &msg, None, &[])
            }
            Self::Conflict(msg) => err_response(StatusCode::CONFLICT, &msg, None, &[]),
            Self::Gone => {
                err_response(StatusCode::GONE, "Subscription data deleted", Some("SUBSCRIPTION_DATA_DELETED"), &[])
            }
            Self::PaymentRequired { code } => {
                err_response(StatusCode::PAYMENT_REQUIRED, "Subscription required", Some(code), &[])
            }
            Self::PayloadTooLarge { code, quota } => err_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Quota exceeded",
                Some(code),
                &[
                    ("quotaBytes", quota.quota_bytes),
                    ("usedBytes", quota.used_bytes),
                    ("remainingBytes", quota.remaining_bytes),
                ],
            ),
            Self::TooManyRequests => err_response(StatusCode::TOO_MANY_REQUESTS, "Too many requests", None, &[]),
            Self::Internal => {
                tracing::error!("internal server error occurred");
                err_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None, &[])
            }
        }
    }
}

fn err_response(status: StatusCode, message: &str, code: Option<&str>, extra: &[(&str, i64)]) -> Response {
    let mut body = json!({ "error": message });
    if let Some(code) = code {
        body["code"] = json!(code);
    }
    if let Some(obj) = body.as_object_mut() {
        for (key, value) in extra {
            obj.insert((*key).to_string(), json!(value));
        }
    }
    (status, Json(body)).into_response()
}
