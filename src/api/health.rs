use crate::api::MgmtState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

/// Liveness probe: returns 200 OK as long as the server is running.
pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe: checks database connectivity and free space on the
/// cloud storage root.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let (db_res, disk_res) = tokio::join!(state.health_service.check_db(), state.health_service.check_disk());

    let mut status_code = StatusCode::OK;
    let db_status = if let Err(e) = db_res {
        tracing::warn!(error = %e, component = "database", "readiness probe failed");
        status_code = StatusCode::SERVICE_UNAVAILABLE;
        "error"
    } else {
        "ok"
    };

    let disk_status = if let Err(e) = disk_res {
        tracing::warn!(error = %e, component = "disk", "readiness probe failed");
        status_code = StatusCode::SERVICE_UNAVAILABLE;
        "error"
    } else {
        "ok"
    };

    (
        status_code,
        Json(json!({
            "status": if status_code == StatusCode::OK { "ok" } else { "error" },
            "database": db_status,
            "disk": disk_status,
        })),
    )
}
