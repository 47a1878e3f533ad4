use crate::api::{AppState, no_store_header};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

/// Serves the worker-written capacity report verbatim, across `/api/capacity`
/// and the two `.well-known/*-capacity.json` aliases. 404 when the worker
/// hasn't produced a report yet (e.g. immediately after a fresh boot).
pub async fn capacity(State(state): State<AppState>) -> Response {
    match tokio::fs::read(&state.layout.capacity_file).await {
        Ok(bytes) => {
            let mut response = (StatusCode::OK, bytes).into_response();
            response.headers_mut().insert(header::CONTENT_TYPE, "application/json".parse().expect("valid content-type"));
            response.headers_mut().insert(header::CACHE_CONTROL, no_store_header());
            response
        }
        Err(_) => {
            let mut response = StatusCode::NOT_FOUND.into_response();
            response.headers_mut().insert(header::CACHE_CONTROL, no_store_header());
            response
        }
    }
}
