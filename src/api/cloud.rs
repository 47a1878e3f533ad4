use crate::adapters::paths::{sanitize_key, tenant_key};
use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::cloud::{
    ChunkStoredResponse, ManifestListEntryDto, ManifestListResponse, ManifestUploadRequest, PurgeCloudResponse,
};
use crate::domain::chunk::is_valid_chunk_id;
use crate::error::{AppError, Result};
use crate::services::subscription_service::SubscriptionService;
use axum::Json;
use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    offset: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    100
}

/// The tenant-key candidates a caller's data could be filed under from an
/// earlier session (sanitized user uuid, sanitized integer id), excluding
/// whichever one `tenant_key` picked as current.
fn legacy_tenant_keys(current_key: &str, user_uuid: &str, user_id: i64) -> Vec<String> {
    [sanitize_key(user_uuid), sanitize_key(&user_id.to_string())]
        .into_iter()
        .filter(|key| !key.is_empty() && key != current_key)
        .collect()
}

/// Uploads a StealthCloud ciphertext chunk, dispatched by content type:
/// `application/octet-stream` is read as the raw body with `X-Chunk-Id`;
/// anything else is consumed as a multipart field named `chunk`, with the id
/// taken from the `chunkId` field if present and valid. Both paths converge
/// on the same hash verification and quota-reservation logic.
///
/// # Errors
/// Returns `AppError::BadRequest` on a malformed id or hash mismatch,
/// `AppError::PayloadTooLarge` if the quota reservation is denied.
pub async fn upload_chunk(auth: AuthUser, State(state): State<AppState>, request: Request) -> Result<impl IntoResponse> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    SubscriptionService::gate_upload(&resolved)?;

    let is_octet_stream = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/octet-stream"));

    let (chunk_id, bytes) = if is_octet_stream {
        let declared_id = request
            .headers()
            .get("x-chunk-id")
            .ok_or_else(|| AppError::BadRequest("missing X-Chunk-Id header".into()))?
            .to_str()
            .map_err(|_| AppError::BadRequest("invalid X-Chunk-Id header".into()))?
            .to_string();
        if !is_valid_chunk_id(&declared_id) {
            return Err(AppError::BadRequest("invalid chunk id".into()));
        }
        let body = axum::body::to_bytes(request.into_body(), usize::MAX).await.map_err(|e| AppError::BadRequest(e.to_string()))?;
        let digest = hex::encode(Sha256::digest(&body));
        if digest != declared_id {
            return Err(AppError::BadRequest("chunk hash mismatch".into()));
        }
        (declared_id, body.to_vec())
    } else {
        let mut multipart = Multipart::from_request(request, &state).await.map_err(|e| AppError::BadRequest(e.to_string()))?;
        let mut requested_id = None;
        let mut bytes = Vec::new();
        while let Some(field) = multipart.next_field().await.map_err(|e| AppError::BadRequest(e.to_string()))? {
            match field.name() {
                Some("chunkId") => requested_id = Some(field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?),
                Some("chunk") => bytes = field.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?.to_vec(),
                _ => {}
            }
        }
        let digest = hex::encode(Sha256::digest(&bytes));
        let chunk_id = match requested_id {
            Some(id) if is_valid_chunk_id(&id) => id,
            _ => digest.clone(),
        };
        if chunk_id != digest {
            return Err(AppError::BadRequest("chunk hash mismatch".into()));
        }
        (chunk_id, bytes)
    };

    let key = tenant_key(&auth.device_uuid, &auth.user_uuid.to_string(), auth.user_id);
    if state.cloud_store_service.chunk_exists(&key, &chunk_id).await? {
        return Ok(Json(ChunkStoredResponse { stored: true }));
    }

    let plan_bytes = resolved.plan_gb.map_or(0, |gb| gb.saturating_mul(1_000_000_000));
    let used_bytes = state.cloud_store_service.used_bytes(auth.user_id).await?;
    let margin = state.quota_config.user_quota_margin_bytes;
    let guard = state.quota_service.reserve(auth.user_id, plan_bytes, used_bytes, bytes.len() as i64, margin).await?;

    let legacy_keys = legacy_tenant_keys(&key, &auth.user_uuid.to_string(), auth.user_id);
    state.cloud_store_service.store_chunk(auth.user_id, &key, &legacy_keys, &chunk_id, &bytes).await?;
    drop(guard);

    Ok(Json(ChunkStoredResponse { stored: true }))
}

/// Streams a StealthCloud ciphertext chunk to the client.
///
/// # Errors
/// Returns `AppError::BadRequest` on a malformed id, `AppError::NotFound` if absent.
pub async fn download_chunk(auth: AuthUser, State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    SubscriptionService::gate_read(&resolved)?;

    let key = tenant_key(&auth.device_uuid, &auth.user_uuid.to_string(), auth.user_id);
    let path = state.cloud_store_service.resolve_chunk_path(&key, &id).await?;
    let (size, stream) = state.storage.get(&path).await.map_err(super::classic::storage_error)?;

    let mut response = Response::new(Body::from_stream(stream));
    response.headers_mut().insert(header::CONTENT_TYPE, "application/octet-stream".parse().expect("valid content-type"));
    if let Ok(len) = size.to_string().parse() {
        response.headers_mut().insert(header::CONTENT_LENGTH, len);
    }
    Ok(response)
}

/// Writes an encrypted manifest envelope, keyed by a client-supplied manifest id.
///
/// # Errors
/// Returns `AppError::BadRequest` if the id sanitizes to empty or `chunkCount` is non-positive.
pub async fn upload_manifest(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ManifestUploadRequest>,
) -> Result<impl IntoResponse> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    SubscriptionService::gate_upload(&resolved)?;

    let key = tenant_key(&auth.device_uuid, &auth.user_uuid.to_string(), auth.user_id);
    let legacy_keys = legacy_tenant_keys(&key, &auth.user_uuid.to_string(), auth.user_id);
    let envelope = state
        .cloud_store_service
        .upload_manifest(auth.user_id, &key, &legacy_keys, &payload.manifest_id, payload.encrypted_manifest, payload.chunk_count)
        .await?;

    Ok(Json(serde_json::json!({ "manifestId": envelope.manifest_id })))
}

/// Lists the tenant's manifest ids, lexicographically sorted.
///
/// # Errors
/// Returns `AppError::Gone` if the tenant has been tombstoned.
pub async fn list_manifests(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Response> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    SubscriptionService::gate_read(&resolved)?;

    let key = tenant_key(&auth.device_uuid, &auth.user_uuid.to_string(), auth.user_id);
    let (entries, total) = state.cloud_store_service.list_manifests(&key, page.offset, page.limit).await?;
    let manifests: Vec<ManifestListEntryDto> = entries.into_iter().map(Into::into).collect();

    let body = ManifestListResponse { manifests, total, offset: page.offset, limit: page.limit };
    let mut response = Json(body).into_response();
    response.headers_mut().insert(header::CACHE_CONTROL, crate::api::no_store_header());
    Ok(response)
}

/// Fetches a single manifest envelope verbatim.
///
/// # Errors
/// Returns `AppError::BadRequest` on an unsanitizable id, `AppError::NotFound` if absent.
pub async fn fetch_manifest(auth: AuthUser, State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    SubscriptionService::gate_read(&resolved)?;

    let key = tenant_key(&auth.device_uuid, &auth.user_uuid.to_string(), auth.user_id);
    let envelope = state.cloud_store_service.fetch_manifest(&key, &id).await?;
    Ok(Json(envelope))
}

/// Reads the caller's opaque per-device sync-state blob.
///
/// # Errors
/// Returns `AppError::Gone` if the tenant has been tombstoned.
pub async fn get_device_state(auth: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    SubscriptionService::gate_read(&resolved)?;

    let state_row = state.cloud_store_service.get_device_state(auth.user_id, &auth.device_uuid).await?;
    let body = state_row.map_or_else(|| serde_json::json!({}), |row| {
        serde_json::from_str(&row.state_json).unwrap_or_else(|_| serde_json::json!({}))
    });
    Ok(Json(body))
}

/// Replaces the caller's opaque per-device sync-state blob.
///
/// # Errors
/// Returns `AppError::BadRequest` for non-object JSON, `AppError::PayloadTooLarge` over the 100 KiB cap.
pub async fn put_device_state(auth: AuthUser, State(state): State<AppState>, body: String) -> Result<impl IntoResponse> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    SubscriptionService::gate_read(&resolved)?;

    let row = state.cloud_store_service.put_device_state(auth.user_id, &auth.device_uuid, body).await?;
    Ok(Json(serde_json::json!({ "updatedAt": row.updated_at.unix_timestamp() })))
}

/// Deletes every chunk and manifest for the caller's tenant.
///
/// # Errors
/// Returns `AppError::Gone` if the tenant has already been tombstoned.
pub async fn purge(auth: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    SubscriptionService::gate_read(&resolved)?;

    let key = tenant_key(&auth.device_uuid, &auth.user_uuid.to_string(), auth.user_id);
    let chunks_deleted = state.cloud_store_service.purge(auth.user_id, &key).await?;
    Ok(Json(PurgeCloudResponse { chunks_deleted }))
}
