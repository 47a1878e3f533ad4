use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::classic::{FileEntry, FileListResponse, PurgeResponse, UploadResponse};
use crate::error::{AppError, Result};
use crate::services::subscription_service::SubscriptionService;
use axum::Json;
use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

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

/// Receives a whole file as a multipart part, hashes it, and dedups against
/// the tenant's index by filename or content hash.
///
/// # Errors
/// Returns `AppError::PaymentRequired`/`Gone` if the subscription gate denies
/// upload, `AppError::BadRequest` if no file part is present.
pub async fn upload_multipart(
    auth: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    SubscriptionService::gate_upload(&resolved)?;

    let mut filename = None;
    let mut mime = None;
    let mut bytes = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::BadRequest(e.to_string()))? {
        if field.name() != Some("file") {
            continue;
        }
        filename = field.file_name().map(str::to_string);
        mime = field.content_type().map(str::to_string);
        bytes = field.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?.to_vec();
    }

    let filename = filename.ok_or_else(|| AppError::BadRequest("missing file part".into()))?;
    let file_hash = hex::encode(Sha256::digest(&bytes));
    let size = bytes.len() as i64;

    let dir = state.layout.device_upload_dir(&auth.device_uuid);
    tokio::fs::create_dir_all(&dir).await?;
    let tmp_path = dir.join(format!(".{file_hash}.uploading"));
    tokio::fs::write(&tmp_path, &bytes).await?;

    let outcome = state
        .classic_store_service
        .ingest(auth.user_id, &auth.device_uuid, &filename, mime.as_deref(), size, &file_hash, &tmp_path)
        .await?;

    Ok(Json(UploadResponse { duplicate: outcome.duplicate, filename: outcome.filename, size: outcome.size as u64 }))
}

/// Receives a whole file as a streamed body, hashing incrementally while
/// writing to a temp file, then dedups exactly as the multipart path does.
///
/// # Errors
/// Returns `AppError::BadRequest` if `X-Filename` is absent, subscription/IO
/// errors as above.
pub async fn upload_raw(
    auth: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    SubscriptionService::gate_upload(&resolved)?;

    let filename = headers
        .get("x-filename")
        .ok_or_else(|| AppError::BadRequest("missing X-Filename header".into()))?
        .to_str()
        .map_err(|_| AppError::BadRequest("invalid X-Filename header".into()))?
        .to_string();
    let mime = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_string);

    let dir = state.layout.device_upload_dir(&auth.device_uuid);
    tokio::fs::create_dir_all(&dir).await?;
    let tmp_path = dir.join(format!(".{}.uploading", uuid::Uuid::new_v4()));

    let mut file = tokio::fs::File::create(&tmp_path).await?;
    let mut hasher = Sha256::new();
    let mut size: i64 = 0;
    let mut stream = body.into_data_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(AppError::BadRequest(e.to_string()));
            }
        };
        hasher.update(&chunk);
        size += chunk.len() as i64;
        if let Err(e) = file.write_all(&chunk).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
    }
    if let Err(e) = file.flush().await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    drop(file);

    let file_hash = hex::encode(hasher.finalize());
    let outcome = state
        .classic_store_service
        .ingest(auth.user_id, &auth.device_uuid, &filename, mime.as_deref(), size, &file_hash, &tmp_path)
        .await?;

    Ok(Json(UploadResponse { duplicate: outcome.duplicate, filename: outcome.filename, size: outcome.size as u64 }))
}

/// Lists the tenant's classic files, lexicographic by filename.
///
/// # Errors
/// Returns `AppError::Gone` if the tenant's data has been tombstoned.
pub async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    SubscriptionService::gate_read(&resolved)?;

    let (entries, total) = state.classic_store_service.list(&auth.device_uuid, page.offset, page.limit).await?;
    let files = entries
        .into_iter()
        .map(|e| FileEntry { filename: e.filename, size: e.size, modified_time: e.modified_time })
        .collect();

    Ok(Json(FileListResponse { files, total, offset: page.offset, limit: page.limit }))
}

/// Streams a single classic file to the client.
///
/// # Errors
/// Returns `AppError::NotFound` if the file does not exist, `AppError::Gone`
/// if the tenant has been tombstoned.
pub async fn download(auth: AuthUser, State(state): State<AppState>, Path(name): Path<String>) -> Result<Response> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    SubscriptionService::gate_read(&resolved)?;

    let path = state.classic_store_service.resolve_download_path(&auth.device_uuid, &name).await?;
    let (size, stream) = state.storage.get(&path).await.map_err(storage_error)?;

    let mut response = Response::new(Body::from_stream(stream));
    response.headers_mut().insert(header::CONTENT_TYPE, "application/octet-stream".parse().expect("valid content-type"));
    if let Ok(len) = size.to_string().parse() {
        response.headers_mut().insert(header::CONTENT_LENGTH, len);
    }
    Ok(response)
}

/// Deletes the tenant's entire classic upload directory and its index rows.
///
/// # Errors
/// Returns `AppError::Gone` if the tenant has been tombstoned.
pub async fn purge(auth: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let resolved = state.subscription_service.resolve(auth.user_id).await?;
    SubscriptionService::gate_read(&resolved)?;

    let deleted = state.classic_store_service.purge(auth.user_id, &auth.device_uuid).await?;
    Ok(Json(PurgeResponse { deleted }))
}

pub(super) fn storage_error(e: crate::adapters::storage::StorageError) -> AppError {
    match e {
        crate::adapters::storage::StorageError::NotFound => AppError::NotFound,
        crate::adapters::storage::StorageError::ExceedsLimit => AppError::BadRequest("size limit exceeded".into()),
        crate::adapters::storage::StorageError::Internal(msg) => {
            tracing::error!(error = msg, "storage error");
            AppError::Internal
        }
    }
}
