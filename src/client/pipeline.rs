//! Orchestrates the dedup index build and the upload pipeline itself:
//! bounded worker pools for file uploads (~6), chunk uploads (~8), and the
//! initial manifest-fetch sweep (~10), all respecting a shared cancellation
//! flag, talking to the endpoints in the admission HTTP surface.

use crate::client::chunker::{EncryptedChunk, encrypt_chunks};
use crate::client::dedup::{CandidateAsset, DedupIndex, DedupOutcome, SkipReason};
use crate::client::exif::{extract_exif, normalize_capture_time};
use crate::client::keys::{FileSecret, MasterKey};
use crate::client::manifest::{SealedManifest, build_manifest, open_manifest, seal_manifest, stable_manifest_id};
use crate::client::phash::dhash;
use crate::client::retry::{is_retryable, retry_strategy};
use crate::client::{ClientError, Result};
use backon::Retryable;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Semaphore};

const MAX_CONCURRENT_FILES: usize = 6;
const MAX_CONCURRENT_CHUNKS: usize = 8;
const MAX_CONCURRENT_MANIFEST_FETCHES: usize = 10;

/// Per-run configuration, cloned into every spawned task. `master_key`
/// never leaves the device; it is only ever used locally to seal/open data.
#[derive(Clone)]
pub struct PipelineConfig {
    pub base_url: String,
    pub token: String,
    pub device_uuid: String,
    pub master_key: MasterKey,
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("base_url", &self.base_url)
            .field("device_uuid", &self.device_uuid)
            .finish_non_exhaustive()
    }
}

/// One local file queued for upload.
#[derive(Debug, Clone)]
pub struct LocalAsset {
    pub path: PathBuf,
    pub filename: String,
    pub media_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub filename: String,
    pub outcome: UploadOutcome,
}

/// Drives the client pipeline end to end: builds the dedup index from the
/// server's existing manifests, then uploads a batch of local assets against it.
pub struct Pipeline {
    config: PipelineConfig,
    http: Client,
    cancel: Arc<AtomicBool>,
    file_pool: Arc<Semaphore>,
    chunk_pool: Arc<Semaphore>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Pipeline {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            http: Client::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            file_pool: Arc::new(Semaphore::new(MAX_CONCURRENT_FILES)),
            chunk_pool: Arc::new(Semaphore::new(MAX_CONCURRENT_CHUNKS)),
        }
    }

    /// A shared flag the caller can flip to stop the pipeline at the next
    /// suspension point; in-flight chunk uploads finish best-effort.
    #[must_use]
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Pages through every manifest already on the server, decrypts each
    /// with `master_key`, and builds the initial dedup index from them.
    ///
    /// # Errors
    /// Returns an error if the manifest-list request fails.
    pub async fn build_dedup_index(&self) -> Result<DedupIndex> {
        let mut index = DedupIndex::new();
        let fetch_pool = Arc::new(Semaphore::new(MAX_CONCURRENT_MANIFEST_FETCHES));
        let ids = self.list_manifest_ids().await?;

        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            let permit = Arc::clone(&fetch_pool).acquire_owned().await.expect("fetch pool is never closed");
            let http = self.http.clone();
            let config = self.config.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                fetch_and_open_manifest(&http, &config, &id).await
            }));
        }

        for task in tasks {
            if let Ok(Ok(candidate)) = task.await {
                index.index(&candidate);
            }
        }

        Ok(index)
    }

    async fn list_manifest_ids(&self) -> Result<Vec<String>> {
        const PAGE_SIZE: usize = 500;
        let mut ids = Vec::new();
        let mut offset = 0usize;
        loop {
            let url = format!("{}/api/cloud/manifests?offset={offset}&limit={PAGE_SIZE}", self.config.base_url);
            let page: ManifestListResponse = self
                .http
                .get(url)
                .bearer_auth(&self.config.token)
                .header("X-Device-UUID", &self.config.device_uuid)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let got = page.manifests.len();
            ids.extend(page.manifests.into_iter().map(|m| m.manifest_id));
            offset += got;
            if got < PAGE_SIZE || offset >= page.total {
                break;
            }
        }
        Ok(ids)
    }

    /// Runs the dedup-and-upload pipeline over `assets`, bounded by the file
    /// worker pool, honoring cancellation at the next suspension point.
    /// `index` is shared so every file, including concurrently running
    /// ones, sees the others' successful uploads as soon as they land.
    pub async fn run(&self, assets: Vec<LocalAsset>, index: Arc<Mutex<DedupIndex>>) -> Vec<UploadResult> {
        let mut handles = Vec::with_capacity(assets.len());
        for asset in assets {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            let permit = Arc::clone(&self.file_pool).acquire_owned().await.expect("file pool is never closed");
            let http = self.http.clone();
            let config = self.config.clone();
            let chunk_pool = Arc::clone(&self.chunk_pool);
            let cancel = Arc::clone(&self.cancel);
            let index = Arc::clone(&index);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                upload_one(&http, &config, &chunk_pool, &cancel, &index, asset).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(result) = handle.await {
                results.push(result);
            }
        }
        results
    }
}

#[derive(serde::Deserialize)]
struct ManifestListResponse {
    manifests: Vec<ManifestListItem>,
    total: usize,
}

#[derive(serde::Deserialize)]
struct ManifestListItem {
    #[serde(rename = "manifestId")]
    manifest_id: String,
}

#[derive(serde::Deserialize)]
struct ManifestEnvelopeResponse {
    #[serde(rename = "encryptedManifest")]
    encrypted_manifest: String,
}

async fn fetch_and_open_manifest(http: &Client, config: &PipelineConfig, id: &str) -> Result<CandidateAsset> {
    let url = format!("{}/api/cloud/manifests/{}", config.base_url, id);
    let envelope: ManifestEnvelopeResponse = http
        .get(url)
        .bearer_auth(&config.token)
        .header("X-Device-UUID", &config.device_uuid)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let sealed = SealedManifest::from_wire(&envelope.encrypted_manifest)?;
    let manifest = open_manifest(&sealed, &config.master_key)?;
    Ok(CandidateAsset {
        manifest_id: manifest.asset_id,
        filename: manifest.filename,
        size: manifest.original_size,
        is_heic: manifest.media_type.eq_ignore_ascii_case("image/heic"),
        capture_time: manifest.exif_capture_time,
        exif_make: manifest.exif_make,
        exif_model: manifest.exif_model,
        perceptual_hash: manifest.perceptual_hash,
        file_hash: manifest.file_hash,
    })
}

async fn upload_one(
    http: &Client,
    config: &PipelineConfig,
    chunk_pool: &Arc<Semaphore>,
    cancel: &Arc<AtomicBool>,
    index: &Arc<Mutex<DedupIndex>>,
    asset: LocalAsset,
) -> UploadResult {
    match upload_one_inner(http, config, chunk_pool, cancel, index, &asset).await {
        Ok(outcome) => UploadResult { filename: asset.filename, outcome },
        Err(e) => UploadResult { filename: asset.filename, outcome: UploadOutcome::Failed(e.to_string()) },
    }
}

async fn upload_one_inner(
    http: &Client,
    config: &PipelineConfig,
    chunk_pool: &Arc<Semaphore>,
    cancel: &Arc<AtomicBool>,
    index: &Arc<Mutex<DedupIndex>>,
    asset: &LocalAsset,
) -> Result<UploadOutcome> {
    let plaintext = tokio::fs::read(&asset.path).await?;
    let size = plaintext.len() as u64;
    let exif = extract_exif(&plaintext);
    let capture_time = exif.capture_time.as_deref().and_then(normalize_capture_time);
    let perceptual_hash = if asset.media_type.starts_with("image/") { dhash(&plaintext, &exif).ok() } else { None };
    let file_hash = hex::encode(Sha256::digest(&plaintext));

    let candidate = CandidateAsset {
        manifest_id: stable_manifest_id(&asset.filename, size),
        filename: asset.filename.clone(),
        size,
        is_heic: asset.media_type.eq_ignore_ascii_case("image/heic"),
        capture_time: capture_time.clone(),
        exif_make: exif.make.clone(),
        exif_model: exif.model.clone(),
        perceptual_hash: perceptual_hash.clone(),
        file_hash: Some(file_hash.clone()),
    };

    let decision = index.lock().await.decide(&candidate);
    if let DedupOutcome::Skip(reason) = decision {
        return Ok(UploadOutcome::Skipped(reason));
    }
    if cancel.load(Ordering::Relaxed) {
        return Err(ClientError::Cancelled);
    }

    let secret = FileSecret::generate();
    let chunks = encrypt_chunks(&plaintext, &secret)?;
    upload_chunks(http, config, chunk_pool, cancel, &chunks).await?;

    let manifest = build_manifest(
        &asset.filename,
        &asset.media_type,
        size,
        &secret,
        &config.master_key,
        &chunks,
        None,
        Some((capture_time, exif.make, exif.model)),
        Some(file_hash),
        perceptual_hash,
    )?;
    let sealed = seal_manifest(&manifest, &config.master_key)?;
    post_manifest(http, config, &manifest.asset_id, &sealed, chunks.len()).await?;

    index.lock().await.index(&candidate);
    Ok(UploadOutcome::Uploaded)
}

async fn upload_chunks(
    http: &Client,
    config: &PipelineConfig,
    chunk_pool: &Arc<Semaphore>,
    cancel: &Arc<AtomicBool>,
    chunks: &[EncryptedChunk],
) -> Result<()> {
    let mut handles = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if cancel.load(Ordering::Relaxed) {
            return Err(ClientError::Cancelled);
        }
        let permit = Arc::clone(chunk_pool).acquire_owned().await.expect("chunk pool is never closed");
        let http = http.clone();
        let config = config.clone();
        let chunk = chunk.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permit;
            upload_chunk(&http, &config, &chunk).await
        }));
    }
    for handle in handles {
        handle.await.map_err(|e| ClientError::Crypto(format!("chunk task panicked: {e}")))??;
    }
    Ok(())
}

async fn upload_chunk(http: &Client, config: &PipelineConfig, chunk: &EncryptedChunk) -> Result<()> {
    let url = format!("{}/api/cloud/chunks", config.base_url);
    let attempt = || async {
        http.post(&url)
            .bearer_auth(&config.token)
            .header("X-Device-UUID", &config.device_uuid)
            .header("X-Chunk-Id", &chunk.chunk_id)
            .header("Content-Type", "application/octet-stream")
            .body(chunk.ciphertext.clone())
            .send()
            .await?
            .error_for_status()
    };
    let strategy = retry_strategy();
    attempt.retry(&strategy).when(is_retryable).await?;
    Ok(())
}

async fn post_manifest(
    http: &Client,
    config: &PipelineConfig,
    manifest_id: &str,
    sealed: &SealedManifest,
    chunk_count: usize,
) -> Result<()> {
    #[derive(serde::Serialize)]
    struct Body<'a> {
        #[serde(rename = "manifestId")]
        manifest_id: &'a str,
        #[serde(rename = "encryptedManifest")]
        encrypted_manifest: String,
        #[serde(rename = "chunkCount")]
        chunk_count: usize,
    }
    let url = format!("{}/api/cloud/manifests", config.base_url);
    http.post(url)
        .bearer_auth(&config.token)
        .header("X-Device-UUID", &config.device_uuid)
        .json(&Body { manifest_id, encrypted_manifest: sealed.to_wire(), chunk_count })
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}
