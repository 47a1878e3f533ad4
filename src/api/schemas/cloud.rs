use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkStoredResponse {
    pub stored: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestUploadRequest {
    pub manifest_id: String,
    pub encrypted_manifest: String,
    pub chunk_count: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestListResponse {
    pub manifests: Vec<ManifestListEntryDto>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestListEntryDto {
    pub manifest_id: String,
}

impl From<crate::domain::manifest::ManifestListEntry> for ManifestListEntryDto {
    fn from(entry: crate::domain::manifest::ManifestListEntry) -> Self {
        Self { manifest_id: entry.manifest_id }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeCloudResponse {
    pub chunks_deleted: u64,
}
