use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};

/// Resolves the single data root and the fixed subpaths derived from it,
/// creating every subdirectory on boot if missing.
#[derive(Clone, Debug)]
pub struct DataLayout {
    pub root: PathBuf,
    pub uploads: PathBuf,
    pub cloud: PathBuf,
    pub capacity: PathBuf,
    pub capacity_file: PathBuf,
    pub db_path: PathBuf,
}

impl DataLayout {
    /// Resolves one root from the first satisfied rule: `PHOTOSYNC_DATA_DIR`,
    /// the parent of an explicit `UPLOAD_DIR`, a conventional `/data`
    /// directory when present, else a per-user home path.
    #[tracing::instrument(skip(config))]
    pub fn resolve(config: &StorageConfig) -> Result<Self> {
        let root = if let Some(dir) = &config.photosync_data_dir {
            PathBuf::from(dir)
        } else if let Some(upload_dir) = &config.upload_dir {
            PathBuf::from(upload_dir).parent().map_or_else(|| PathBuf::from(upload_dir), Path::to_path_buf)
        } else if Path::new("/data").is_dir() {
            PathBuf::from("/data")
        } else {
            dirs_home().join(".photosync")
        };

        let uploads = config.upload_dir.as_ref().map_or_else(|| root.join("uploads"), PathBuf::from);
        let cloud = config.cloud_dir.as_ref().map_or_else(|| root.join("cloud"), PathBuf::from);
        let capacity = root.join("capacity");
        let capacity_file =
            config.capacity_json_path.as_ref().map_or_else(|| capacity.join("photosync-capacity.json"), PathBuf::from);
        let db_path = config.db_path.as_ref().map_or_else(|| root.join("db").join("backup.db"), PathBuf::from);

        for dir in [&root, &uploads, &cloud, &capacity, &cloud.join("users")] {
            std::fs::create_dir_all(dir)?;
        }
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(root = %root.display(), "resolved data layout");
        Ok(Self { root, uploads, cloud, capacity, capacity_file, db_path })
    }

    #[must_use]
    pub fn device_upload_dir(&self, device_uuid: &str) -> PathBuf {
        self.uploads.join(device_uuid)
    }

    #[must_use]
    pub fn tenant_root(&self, tenant_key: &str) -> PathBuf {
        self.cloud.join("users").join(tenant_key)
    }

    #[must_use]
    pub fn tenant_chunks_dir(&self, tenant_key: &str) -> PathBuf {
        self.tenant_root(tenant_key).join("chunks")
    }

    #[must_use]
    pub fn tenant_manifests_dir(&self, tenant_key: &str) -> PathBuf {
        self.tenant_root(tenant_key).join("manifests")
    }
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
}

/// Free bytes available on the filesystem backing `path`, via `statvfs`.
/// Shared by the health check, the `/api/cloud/usage` endpoint, and the
/// capacity reporter worker so all three agree on one definition of "free".
///
/// # Errors
/// Returns the underlying `statvfs` error if the call fails.
#[cfg(unix)]
pub fn disk_free_bytes(path: &Path) -> std::io::Result<u64> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(std::io::Error::other)?;
    Ok(stat.blocks_available() * stat.fragment_size())
}

#[cfg(not(unix))]
pub fn disk_free_bytes(_path: &Path) -> std::io::Result<u64> {
    Ok(u64::MAX)
}

/// Total byte capacity of the filesystem backing `path`, via `statvfs`.
///
/// # Errors
/// Returns the underlying `statvfs` error if the call fails.
#[cfg(unix)]
pub fn disk_total_bytes(path: &Path) -> std::io::Result<u64> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(std::io::Error::other)?;
    Ok(stat.blocks() * stat.fragment_size())
}

#[cfg(not(unix))]
pub fn disk_total_bytes(_path: &Path) -> std::io::Result<u64> {
    Ok(u64::MAX)
}

/// Strips a raw identifier down to `[A-Za-z0-9_-]`, truncated to 128 chars.
#[must_use]
pub fn sanitize_key(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-').take(128).collect()
}

/// Derives the StealthCloud tenant key for a session: device uuid first, then
/// user uuid, then the stringified integer id, each sanitized.
#[must_use]
pub fn tenant_key(device_uuid: &str, user_uuid: &str, user_id: i64) -> String {
    let sanitized = sanitize_key(device_uuid);
    if !sanitized.is_empty() {
        return sanitized;
    }
    let sanitized = sanitize_key(user_uuid);
    if !sanitized.is_empty() {
        return sanitized;
    }
    sanitize_key(&user_id.to_string())
}

/// Joins `parent` and `child`, then verifies the resolved, canonicalized path
/// is still contained within `parent`. This is the one gate every path built
/// from a tenant key, chunk id, manifest id, or filename must pass before any
/// I/O touches it; it defeats directory traversal and symlink escape.
///
/// `child` must already be a single sanitized path component (no `/` or `..`);
/// this function still re-validates via canonicalization as defense in depth.
pub fn join_within(parent: &Path, child: &str) -> Result<PathBuf> {
    if child.is_empty() || child.contains('/') || child.contains('\\') || child == "." || child == ".." {
        return Err(AppError::Forbidden("invalid path component".into()));
    }
    let candidate = parent.join(child);

    // The parent must exist (callers create tenant dirs up front); canonicalize
    // both sides so `..`-free but symlinked components still get caught.
    let parent_real = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
    let candidate_check = candidate.parent().map_or_else(|| candidate.clone(), Path::to_path_buf);
    let candidate_real = candidate_check.canonicalize().unwrap_or(candidate_check);

    if !candidate_real.starts_with(&parent_real) {
        return Err(AppError::Forbidden("path escapes tenant directory".into()));
    }
    Ok(candidate)
}

/// Best-effort migration of a legacy tenant directory (keyed by user uuid or
/// integer id) into the current tenant directory, skipping on any destination
/// conflict. Failures are logged and ignored — never surfaced to the caller.
#[tracing::instrument(skip(layout))]
pub fn migrate_legacy_tenant_dir(layout: &DataLayout, current_key: &str, legacy_keys: &[String]) {
    let current = layout.tenant_root(current_key);
    for legacy_key in legacy_keys {
        if legacy_key == current_key {
            continue;
        }
        let legacy = layout.tenant_root(legacy_key);
        if !legacy.is_dir() {
            continue;
        }
        if current.exists() {
            tracing::debug!(legacy_key, current_key, "tenant dir already migrated, skipping legacy rename");
            continue;
        }
        if let Some(parent) = current.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %e, "failed to prepare tenant migration destination");
                continue;
            }
        }
        match std::fs::rename(&legacy, &current) {
            Ok(()) => tracing::info!(legacy_key, current_key, "migrated legacy tenant directory"),
            Err(e) => tracing::warn!(error = %e, legacy_key, current_key, "legacy tenant migration failed, ignoring"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_key_prefers_device_uuid() {
        assert_eq!(tenant_key("dev-1", "user-1", 5), "dev-1");
        assert_eq!(tenant_key("", "user-1", 5), "user-1");
        assert_eq!(tenant_key("", "", 5), "5");
    }

    #[test]
    fn sanitize_key_strips_traversal() {
        assert_eq!(sanitize_key("../../etc/passwd"), "etcpasswd");
    }

    #[test]
    fn join_within_rejects_traversal_components() {
        let dir = tempfile::tempdir().unwrap();
        assert!(join_within(dir.path(), "..").is_err());
        assert!(join_within(dir.path(), "a/../b").is_err());
        assert!(join_within(dir.path(), "normal-file").is_ok());
    }
}
