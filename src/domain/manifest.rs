/// Sanitizes a client-supplied manifest id to `[A-Za-z0-9_-]{1,128}`.
///
/// Returns `None` if nothing survives sanitization.
#[must_use]
pub fn sanitize_manifest_id(raw: &str) -> Option<String> {
    let sanitized: String =
        raw.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-').take(128).collect();
    if sanitized.is_empty() { None } else { Some(sanitized) }
}

/// The JSON envelope persisted at `<manifests>/<id>.json`. The server treats
/// `encrypted_manifest` as opaque bytes (base64/ascii as the client chooses);
/// it never inspects the plaintext.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEnvelope {
    pub manifest_id: String,
    pub encrypted_manifest: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct ManifestListEntry {
    pub manifest_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_disallowed_chars() {
        assert_eq!(sanitize_manifest_id("abc/../def"), Some("abcdef".to_string()));
        assert_eq!(sanitize_manifest_id("../../etc/passwd"), Some("etcpasswd".to_string()));
        assert_eq!(sanitize_manifest_id("!!!"), None);
        assert_eq!(sanitize_manifest_id(""), None);
    }

    #[test]
    fn sanitize_truncates_to_128() {
        let raw = "a".repeat(500);
        assert_eq!(sanitize_manifest_id(&raw).unwrap().len(), 128);
    }
}
