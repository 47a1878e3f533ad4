//! The nine-step dedup decision chain. Each check short-circuits on hit; the
//! in-memory index must be updated (via [`DedupIndex::index`]) after every
//! successful upload so later files in the same run see it.

use crate::client::filename::{base_filename, normalize_filename};
use crate::client::phash::{DEFAULT_HAMMING_THRESHOLD, hamming_distance};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ManifestId,
    ExactFilename,
    BaseFilename,
    HeicCaptureTime,
    ExifKey,
    SizeTolerance,
    CaptureDate,
    PerceptualHash,
    FileHash,
}

impl SkipReason {
    /// The wire-facing telemetry label for this reason.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManifestId => "manifestId",
            Self::ExactFilename => "exactFilename",
            Self::BaseFilename => "baseFilename",
            Self::HeicCaptureTime => "heicCaptureTime",
            Self::ExifKey => "exifKey",
            Self::SizeTolerance => "sizeTolerance",
            Self::CaptureDate => "captureDate",
            Self::PerceptualHash => "perceptualHash",
            Self::FileHash => "fileHash",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    Upload,
    Skip(SkipReason),
}

/// Everything the dedup chain needs about a file before the server is
/// consulted. `capture_time` is the full ISO, seconds-precision timestamp
/// (see `exif::normalize_capture_time`); `make`/`model` are already trimmed
/// and lowercased.
#[derive(Debug, Clone, Default)]
pub struct CandidateAsset {
    pub manifest_id: String,
    pub filename: String,
    pub size: u64,
    pub is_heic: bool,
    pub capture_time: Option<String>,
    pub exif_make: Option<String>,
    pub exif_model: Option<String>,
    pub perceptual_hash: Option<String>,
    pub file_hash: Option<String>,
}

#[derive(Debug, Clone)]
struct IndexedFile {
    size: u64,
    capture_time: Option<String>,
    is_heic: bool,
}

/// The client's in-memory view of what the server already holds for the
/// current account, built once from the manifest index and refreshed after
/// every successful upload within the same run.
#[derive(Debug, Default)]
pub struct DedupIndex {
    manifest_ids: HashSet<String>,
    filenames: HashSet<String>,
    base_filenames: HashMap<String, Vec<IndexedFile>>,
    exif_keys: HashSet<String>,
    perceptual_hashes: Vec<String>,
    file_hashes: HashSet<String>,
    hamming_threshold: u32,
}

impl DedupIndex {
    #[must_use]
    pub fn new() -> Self {
        Self { hamming_threshold: DEFAULT_HAMMING_THRESHOLD, ..Self::default() }
    }

    /// Overrides the perceptual-hash match threshold (default 3). Kept
    /// configurable since the right cutoff varies across capture devices.
    #[must_use]
    pub fn with_hamming_threshold(mut self, threshold: u32) -> Self {
        self.hamming_threshold = threshold;
        self
    }

    /// Records a known asset so subsequent `decide` calls in this run see it.
    pub fn index(&mut self, candidate: &CandidateAsset) {
        self.manifest_ids.insert(candidate.manifest_id.clone());
        self.filenames.insert(normalize_filename(&candidate.filename));
        self.base_filenames.entry(base_filename(&candidate.filename)).or_default().push(IndexedFile {
            size: candidate.size,
            capture_time: candidate.capture_time.clone(),
            is_heic: candidate.is_heic,
        });
        for key in exif_keys(candidate.capture_time.as_deref(), candidate.exif_make.as_deref(), candidate.exif_model.as_deref()) {
            self.exif_keys.insert(key);
        }
        if let Some(hash) = &candidate.perceptual_hash {
            self.perceptual_hashes.push(hash.clone());
        }
        if let Some(hash) = &candidate.file_hash {
            self.file_hashes.insert(hash.clone());
        }
    }

    /// Runs the nine-step decision chain against the current index. Does
    /// not mutate the index; call [`Self::index`] after a successful upload.
    #[must_use]
    pub fn decide(&self, candidate: &CandidateAsset) -> DedupOutcome {
        if self.manifest_ids.contains(&candidate.manifest_id) {
            return DedupOutcome::Skip(SkipReason::ManifestId);
        }
        if self.filenames.contains(&normalize_filename(&candidate.filename)) {
            return DedupOutcome::Skip(SkipReason::ExactFilename);
        }

        let base = base_filename(&candidate.filename);
        let same_base = self.base_filenames.get(&base);
        if same_base.is_some() {
            return DedupOutcome::Skip(SkipReason::BaseFilename);
        }

        if candidate.is_heic
            && let Some(entries) = same_base
            && let Some(ct) = &candidate.capture_time
            && entries.iter().any(|e| e.is_heic && e.capture_time.as_deref() == Some(ct.as_str()))
        {
            return DedupOutcome::Skip(SkipReason::HeicCaptureTime);
        }

        for key in exif_keys(candidate.capture_time.as_deref(), candidate.exif_make.as_deref(), candidate.exif_model.as_deref()) {
            if self.exif_keys.contains(&key) {
                return DedupOutcome::Skip(SkipReason::ExifKey);
            }
        }

        if let Some(entries) = same_base
            && entries.iter().any(|e| within_tolerance(e.size, candidate.size, 0.20))
        {
            return DedupOutcome::Skip(SkipReason::SizeTolerance);
        }

        if let Some(entries) = same_base {
            let candidate_date = candidate.capture_time.as_deref().and_then(day_precision);
            if let Some(date) = &candidate_date
                && entries.iter().any(|e| e.capture_time.as_deref().and_then(day_precision).as_deref() == Some(date.as_str()))
            {
                return DedupOutcome::Skip(SkipReason::CaptureDate);
            }
        }

        if let Some(hash) = &candidate.perceptual_hash
            && self
                .perceptual_hashes
                .iter()
                .any(|existing| hamming_distance(existing, hash).is_some_and(|d| d <= self.hamming_threshold))
        {
            return DedupOutcome::Skip(SkipReason::PerceptualHash);
        }

        if let Some(hash) = &candidate.file_hash
            && self.file_hashes.contains(hash)
        {
            return DedupOutcome::Skip(SkipReason::FileHash);
        }

        DedupOutcome::Upload
    }
}

fn within_tolerance(existing: u64, candidate: u64, tolerance: f64) -> bool {
    if existing == 0 {
        return candidate == 0;
    }
    let existing = existing as f64;
    let candidate = candidate as f64;
    ((candidate - existing).abs() / existing) <= tolerance
}

fn day_precision(iso: &str) -> Option<String> {
    iso.get(0..10).map(str::to_string)
}

/// Derives the ordered EXIF match keys for a candidate: full key first, then
/// the two single-field fallbacks. Used both to index an asset (under every
/// key it could ever be matched by) and to query (checking each in turn).
fn exif_keys(capture_time: Option<&str>, make: Option<&str>, model: Option<&str>) -> Vec<String> {
    let Some(t) = capture_time else { return Vec::new() };
    let mut keys = Vec::with_capacity(3);
    if let (Some(m), Some(mo)) = (make, model) {
        keys.push(format!("{t}|{m}|{mo}"));
    }
    if let Some(mo) = model {
        keys.push(format!("{t}|{mo}"));
    }
    if let Some(m) = make {
        keys.push(format!("{t}|{m}"));
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_candidate(filename: &str, size: u64) -> CandidateAsset {
        CandidateAsset { manifest_id: format!("m-{filename}-{size}"), filename: filename.to_string(), size, ..Default::default() }
    }

    #[test]
    fn unknown_manifest_and_filename_is_uploaded() {
        let index = DedupIndex::new();
        assert_eq!(index.decide(&base_candidate("a.jpg", 100)), DedupOutcome::Upload);
    }

    #[test]
    fn same_manifest_id_is_skipped() {
        let mut index = DedupIndex::new();
        let existing = base_candidate("a.jpg", 100);
        index.index(&existing);
        let mut dup = base_candidate("different-name.jpg", 999);
        dup.manifest_id = existing.manifest_id.clone();
        assert_eq!(index.decide(&dup), DedupOutcome::Skip(SkipReason::ManifestId));
    }

    #[test]
    fn exact_filename_match_is_skipped() {
        let mut index = DedupIndex::new();
        index.index(&base_candidate("IMG_0001.HEIC", 100));
        let mut candidate = base_candidate("img_0001.heic", 100);
        candidate.manifest_id = "different".to_string();
        assert_eq!(index.decide(&candidate), DedupOutcome::Skip(SkipReason::ExactFilename));
    }

    #[test]
    fn base_filename_match_is_skipped_before_size_or_date_checks() {
        let mut index = DedupIndex::new();
        index.index(&base_candidate("photo.jpg", 8_000_000));
        let mut second = base_candidate("photo (2).jpg", 999);
        second.manifest_id = "different".to_string();
        assert_eq!(index.decide(&second), DedupOutcome::Skip(SkipReason::BaseFilename));
    }

    #[test]
    fn exif_key_match_fires_without_filename_match() {
        let mut index = DedupIndex::new();
        let mut existing = base_candidate("front-cam-001.jpg", 100);
        existing.capture_time = Some("2024-03-05T14:22:01".to_string());
        existing.exif_make = Some("acme".to_string());
        existing.exif_model = Some("camera-9".to_string());
        index.index(&existing);

        let mut candidate = base_candidate("whatsapp-image.jpg", 100);
        candidate.capture_time = Some("2024-03-05T14:22:01".to_string());
        candidate.exif_model = Some("camera-9".to_string());
        assert_eq!(index.decide(&candidate), DedupOutcome::Skip(SkipReason::ExifKey));
    }

    #[test]
    fn perceptual_hash_within_threshold_is_skipped() {
        let mut index = DedupIndex::new();
        let mut existing = base_candidate("one.jpg", 100);
        existing.perceptual_hash = Some("0000000000000000".to_string());
        index.index(&existing);

        let mut candidate = base_candidate("two.jpg", 100);
        candidate.perceptual_hash = Some("0000000000000001".to_string());
        assert_eq!(index.decide(&candidate), DedupOutcome::Skip(SkipReason::PerceptualHash));
    }

    #[test]
    fn file_hash_match_is_skipped() {
        let mut index = DedupIndex::new();
        let mut existing = base_candidate("one.jpg", 100);
        existing.file_hash = Some("abc123".to_string());
        index.index(&existing);

        let mut candidate = base_candidate("two.jpg", 100);
        candidate.file_hash = Some("abc123".to_string());
        assert_eq!(index.decide(&candidate), DedupOutcome::Skip(SkipReason::FileHash));
    }
}
