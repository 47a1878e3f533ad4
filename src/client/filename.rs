//! Filename normalization for the dedup chain: exact comparison and
//! base-filename comparison after stripping platform variant suffixes
//! (thumbnails, re-exports, OS copy-naming conventions).

use regex::Regex;
use std::sync::LazyLock;

static STRIP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // iOS thumbnail/preview suffix: `_<digits>_<digits>_<letters>`.
        Regex::new(r"(?i)_\d+_\d+_[a-z]+$").expect("valid regex"),
        // Timestamp-anchored copy suffix: `_<digits>{6,}_<digits>{1,2}`.
        Regex::new(r"_\d{6,}_\d{1,2}$").expect("valid regex"),
        Regex::new(r"~\d+$").expect("valid regex"),
        Regex::new(r"(?i)-(edit|edited|collage|animation)$").expect("valid regex"),
        Regex::new(r"(?i)_burst\d+$").expect("valid regex"),
        Regex::new(r"\s*\(\d+\)$").expect("valid regex"),
        Regex::new(r"(?i)\s*-\s*copy(\s*\(\d+\))?$").expect("valid regex"),
        Regex::new(r"(?i)\s*\(copy\)$").expect("valid regex"),
        Regex::new(r"(?i)_copy\d+$").expect("valid regex"),
        Regex::new(r"(?i)_backup$").expect("valid regex"),
        Regex::new(r"(?i)-backup$").expect("valid regex"),
        Regex::new(r"(?i)_original$").expect("valid regex"),
    ]
});

/// Lowercases a filename for exact-match comparison (dedup check 2).
#[must_use]
pub fn normalize_filename(filename: &str) -> String {
    filename.to_lowercase()
}

/// Strips every recognized variant suffix from a filename's stem, repeatedly
/// until none apply, then lowercases stem and extension (dedup checks 3/4/6/7).
///
/// A trailing `.bak` is special-cased: unlike the other suffixes, it sits
/// *after* the real extension (`clip.mov.bak`), so it's peeled off before
/// the stem/extension split rather than matched against the stem.
#[must_use]
pub fn base_filename(filename: &str) -> String {
    let without_bak = if filename.to_lowercase().ends_with(".bak") {
        &filename[..filename.len() - 4]
    } else {
        filename
    };
    let (mut stem, ext) = split_stem_ext(without_bak);
    loop {
        let before = stem.clone();
        for pattern in STRIP_PATTERNS.iter() {
            stem = pattern.replace(&stem, "").into_owned();
        }
        if stem == before {
            break;
        }
    }
    let stem = stem.trim();
    match ext {
        Some(ext) => format!("{}.{}", stem.to_lowercase(), ext.to_lowercase()),
        None => stem.to_lowercase(),
    }
}

fn split_stem_ext(filename: &str) -> (String, Option<String>) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext.to_string())),
        _ => (filename.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_case_insensitive() {
        assert_eq!(normalize_filename("IMG_0001.HEIC"), normalize_filename("img_0001.heic"));
    }

    #[test]
    fn strips_parenthesized_copy_counter() {
        assert_eq!(base_filename("photo.jpg"), base_filename("photo (2).jpg"));
    }

    #[test]
    fn strips_windows_copy_suffix() {
        assert_eq!(base_filename("report.docx"), base_filename("report - Copy (3).docx"));
    }

    #[test]
    fn strips_google_photos_edit_suffix() {
        assert_eq!(base_filename("sunset.jpg"), base_filename("sunset-edited.jpg"));
    }

    #[test]
    fn strips_ios_thumbnail_suffix() {
        assert_eq!(base_filename("IMG_0001.HEIC"), base_filename("IMG_0001_1242_900_o.HEIC"));
    }

    #[test]
    fn strips_backup_and_original_markers() {
        assert_eq!(base_filename("clip.mov"), base_filename("clip_backup.mov"));
        assert_eq!(base_filename("clip.mov"), base_filename("clip_original.mov"));
        assert_eq!(base_filename("clip.mov"), base_filename("clip.mov.bak"));
    }

    #[test]
    fn unrelated_filenames_stay_distinct() {
        assert_ne!(base_filename("sunrise.jpg"), base_filename("sunset.jpg"));
    }
}
