//! EXIF extraction for dedup keys and perceptual-hash orientation.
//!
//! Uses a generic TIFF/JPEG EXIF reader. HEIC containers store EXIF in an
//! `Exif` box rather than an APP1 segment; a HEIC-aware reader must sit in
//! front of this on platforms that need it (see `phash` module doc).

use std::io::Cursor;

#[derive(Debug, Clone, Default)]
pub struct ExifData {
    pub capture_time: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    /// Raw EXIF orientation tag (1-8), consumed by `phash::apply_orientation`.
    pub orientation: Option<u32>,
}

/// Extracts capture timestamp, make, and model from EXIF metadata embedded
/// in `bytes`. Returns the default (all-`None`) value if no EXIF segment is
/// present or it fails to parse — dedup checks that depend on these fields
/// simply don't fire rather than erroring out the whole pipeline.
#[must_use]
pub fn extract_exif(bytes: &[u8]) -> ExifData {
    let mut cursor = Cursor::new(bytes);
    let reader = exif::Reader::new();
    let Ok(fields) = reader.read_from_container(&mut cursor) else {
        return ExifData::default();
    };

    let capture_time = fields
        .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
        .or_else(|| fields.get_field(exif::Tag::DateTime, exif::In::PRIMARY))
        .map(|f| f.display_value().to_string());

    let make = fields
        .get_field(exif::Tag::Make, exif::In::PRIMARY)
        .map(|f| f.display_value().to_string().trim().to_lowercase());
    let model = fields
        .get_field(exif::Tag::Model, exif::In::PRIMARY)
        .map(|f| f.display_value().to_string().trim().to_lowercase());
    let orientation =
        fields.get_field(exif::Tag::Orientation, exif::In::PRIMARY).and_then(|f| f.value.get_uint(0));

    ExifData { capture_time, make, model, orientation }
}

/// Normalizes an EXIF `DateTimeOriginal` string (`YYYY:MM:DD HH:MM:SS`) to
/// the `YYYY-MM-DDTHH:MM:SS` seconds-precision form used for dedup keys.
#[must_use]
pub fn normalize_capture_time(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_matches('"');
    if raw.len() < 19 {
        return None;
    }
    let date = raw.get(0..10)?.replace(':', "-");
    let time = raw.get(11..19)?;
    Some(format!("{date}T{time}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_exif_datetime() {
        assert_eq!(normalize_capture_time("2024:03:05 14:22:01"), Some("2024-03-05T14:22:01".to_string()));
    }

    #[test]
    fn rejects_short_input() {
        assert_eq!(normalize_capture_time("2024:03:05"), None);
    }

    #[test]
    fn missing_exif_returns_default() {
        let data = extract_exif(b"not an image");
        assert!(data.capture_time.is_none());
        assert!(data.make.is_none());
        assert!(data.orientation.is_none());
    }
}
