//! Perceptual image hashing (dHash), built to be byte-for-byte reproducible
//! across clients so dedup decisions made on different devices agree.
//!
//! HEIC decoding is intentionally out of scope here: no HEIC decoder exists
//! anywhere in this crate's dependency tree, and none is fabricated to fill
//! the gap. Platforms with native HEIC support (iOS/macOS via their own
//! frameworks) are expected to decode the primary image to RGB and call
//! [`dhash_from_image`] directly; everything downstream of "decoded image"
//! — orientation, scaling, luma, bit-packing — is identical either way.

use crate::client::exif::ExifData;
use crate::client::{ClientError, Result};
use image::{DynamicImage, GenericImageView, RgbImage};

const HASH_WIDTH: u32 = 9;
const HASH_HEIGHT: u32 = 8;

pub const DEFAULT_HAMMING_THRESHOLD: u32 = 3;

/// Decodes a JPEG/PNG image and computes its dHash, applying EXIF
/// orientation before any scaling.
///
/// # Errors
/// Returns [`ClientError::UnsupportedImageFormat`] for anything this crate's
/// `image` dependency can't decode (including HEIC).
pub fn dhash(bytes: &[u8], exif: &ExifData) -> Result<String> {
    let img = image::load_from_memory(bytes).map_err(|_| ClientError::UnsupportedImageFormat)?;
    let img = apply_orientation(img, exif.orientation);
    dhash_from_image(&img)
}

/// Applies EXIF orientation (values 1-8, TIFF/EXIF convention) to a decoded
/// image. Must run before any downscaling for hashes to agree across
/// clients that read orientation differently.
#[must_use]
pub fn apply_orientation(img: DynamicImage, orientation: Option<u32>) -> DynamicImage {
    match orientation.unwrap_or(1) {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Computes the dHash of an already-decoded, already-oriented image: a
/// bilinear downscale to 9x8, luma conversion, row-wise adjacent-pixel
/// comparison, packed MSB-first into 16 hex characters.
///
/// # Errors
/// Never actually fails; returns `Result` for uniformity with [`dhash`].
pub fn dhash_from_image(img: &DynamicImage) -> Result<String> {
    let rgb = img.to_rgb8();
    let (src_w, src_h) = (rgb.width().max(1), rgb.height().max(1));

    let mut luma = [[0u8; HASH_WIDTH as usize]; HASH_HEIGHT as usize];
    for y in 0..HASH_HEIGHT {
        for x in 0..HASH_WIDTH {
            let (r, g, b) = bilinear_sample(&rgb, src_w, src_h, x, y, HASH_WIDTH, HASH_HEIGHT);
            luma[y as usize][x as usize] = ((299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b)) / 1000) as u8;
        }
    }

    let mut bits = [0u8; 8];
    for (y, row) in luma.iter().enumerate() {
        let mut byte = 0u8;
        for x in 0..8 {
            byte <<= 1;
            if row[x] < row[x + 1] {
                byte |= 1;
            }
        }
        bits[y] = byte;
    }

    Ok(hex::encode(bits))
}

/// Two-step bilinear interpolation at destination pixel `(dx, dy)` of a
/// `dst_w`x`dst_h` downscale of `src`, pixel-center aligned: `top =
/// p11*(1-wx)+p21*wx; bot = p12*(1-wx)+p22*wx; v = top*(1-wy)+bot*wy`,
/// rounded with `floor(v+0.5)`.
fn bilinear_sample(src: &RgbImage, src_w: u32, src_h: u32, dx: u32, dy: u32, dst_w: u32, dst_h: u32) -> (u8, u8, u8) {
    let scale_x = f64::from(src_w) / f64::from(dst_w);
    let scale_y = f64::from(src_h) / f64::from(dst_h);

    let gx = (f64::from(dx) + 0.5) * scale_x - 0.5;
    let gy = (f64::from(dy) + 0.5) * scale_y - 0.5;

    let x1 = gx.floor().clamp(0.0, f64::from(src_w - 1)) as u32;
    let y1 = gy.floor().clamp(0.0, f64::from(src_h - 1)) as u32;
    let x2 = (x1 + 1).min(src_w - 1);
    let y2 = (y1 + 1).min(src_h - 1);

    let wx = (gx - f64::from(x1)).clamp(0.0, 1.0);
    let wy = (gy - f64::from(y1)).clamp(0.0, 1.0);

    let p11 = src.get_pixel(x1, y1);
    let p21 = src.get_pixel(x2, y1);
    let p12 = src.get_pixel(x1, y2);
    let p22 = src.get_pixel(x2, y2);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = f64::from(p11[c]) * (1.0 - wx) + f64::from(p21[c]) * wx;
        let bot = f64::from(p12[c]) * (1.0 - wx) + f64::from(p22[c]) * wx;
        let v = top * (1.0 - wy) + bot * wy;
        out[c] = (v + 0.5).floor() as u8;
    }
    (out[0], out[1], out[2])
}

/// 64-bit Hamming distance between two dHash hex strings. Returns `None` if
/// either isn't a well-formed 16-character hex hash.
#[must_use]
pub fn hamming_distance(a: &str, b: &str) -> Option<u32> {
    let a = hex::decode(a).ok()?;
    let b = hex::decode(b).ok()?;
    if a.len() != 8 || b.len() != 8 {
        return None;
    }
    Some(a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hamming_distance_of_identical_hashes_is_zero() {
        assert_eq!(hamming_distance("abcd1234abcd1234", "abcd1234abcd1234"), Some(0));
    }

    #[test]
    fn hamming_distance_counts_differing_bits() {
        assert_eq!(hamming_distance("0000000000000000", "0000000000000001"), Some(1));
    }

    #[test]
    fn hamming_distance_rejects_malformed_input() {
        assert_eq!(hamming_distance("not-hex", "abcd1234abcd1234"), None);
        assert_eq!(hamming_distance("ab", "abcd1234abcd1234"), None);
    }

    #[test]
    fn dhash_is_reproducible_for_identical_input() {
        let img = DynamicImage::new_rgb8(32, 32);
        let h1 = dhash_from_image(&img).unwrap();
        let h2 = dhash_from_image(&img).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 16);
    }

    #[test]
    fn orientation_1_is_identity() {
        let img = DynamicImage::new_rgb8(4, 8);
        let same = apply_orientation(img.clone(), Some(1));
        assert_eq!(img.dimensions(), same.dimensions());
    }

    #[test]
    fn orientation_6_rotates_dimensions() {
        let img = DynamicImage::new_rgb8(4, 8);
        let rotated = apply_orientation(img, Some(6));
        assert_eq!(rotated.dimensions(), (8, 4));
    }
}
