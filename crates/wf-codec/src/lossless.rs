//! Pure-Rust WebP encoding via the `image` crate.
//!
//! The `image` WebP encoder only writes lossless VP8L. Lossy requests are
//! approximated by quantising color precision first (see
//! [`ops::quantize_bits`]), which shrinks the output as quality drops while
//! still requiring nothing beyond safe Rust.

use image::codecs::webp::WebPEncoder;
use image::ExtendedColorType;
use wf_core::{Error, ImageBuffer, Result};

use crate::ops;

const CODEC: &str = "image-webp";

/// Encode the buffer as lossless WebP.
pub fn encode_lossless(image: &ImageBuffer) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    WebPEncoder::new_lossless(&mut out)
        .encode(
            image.pixels(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| Error::codec(CODEC, e.to_string()))?;
    Ok(out)
}

/// Encode at a quality, returning the bytes and the quality achieved.
///
/// Lossless requests ignore `quality` and report `1.0`.
pub fn encode_with_quality(
    mut image: ImageBuffer,
    quality: f32,
    lossless: bool,
) -> Result<(Vec<u8>, f32)> {
    if lossless {
        return Ok((encode_lossless(&image)?, 1.0));
    }
    let bits = ops::quantize_bits(quality);
    ops::quantize_in_place(image.pixels_mut(), bits);
    Ok((encode_lossless(&image)?, quality.clamp(0.0, 1.0)))
}

/// Whether `bytes` starts with a RIFF/WEBP container header.
pub fn is_webp(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gradient(w: u32, h: u32) -> ImageBuffer {
        let mut px = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                px.extend_from_slice(&[(x * 7) as u8, (y * 5) as u8, ((x + y) * 3) as u8, 255]);
            }
        }
        ImageBuffer::new(w, h, px).unwrap()
    }

    #[test]
    fn lossless_output_is_webp() {
        let bytes = encode_lossless(&gradient(16, 16)).unwrap();
        assert!(is_webp(&bytes));
    }

    #[test]
    fn lossless_round_trips_pixels() {
        let img = gradient(9, 7);
        let bytes = encode_lossless(&img).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (9, 7));
        assert_eq!(decoded.into_raw(), img.into_pixels());
    }

    #[test]
    fn lossless_request_reports_full_quality() {
        let (_, q) = encode_with_quality(gradient(4, 4), 0.2, true).unwrap();
        assert_eq!(q, 1.0);
    }

    #[test]
    fn lower_quality_is_not_larger() {
        let (hi, _) = encode_with_quality(gradient(64, 64), 1.0, false).unwrap();
        let (lo, _) = encode_with_quality(gradient(64, 64), 0.0, false).unwrap();
        assert!(lo.len() <= hi.len(), "lo={} hi={}", lo.len(), hi.len());
    }

    #[test]
    fn is_webp_rejects_short_or_foreign() {
        assert!(!is_webp(b"RIFF"));
        assert!(!is_webp(b"\x89PNG\r\n\x1a\n0000"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Property: any valid buffer encodes to a non-empty WebP.
        #[test]
        fn prop_encodes_any_dimensions(w in 1u32..=48, h in 1u32..=48, q in 0.0f32..=1.0) {
            let (bytes, actual) = encode_with_quality(gradient(w, h), q, false).unwrap();
            prop_assert!(is_webp(&bytes));
            prop_assert!((0.0..=1.0).contains(&actual));
        }
    }
}
