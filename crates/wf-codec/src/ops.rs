//! CPU pixel operations: fitting within bounds, sharpening, and
//! quality-driven channel quantisation.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use wf_core::{Error, ImageBuffer, Result};

/// Wrap an [`ImageBuffer`] as an `image` crate buffer without copying.
pub fn to_rgba_image(image: ImageBuffer) -> Result<RgbaImage> {
    let (w, h) = (image.width(), image.height());
    RgbaImage::from_raw(w, h, image.into_pixels())
        .ok_or_else(|| Error::invalid(format!("pixel buffer does not fit {w}x{h}")))
}

/// Convert an `image` crate buffer back into an [`ImageBuffer`].
pub fn from_rgba_image(image: RgbaImage) -> Result<ImageBuffer> {
    let (w, h) = image.dimensions();
    ImageBuffer::new(w, h, image.into_raw())
}

/// Dimensions that fit `(width, height)` within the bounds, preserving aspect.
///
/// Returns the input dimensions when they already fit. Results are never
/// smaller than 1x1.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    let w = ((f64::from(width) * scale).round() as u32).clamp(1, max_width.max(1));
    let h = ((f64::from(height) * scale).round() as u32).clamp(1, max_height.max(1));
    (w, h)
}

/// Resize to exact dimensions.
pub fn resize(image: ImageBuffer, width: u32, height: u32) -> Result<ImageBuffer> {
    if width == 0 || height == 0 {
        return Err(Error::invalid("resize target must be non-zero"));
    }
    if image.width() == width && image.height() == height {
        return Ok(image);
    }
    let src = to_rgba_image(image)?;
    from_rgba_image(imageops::resize(&src, width, height, FilterType::Triangle))
}

/// Downscale to fit within the bounds. The flag reports whether it resized.
pub fn fit_within(
    image: ImageBuffer,
    max_width: u32,
    max_height: u32,
) -> Result<(ImageBuffer, bool)> {
    let (w, h) = fit_dimensions(image.width(), image.height(), max_width, max_height);
    if (w, h) == (image.width(), image.height()) {
        return Ok((image, false));
    }
    tracing::debug!(
        from_width = image.width(),
        from_height = image.height(),
        width = w,
        height = h,
        "downscaling to fit bounds"
    );
    Ok((resize(image, w, h)?, true))
}

/// Unsharp-mask sharpening.
pub fn sharpen(image: ImageBuffer, sigma: f32, threshold: i32) -> Result<ImageBuffer> {
    let src = to_rgba_image(image)?;
    from_rgba_image(imageops::unsharpen(&src, sigma, threshold))
}

/// Significant bits kept per color channel for a quality in `[0, 1]`.
///
/// Ranges from 3 bits at quality 0 to all 8 bits at quality 1.
pub fn quantize_bits(quality: f32) -> u8 {
    let q = if quality.is_finite() { quality.clamp(0.0, 1.0) } else { 1.0 };
    3 + (q * 5.0).round() as u8
}

/// Drop low-order color bits so the lossless encoder sees fewer distinct
/// values. Alpha is untouched. A no-op at 8 bits.
pub fn quantize_in_place(pixels: &mut [u8], bits: u8) {
    if bits >= 8 {
        return;
    }
    let mask = !((1u8 << (8 - bits)) - 1);
    for px in pixels.chunks_exact_mut(4) {
        px[0] &= mask;
        px[1] &= mask;
        px[2] &= mask;
    }
}
