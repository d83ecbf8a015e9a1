//! Owned RGBA8 raster buffer passed (by move) through the pipeline.

use crate::error::{Error, Result};

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// A tightly packed, row-major, straight-alpha RGBA8 image.
///
/// The pixel length always equals `width * height * 4`; constructors reject
/// anything else. The buffer is exclusively owned by whichever stage holds it,
/// and backends may mutate it in place.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl ImageBuffer {
    /// Wrap an RGBA8 pixel vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either dimension is zero or the
    /// pixel length does not equal `width * height * 4`.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid(format!(
                "image dimensions must be non-zero (got {width}x{height})"
            )));
        }
        let expected = expected_len(width, height)
            .ok_or_else(|| Error::invalid(format!("image {width}x{height} is too large")))?;
        if pixels.len() != expected {
            return Err(Error::invalid(format!(
                "pixel buffer length {} does not match {width}x{height}x4 = {expected}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Create an image filled with a single RGBA color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let len = expected_len(width, height)
            .ok_or_else(|| Error::invalid(format!("image {width}x{height} is too large")))?;
        let pixels = rgba.iter().copied().cycle().take(len).collect();
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable access to the pixel data. The length cannot change.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Consume the buffer, returning the raw RGBA8 bytes.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Uncompressed size in bytes (`width * height * 4`).
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    /// Number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.pixels.len() / BYTES_PER_PIXEL
    }

    /// Re-check the length invariant.
    ///
    /// Useful after a collaborator hands a buffer back.
    pub fn validate(&self) -> Result<()> {
        match expected_len(self.width, self.height) {
            Some(n) if n == self.pixels.len() && n > 0 => Ok(()),
            _ => Err(Error::invalid(format!(
                "pixel buffer length {} does not match {}x{}x4",
                self.pixels.len(),
                self.width,
                self.height
            ))),
        }
    }
}

impl std::fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

fn expected_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(BYTES_PER_PIXEL)
}
