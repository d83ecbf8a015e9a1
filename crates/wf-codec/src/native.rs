//! Native WebP codec collaborator.
//!
//! [`LibWebpCodec`] drives libwebp through the `webp` crate and exposes the
//! full tuning surface (lossy quality, method, passes, sharp YUV). It runs
//! synchronously; callers put it on a worker.

use wf_core::{Error, ImageBuffer, Result};

/// Tuning parameters passed to the native encoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecParams {
    /// 0-100.
    pub quality: f32,
    pub lossless: bool,
    /// Preserve RGB values under fully transparent pixels.
    pub exact: bool,
    /// Compression effort, 0 (fast) to 6 (slow, small).
    pub method: u8,
    /// Entropy-analysis passes, 1-10.
    pub passes: u8,
    pub use_sharp_yuv: bool,
}

impl Default for CodecParams {
    fn default() -> Self {
        Self {
            quality: 80.0,
            lossless: false,
            exact: false,
            method: 4,
            passes: 1,
            use_sharp_yuv: false,
        }
    }
}

impl CodecParams {
    /// Clamp every field into the range libwebp accepts.
    pub fn clamped(self) -> Self {
        Self {
            quality: if self.quality.is_finite() {
                self.quality.clamp(0.0, 100.0)
            } else {
                80.0
            },
            method: self.method.min(6),
            passes: self.passes.clamp(1, 10),
            ..self
        }
    }
}

/// A full-featured WebP encoder.
pub trait NativeCodec: Send + Sync {
    /// Human-readable codec name.
    fn name(&self) -> &'static str;

    /// Whether the codec can be used in this process.
    ///
    /// Must not panic; absence is a normal answer.
    fn is_available(&self) -> bool;

    /// Encode RGBA8 pixels to WebP bytes.
    fn encode_webp(&self, image: &ImageBuffer, params: &CodecParams) -> Result<Vec<u8>>;
}

/// libwebp-backed codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibWebpCodec;

impl LibWebpCodec {
    pub fn new() -> Self {
        Self
    }
}

impl NativeCodec for LibWebpCodec {
    fn name(&self) -> &'static str {
        "libwebp"
    }

    fn is_available(&self) -> bool {
        webp::WebPConfig::new().is_ok()
    }

    fn encode_webp(&self, image: &ImageBuffer, params: &CodecParams) -> Result<Vec<u8>> {
        let params = params.clamped();
        let encoder = webp::Encoder::from_rgba(image.pixels(), image.width(), image.height());

        let mut config = webp::WebPConfig::new()
            .map_err(|_| Error::codec(self.name(), "failed to create WebPConfig"))?;
        config.lossless = i32::from(params.lossless);
        config.quality = params.quality;
        config.exact = i32::from(params.exact);
        config.method = i32::from(params.method);
        config.pass = i32::from(params.passes);
        config.use_sharp_yuv = i32::from(params.use_sharp_yuv);

        let mem = encoder
            .encode_advanced(&config)
            .map_err(|e| Error::codec(self.name(), format!("WebP encode failed: {e:?}")))?;
        Ok(mem.to_vec())
    }
}

/// Stand-in for environments without a native codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCodec;

impl NativeCodec for UnavailableCodec {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn encode_webp(&self, _image: &ImageBuffer, _params: &CodecParams) -> Result<Vec<u8>> {
        Err(Error::unavailable(self.name(), "no native codec in this build"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lossless::is_webp;

    #[test]
    fn clamped_bounds_fields() {
        let p = CodecParams {
            quality: 250.0,
            method: 9,
            passes: 0,
            ..CodecParams::default()
        }
        .clamped();
        assert_eq!(p.quality, 100.0);
        assert_eq!(p.method, 6);
        assert_eq!(p.passes, 1);
    }

    #[test]
    fn libwebp_is_available() {
        assert!(LibWebpCodec::new().is_available());
    }

    #[test]
    fn libwebp_encodes_lossy_and_lossless() {
        let img = ImageBuffer::filled(32, 32, [200, 40, 40, 255]).unwrap();
        let codec = LibWebpCodec::new();

        let lossy = codec.encode_webp(&img, &CodecParams::default()).unwrap();
        assert!(is_webp(&lossy));

        let lossless = codec
            .encode_webp(
                &img,
                &CodecParams {
                    lossless: true,
                    exact: true,
                    method: 6,
                    ..CodecParams::default()
                },
            )
            .unwrap();
        assert!(is_webp(&lossless));
    }

    #[test]
    fn unavailable_codec_signals_unavailable() {
        let img = ImageBuffer::filled(1, 1, [0; 4]).unwrap();
        let err = UnavailableCodec
            .encode_webp(&img, &CodecParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable { .. }));
        assert!(!UnavailableCodec.is_available());
    }
}
