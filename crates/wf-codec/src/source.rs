//! Image sources: SVG documents, encoded images, and ready raster buffers.

use resvg::{tiny_skia, usvg};
use wf_core::{Error, ImageBuffer, Result};

use crate::ops;

/// Input to a conversion before it is normalised into an [`ImageBuffer`].
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// SVG document text.
    Svg(String),
    /// Encoded PNG, JPEG, or WebP bytes.
    Encoded(Vec<u8>),
    /// Already rasterised pixels.
    Raster(ImageBuffer),
}

/// Turns a vector description into pixels.
pub trait Rasterizer: Send + Sync {
    /// Render `svg` at `scale`, shrinking further if needed to fit the bounds.
    fn rasterize(
        &self,
        svg: &str,
        max_width: u32,
        max_height: u32,
        scale: f32,
    ) -> Result<ImageBuffer>;
}

/// [`Rasterizer`] backed by resvg.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgRasterizer;

impl SvgRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl Rasterizer for SvgRasterizer {
    fn rasterize(
        &self,
        svg: &str,
        max_width: u32,
        max_height: u32,
        scale: f32,
    ) -> Result<ImageBuffer> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::invalid(format!("scale factor must be positive (got {scale})")));
        }
        let opts = usvg::Options::default();
        let tree = usvg::Tree::from_str(svg, &opts)
            .map_err(|e| Error::Raster(format!("parse svg: {e}")))?;

        let size = tree.size();
        let scaled_w = (size.width() * scale).ceil().max(1.0) as u32;
        let scaled_h = (size.height() * scale).ceil().max(1.0) as u32;
        let (width, height) =
            ops::fit_dimensions(scaled_w, scaled_h, max_width.max(1), max_height.max(1));
        let sx = width as f32 / size.width();
        let sy = height as f32 / size.height();

        let mut pixmap = tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| Error::Raster(format!("cannot allocate {width}x{height} pixmap")))?;
        resvg::render(&tree, tiny_skia::Transform::from_scale(sx, sy), &mut pixmap.as_mut());

        // tiny-skia stores premultiplied alpha; the pipeline works in straight alpha.
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for px in pixmap.pixels() {
            let c = px.demultiply();
            pixels.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        ImageBuffer::new(width, height, pixels)
    }
}

/// Normalise any [`ImageSource`] into an [`ImageBuffer`].
///
/// Encoded and raster inputs are not resized here; backends fit them to the
/// encode options.
pub fn load_source(
    source: ImageSource,
    rasterizer: &dyn Rasterizer,
    max_width: u32,
    max_height: u32,
    scale: f32,
) -> Result<ImageBuffer> {
    match source {
        ImageSource::Svg(svg) => rasterizer.rasterize(&svg, max_width, max_height, scale),
        ImageSource::Encoded(bytes) => {
            let decoded = image::load_from_memory(&bytes)
                .map_err(|e| Error::Raster(format!("decode image: {e}")))?;
            ops::from_rgba_image(decoded.to_rgba8())
        }
        ImageSource::Raster(buffer) => {
            buffer.validate()?;
            Ok(buffer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const RED_SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="20">
        <rect width="10" height="20" fill="#ff0000"/>
    </svg>"##;

    #[test]
    fn rasterizes_at_scale() {
        let img = SvgRasterizer::new().rasterize(RED_SQUARE, 1000, 1000, 2.0).unwrap();
        assert_eq!((img.width(), img.height()), (20, 40));
        assert_eq!(&img.pixels()[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn rasterize_fits_bounds() {
        let img = SvgRasterizer::new().rasterize(RED_SQUARE, 5, 5, 1.0).unwrap();
        assert!(img.width() <= 5 && img.height() <= 5);
        assert_eq!(img.height(), 5);
    }

    #[test]
    fn rasterize_rejects_garbage() {
        let err = SvgRasterizer::new().rasterize("<not-svg", 10, 10, 1.0).unwrap_err();
        assert!(matches!(err, Error::Raster(_)));
    }

    #[test]
    fn rasterize_rejects_bad_scale() {
        let err = SvgRasterizer::new().rasterize(RED_SQUARE, 10, 10, 0.0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn load_encoded_png() {
        let img = image::RgbaImage::from_raw(2, 1, vec![1, 2, 3, 255, 4, 5, 6, 255]).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let out = load_source(ImageSource::Encoded(buf), &SvgRasterizer, 100, 100, 1.0).unwrap();
        assert_eq!(out.pixels(), &[1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn load_raster_passes_through() {
        let img = ImageBuffer::filled(3, 3, [9; 4]).unwrap();
        let out = load_source(ImageSource::Raster(img.clone()), &SvgRasterizer, 1, 1, 1.0).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn load_corrupt_bytes_is_raster_error() {
        let corrupt = ImageSource::Encoded(vec![0, 1, 2]);
        let err = load_source(corrupt, &SvgRasterizer, 1, 1, 1.0).unwrap_err();
        assert!(matches!(err, Error::Raster(_)));
    }
}
