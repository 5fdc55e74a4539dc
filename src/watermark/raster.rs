//! Raster watermarking.
//!
//! Stamps text watermarks onto pixel buffers. Used directly for images and by
//! the draw strategy for rasterized PDF pages.

use super::compositor::Compositor;
use super::position::{Extent, PositionResolver};
use super::text_renderer::{TextPainter, TextRenderOptions};
use super::WatermarkSpec;
use crate::constants::{DEFAULT_JPEG_QUALITY, DEFAULT_OPACITY};
use crate::error::{Result, WatermarkError};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use tracing::trace;

/// Stamps text watermarks onto raster images.
#[derive(Clone)]
pub struct RasterWatermarker {
    painter: Arc<dyn TextPainter>,
    resolver: PositionResolver,
    opacity: f32,
    jpeg_quality: u8,
}

impl std::fmt::Debug for RasterWatermarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterWatermarker")
            .field("resolver", &self.resolver)
            .field("opacity", &self.opacity)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

impl RasterWatermarker {
    pub fn new(painter: Arc<dyn TextPainter>) -> Self {
        Self {
            painter,
            resolver: PositionResolver::default(),
            opacity: DEFAULT_OPACITY,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_resolver(mut self, resolver: PositionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Watermark encoded image bytes, returning bytes in the same format.
    ///
    /// The input buffer is left untouched.
    pub fn watermark(
        &self,
        image_bytes: &[u8],
        format: ImageFormat,
        spec: &WatermarkSpec,
    ) -> Result<Vec<u8>> {
        let decoded = image::load_from_memory_with_format(image_bytes, format)
            .map_err(|e| WatermarkError::Decode(e.to_string()))?;

        let mut rgba = decoded.to_rgba8();
        self.stamp(&mut rgba, spec)?;

        self.encode(&rgba, format)
    }

    /// Stamp one spec onto a pixel buffer in place.
    pub fn stamp(&self, image: &mut RgbaImage, spec: &WatermarkSpec) -> Result<()> {
        if spec.text.is_empty() || spec.text_size == 0 {
            return Ok(());
        }

        // Opacity is applied once, when the layer is blended
        let options = TextRenderOptions {
            text: spec.text.clone(),
            font_size: spec.text_size as f32,
            color: spec.color,
            opacity: 1.0,
        };
        let text_image = self.painter.render_text(&options)?;

        let container = Extent::of_pixels(image.width(), image.height());
        let item = Extent::of_pixels(text_image.width(), text_image.height());
        let anchors = self
            .resolver
            .placements(spec.position, spec.is_trademark, container, item);

        trace!(
            text_width = text_image.width(),
            text_height = text_image.height(),
            position = spec.position.as_str(),
            placements = anchors.len(),
            "Stamping raster watermark"
        );

        let mut compositor = Compositor::new();
        compositor.add_placements(&text_image, &anchors, self.opacity);
        compositor.apply(image);

        Ok(())
    }

    /// Encode a pixel buffer. JPEG output drops the alpha channel.
    pub fn encode(&self, image: &RgbaImage, format: ImageFormat) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());

        match format {
            ImageFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
                let encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
                DynamicImage::ImageRgb8(rgb)
                    .write_with_encoder(encoder)
                    .map_err(|e| WatermarkError::Encode(format!("jpeg: {}", e)))?;
            }
            other => {
                DynamicImage::ImageRgba8(image.clone())
                    .write_to(&mut buffer, other)
                    .map_err(|e| WatermarkError::Encode(format!("{:?}: {}", other, e)))?;
            }
        }

        Ok(buffer.into_inner())
    }
}
