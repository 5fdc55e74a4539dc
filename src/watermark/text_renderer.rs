//! Text watermark rendering.
//!
//! This module renders text watermarks to RGBA images that can be
//! composited onto target images.
//!
//! Rasterization sits behind the [`TextPainter`] trait so the engine only
//! owns the sequencing and coordinate math. [`GlyphPainter`] is the
//! production implementation built on `ab_glyph`.
//!
//! # Example
//!
//! ```ignore
//! use pagemark::watermark::text_renderer::{GlyphPainter, TextPainter, TextRenderOptions};
//! use pagemark::watermark::Color;
//!
//! let painter = GlyphPainter::discover()?;
//! let options = TextRenderOptions {
//!     text: "Copyright 2025".to_string(),
//!     font_size: 24.0,
//!     color: Color::white(),
//!     opacity: 1.0,
//! };
//!
//! let image = painter.render_text(&options)?;
//! ```

use super::Color;
use crate::error::{Result, WatermarkError};
use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Font files probed by [`GlyphPainter::discover`], in order.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Options for text rendering.
#[derive(Debug, Clone)]
pub struct TextRenderOptions {
    /// The text to render.
    pub text: String,
    /// Font size in pixels.
    pub font_size: f32,
    /// Text color (RGB).
    pub color: Color,
    /// Opacity baked into the rendered glyphs (0.0 to 1.0).
    pub opacity: f32,
}

impl Default for TextRenderOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: 24.0,
            color: Color::black(),
            opacity: 1.0,
        }
    }
}

/// Text measurement and rasterization capability.
pub trait TextPainter: Send + Sync {
    /// Calculate the dimensions of rendered text.
    ///
    /// Returns (width, height) in pixels.
    fn measure_text(&self, text: &str, font_size: f32) -> Result<(u32, u32)>;

    /// Render text to an RGBA image with a transparent background.
    ///
    /// The returned image has exactly the dimensions reported by
    /// [`measure_text`](TextPainter::measure_text).
    fn render_text(&self, options: &TextRenderOptions) -> Result<RgbaImage>;
}

/// `ab_glyph` backed painter.
#[derive(Clone)]
pub struct GlyphPainter {
    font: FontArc,
}

impl std::fmt::Debug for GlyphPainter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphPainter")
            .field("glyphs", &self.font.glyph_count())
            .finish()
    }
}

impl GlyphPainter {
    /// Load a TrueType/OpenType font from memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let font = FontArc::try_from_vec(data)
            .map_err(|e| WatermarkError::Text(format!("Invalid font data: {}", e)))?;
        Ok(Self { font })
    }

    /// Load a font file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            WatermarkError::Text(format!("Failed to read font {}: {}", path.display(), e))
        })?;
        debug!(font = %path.display(), "Loaded watermark font");
        Self::from_bytes(data)
    }

    /// Load the first usable font from common system locations.
    pub fn discover() -> Result<Self> {
        Self::discover_in(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from))
    }

    /// Load the first usable font from the given candidates.
    pub fn discover_in<I>(candidates: I) -> Result<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut tried = Vec::new();
        for candidate in candidates {
            if !candidate.is_file() {
                tried.push(candidate);
                continue;
            }
            match Self::from_file(&candidate) {
                Ok(painter) => return Ok(painter),
                Err(e) => {
                    debug!(font = %candidate.display(), error = %e, "Skipping unusable font");
                    tried.push(candidate);
                }
            }
        }

        Err(WatermarkError::Text(format!(
            "No usable font found (tried {} locations); configure font.path",
            tried.len()
        )))
    }
}

impl TextPainter for GlyphPainter {
    fn measure_text(&self, text: &str, font_size: f32) -> Result<(u32, u32)> {
        let scaled_font = self.font.as_scaled(PxScale::from(font_size));

        let mut width = 0.0f32;
        let mut prev_glyph: Option<ab_glyph::GlyphId> = None;

        for c in text.chars() {
            let glyph_id = scaled_font.glyph_id(c);

            // Add kerning if there's a previous glyph
            if let Some(prev) = prev_glyph {
                width += scaled_font.kern(prev, glyph_id);
            }

            width += scaled_font.h_advance(glyph_id);
            prev_glyph = Some(glyph_id);
        }

        let height = scaled_font.height();

        // Small padding so antialiased edges are not cut off
        let padding = 2;
        Ok((
            width.ceil().max(0.0) as u32 + padding,
            height.ceil().max(0.0) as u32 + padding,
        ))
    }

    fn render_text(&self, options: &TextRenderOptions) -> Result<RgbaImage> {
        if options.text.is_empty() {
            return Err(WatermarkError::Text("Cannot render empty text".to_string()));
        }

        let scale = PxScale::from(options.font_size);
        let scaled_font = self.font.as_scaled(scale);

        let (width, height) = self.measure_text(&options.text, options.font_size)?;
        let (canvas_width, canvas_height) = (width.max(1), height.max(1));
        let mut image = RgbaImage::new(canvas_width, canvas_height);

        let alpha = (options.opacity.clamp(0.0, 1.0) * 255.0) as u8;
        let baseline_y = scaled_font.ascent();

        let mut cursor_x = 0.0f32;
        let mut prev_glyph: Option<ab_glyph::GlyphId> = None;

        for c in options.text.chars() {
            let glyph_id = scaled_font.glyph_id(c);

            if let Some(prev) = prev_glyph {
                cursor_x += scaled_font.kern(prev, glyph_id);
            }

            let glyph =
                glyph_id.with_scale_and_position(scale, ab_glyph::point(cursor_x, baseline_y));

            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();

                outlined.draw(|px, py, coverage| {
                    let x = px as i32 + bounds.min.x as i32;
                    let y = py as i32 + bounds.min.y as i32;

                    if x >= 0 && y >= 0 && x < canvas_width as i32 && y < canvas_height as i32 {
                        let pixel = options.color.to_rgba((coverage * alpha as f32) as u8);
                        let existing = image.get_pixel(x as u32, y as u32);
                        let blended = blend_pixels(*existing, pixel);
                        image.put_pixel(x as u32, y as u32, blended);
                    }
                });
            }

            cursor_x += scaled_font.h_advance(glyph_id);
            prev_glyph = Some(glyph_id);
        }

        Ok(image)
    }
}

/// Blend two RGBA pixels using alpha compositing (for overlapping glyph edges).
fn blend_pixels(bottom: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    let top_alpha = top[3] as f32 / 255.0;
    let bottom_alpha = bottom[3] as f32 / 255.0;

    let out_alpha = top_alpha + bottom_alpha * (1.0 - top_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |t: u8, b: u8| -> u8 {
        let t = t as f32 / 255.0;
        let b = b as f32 / 255.0;
        let result = (t * top_alpha + b * bottom_alpha * (1.0 - top_alpha)) / out_alpha;
        (result * 255.0) as u8
    };

    Rgba([
        blend(top[0], bottom[0]),
        blend(top[1], bottom[1]),
        blend(top[2], bottom[2]),
        (out_alpha * 255.0) as u8,
    ])
}
