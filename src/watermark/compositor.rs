//! Watermark compositor for blending watermarks onto images.
//!
//! This module handles alpha blending of rendered watermark text onto target
//! images at positions computed by the [`PositionResolver`].
//!
//! [`PositionResolver`]: super::position::PositionResolver

use super::position::Coordinates;
use image::{Rgba, RgbaImage};

/// A watermark layer to be composited onto an image.
///
/// Layers borrow the rendered watermark so a tiled grid shares one raster.
#[derive(Clone, Copy)]
pub struct WatermarkLayer<'a> {
    /// The watermark image (RGBA).
    pub image: &'a RgbaImage,
    /// Top-left pixel where the watermark is placed.
    pub x: i64,
    pub y: i64,
    /// Opacity to apply (0.0 to 1.0). Applied on top of image's alpha channel.
    pub opacity: f32,
}

impl<'a> WatermarkLayer<'a> {
    /// Create a layer anchored at resolved coordinates (rounded to pixels).
    pub fn at(image: &'a RgbaImage, anchor: Coordinates, opacity: f32) -> Self {
        Self {
            image,
            x: anchor.x.round() as i64,
            y: anchor.y.round() as i64,
            opacity,
        }
    }
}

impl std::fmt::Debug for WatermarkLayer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkLayer")
            .field("dimensions", &(self.image.width(), self.image.height()))
            .field("position", &(self.x, self.y))
            .field("opacity", &self.opacity)
            .finish()
    }
}

/// Compositor for applying watermark layers to images.
#[derive(Debug, Default)]
pub struct Compositor<'a> {
    layers: Vec<WatermarkLayer<'a>>,
}

impl<'a> Compositor<'a> {
    /// Create a new compositor with no layers.
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a watermark layer to the compositor.
    pub fn add_layer(&mut self, layer: WatermarkLayer<'a>) {
        self.layers.push(layer);
    }

    /// Add one layer per anchor, all sharing the same watermark image.
    pub fn add_placements(
        &mut self,
        image: &'a RgbaImage,
        anchors: &[Coordinates],
        opacity: f32,
    ) {
        self.layers.extend(
            anchors
                .iter()
                .map(|anchor| WatermarkLayer::at(image, *anchor, opacity)),
        );
    }

    /// Apply all watermark layers to the target image.
    ///
    /// Layers are applied in the order they were added.
    pub fn apply(&self, target: &mut RgbaImage) {
        for layer in &self.layers {
            blend_layer(target, layer);
        }
    }

    /// Get the number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

/// Blend a single watermark layer onto the target image.
fn blend_layer(target: &mut RgbaImage, layer: &WatermarkLayer<'_>) {
    let target_width = target.width() as i64;
    let target_height = target.height() as i64;

    // Visible region, clamped to target bounds; overflow is cut off
    let x_start = layer.x.max(0);
    let y_start = layer.y.max(0);
    let x_end = (layer.x + layer.image.width() as i64).min(target_width);
    let y_end = (layer.y + layer.image.height() as i64).min(target_height);

    for ty in y_start..y_end {
        for tx in x_start..x_end {
            let wx = (tx - layer.x) as u32;
            let wy = (ty - layer.y) as u32;

            let wm_pixel = layer.image.get_pixel(wx, wy);
            let target_pixel = target.get_pixel(tx as u32, ty as u32);

            let blended = blend_pixels(*target_pixel, *wm_pixel, layer.opacity);
            target.put_pixel(tx as u32, ty as u32, blended);
        }
    }
}

/// Blend two pixels using alpha compositing with additional opacity.
///
/// Uses the "over" operator: result = foreground + background * (1 - foreground.alpha)
fn blend_pixels(background: Rgba<u8>, foreground: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let fg_alpha = (foreground[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
    let bg_alpha = background[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend_channel = |fg: u8, bg: u8| -> u8 {
        let fg_f = fg as f32 / 255.0;
        let bg_f = bg as f32 / 255.0;
        let result = (fg_f * fg_alpha + bg_f * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (result * 255.0).clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend_channel(foreground[0], background[0]),
        blend_channel(foreground[1], background[1]),
        blend_channel(foreground[2], background[2]),
        (out_alpha * 255.0) as u8,
    ])
}
