//! Position calculation for watermark placement.
//!
//! This module computes where watermarks should be placed inside a container
//! (a raster image in pixels or a PDF crop box in points) based on the
//! configured position mode.
//!
//! # Position Modes
//!
//! - **9-grid positions**: TopLeft, TopCenter, TopRight, CenterLeft, Center,
//!   CenterRight, BottomLeft, BottomCenter, BottomRight
//! - **Tiled**: Repeating grid pattern across the entire container
//!
//! Coordinates are top-left anchors with the y axis pointing down. PDF
//! consumers flip them into user space themselves.
//!
//! # Example
//!
//! ```
//! use pagemark::watermark::position::{Coordinates, Extent, PositionResolver};
//! use pagemark::watermark::WatermarkPosition;
//!
//! let resolver = PositionResolver::new(10.0, 100.0);
//! let anchor = resolver.resolve(
//!     WatermarkPosition::BottomRight,
//!     Extent::new(800.0, 600.0),
//!     Extent::new(100.0, 50.0),
//! );
//! assert_eq!(anchor, Coordinates::new(690.0, 540.0)); // 800 - 100 - 10, 600 - 50 - 10
//! ```

use super::WatermarkPosition;
use crate::constants::{DEFAULT_MARGIN, DEFAULT_TILE_SPACING};

/// Width and height of a container or of the watermark placed in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub width: f32,
    pub height: f32,
}

impl Extent {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Extent of a pixel buffer.
    pub fn of_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f32, height as f32)
    }
}

/// Top-left anchor at which a watermark is placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub x: f32,
    pub y: f32,
}

impl Coordinates {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Converts symbolic positions into anchor coordinates.
///
/// Every strategy places watermarks through the same resolver so that the
/// clamping policy is applied consistently: anchors never go negative, and
/// a watermark that fits its container never leaves it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionResolver {
    margin: f32,
    tile_spacing: f32,
}

impl Default for PositionResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN, DEFAULT_TILE_SPACING)
    }
}

impl PositionResolver {
    pub fn new(margin: f32, tile_spacing: f32) -> Self {
        Self {
            margin: margin.max(0.0),
            tile_spacing: tile_spacing.max(0.0),
        }
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    pub fn tile_spacing(&self) -> f32 {
        self.tile_spacing
    }

    /// Calculate the anchor for a single watermark placement.
    ///
    /// For `Tiled` this returns the grid origin; use [`tile_positions`] or
    /// [`placements`] to get the whole grid.
    ///
    /// [`tile_positions`]: PositionResolver::tile_positions
    /// [`placements`]: PositionResolver::placements
    pub fn resolve(
        &self,
        position: WatermarkPosition,
        container: Extent,
        item: Extent,
    ) -> Coordinates {
        let m = self.margin;
        let center_x = (container.width - item.width) / 2.0;
        let center_y = (container.height - item.height) / 2.0;
        let right = container.width - item.width - m;
        let bottom = container.height - item.height - m;

        let raw = match position {
            // Top row
            WatermarkPosition::TopLeft => Coordinates::new(m, m),
            WatermarkPosition::TopCenter => Coordinates::new(center_x, m),
            WatermarkPosition::TopRight => Coordinates::new(right, m),

            // Center row
            WatermarkPosition::CenterLeft => Coordinates::new(m, center_y),
            WatermarkPosition::Center => Coordinates::new(center_x, center_y),
            WatermarkPosition::CenterRight => Coordinates::new(right, center_y),

            // Bottom row
            WatermarkPosition::BottomLeft => Coordinates::new(m, bottom),
            WatermarkPosition::BottomCenter => Coordinates::new(center_x, bottom),
            WatermarkPosition::BottomRight => Coordinates::new(right, bottom),

            WatermarkPosition::Tiled => Coordinates::new(0.0, 0.0),
        };

        clamp_to_bounds(raw, container, item)
    }

    /// Calculate positions for tiled watermark placement.
    ///
    /// Generates a row-major grid starting at the origin, stepping by the
    /// watermark size plus the tile spacing, until the container is covered.
    pub fn tile_positions(&self, container: Extent, item: Extent) -> Vec<Coordinates> {
        let step_x = (item.width + self.tile_spacing).max(1.0);
        let step_y = (item.height + self.tile_spacing).max(1.0);

        let mut positions = Vec::new();
        let mut y = 0.0f32;
        while y < container.height {
            let mut x = 0.0f32;
            while x < container.width {
                positions.push(Coordinates::new(x, y));
                x += step_x;
            }
            y += step_y;
        }

        positions
    }

    /// All anchors at which a watermark must be drawn.
    ///
    /// Trademark watermarks and the `Tiled` position produce the tile grid;
    /// everything else produces exactly one anchor.
    pub fn placements(
        &self,
        position: WatermarkPosition,
        is_trademark: bool,
        container: Extent,
        item: Extent,
    ) -> Vec<Coordinates> {
        if is_trademark || position == WatermarkPosition::Tiled {
            self.tile_positions(container, item)
        } else {
            vec![self.resolve(position, container, item)]
        }
    }
}

/// Clamp an anchor so the watermark stays inside the container.
///
/// When the watermark is larger than the container on an axis the anchor is
/// pinned to zero on that axis and the watermark overflows.
pub fn clamp_to_bounds(pos: Coordinates, container: Extent, item: Extent) -> Coordinates {
    let max_x = (container.width - item.width).max(0.0);
    let max_y = (container.height - item.height).max(0.0);

    Coordinates::new(pos.x.clamp(0.0, max_x), pos.y.clamp(0.0, max_y))
}
