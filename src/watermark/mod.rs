//! Watermark module for applying text watermarks to rasters.
//!
//! This module owns everything that is independent of the PDF container:
//! the watermark description, placement math, text rasterization and alpha
//! compositing. The PDF strategies in [`crate::strategy`] build on it.
//!
//! # Features
//!
//! - **Text watermarks** in any RGB color and size
//! - **10 positioning modes**: 9-grid and tiled
//! - **Trademark mode** repeating the text across the whole container
//! - **Image entry point** ([`RasterWatermarker`]) for PNG and JPEG bytes

pub mod compositor;
pub mod position;
pub mod raster;
pub mod spec;
pub mod text_renderer;

// Re-export main types for convenience
pub use compositor::{Compositor, WatermarkLayer};
pub use position::{clamp_to_bounds, Coordinates, Extent, PositionResolver};
pub use raster::RasterWatermarker;
pub use spec::{Color, WatermarkMethod, WatermarkPosition, WatermarkSpec};
pub use text_renderer::{GlyphPainter, TextPainter, TextRenderOptions};
