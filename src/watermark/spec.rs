//! Watermark specification types.
//!
//! A [`WatermarkSpec`] describes one text watermark: what to write, how big,
//! in which color, where on the page and with which rendering method. Specs
//! are plain values; the engine never mutates them and applies the same spec
//! to every page of a document.

use crate::constants::DEFAULT_TEXT_SIZE;

/// Watermark position on the page or image.
///
/// Supports 9 fixed positions (grid), plus a tiled mode that repeats the
/// watermark across the whole container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WatermarkPosition {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    #[default]
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
    /// Repeating tile pattern across the entire container
    Tiled,
}

impl WatermarkPosition {
    /// Short name used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopCenter => "top-center",
            Self::TopRight => "top-right",
            Self::CenterLeft => "center-left",
            Self::Center => "center",
            Self::CenterRight => "center-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomCenter => "bottom-center",
            Self::BottomRight => "bottom-right",
            Self::Tiled => "tiled",
        }
    }
}

/// How a watermark is put on a PDF page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WatermarkMethod {
    /// Rasterize the page, stamp the raster and replace the page content with it.
    #[default]
    Draw,
    /// Append vector text operators to the existing page content.
    Overlay,
}

impl WatermarkMethod {
    /// Phase order used by the service. Draw always completes before overlay
    /// starts because overlay writes on top of whatever content draw left.
    pub const PHASES: [WatermarkMethod; 2] = [WatermarkMethod::Draw, WatermarkMethod::Overlay];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draw => "draw",
            Self::Overlay => "overlay",
        }
    }
}

/// RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// White color.
    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Black color.
    pub fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// Color as an RGBA pixel with the given alpha.
    pub fn to_rgba(&self, alpha: u8) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, alpha])
    }

    /// Components scaled to 0.0..=1.0 for PDF color operators.
    pub fn to_pdf_rgb(&self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// A single text watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkSpec {
    /// Text content
    pub text: String,
    /// Font size (pixels for raster output, points for overlay)
    pub text_size: u32,
    /// Text color
    pub color: Color,
    /// Repeat the text across the container instead of placing it once
    pub is_trademark: bool,
    /// Position on the page or image
    pub position: WatermarkPosition,
    /// Rendering method for PDF pages
    pub method: WatermarkMethod,
}

impl WatermarkSpec {
    /// Create a spec with default styling (24px black text, centered, draw method).
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            text_size: DEFAULT_TEXT_SIZE,
            color: Color::default(),
            is_trademark: false,
            position: WatermarkPosition::default(),
            method: WatermarkMethod::default(),
        }
    }

    pub fn with_size(mut self, text_size: u32) -> Self {
        self.text_size = text_size;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_position(mut self, position: WatermarkPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_method(mut self, method: WatermarkMethod) -> Self {
        self.method = method;
        self
    }

    pub fn trademark(mut self, is_trademark: bool) -> Self {
        self.is_trademark = is_trademark;
        self
    }

    /// True when the spec asks for a repeated grid rather than a single placement.
    pub fn is_tiled(&self) -> bool {
        self.is_trademark || self.position == WatermarkPosition::Tiled
    }
}
