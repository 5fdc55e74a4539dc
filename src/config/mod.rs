// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_DPI, DEFAULT_JPEG_QUALITY, DEFAULT_MARGIN, DEFAULT_OPACITY, DEFAULT_TILE_SPACING,
    DEFAULT_WORKERS, MAX_DPI, MIN_DPI,
};
use crate::error::{Result, WatermarkError};
use crate::watermark::GlyphPainter;

/// Engine tunables.
///
/// Every section is optional; missing keys fall back to the defaults in
/// [`crate::constants`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatermarkConfig {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub font: FontConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

fn default_dpi() -> f32 {
    DEFAULT_DPI
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

fn default_opacity() -> f32 {
    DEFAULT_OPACITY
}

fn default_margin() -> f32 {
    DEFAULT_MARGIN
}

fn default_tile_spacing() -> f32 {
    DEFAULT_TILE_SPACING
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

/// Page rasterization for the draw method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    /// Resolution pages are rendered at (default: 300)
    #[serde(default = "default_dpi")]
    pub dpi: f32,
    /// Quality of the JPEG written back into drawn pages, 1-100 (default: 90)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Watermark appearance shared by all specs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StyleConfig {
    /// Watermark opacity, 0.0-1.0 (default: 0.5)
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// Distance from the container edges for corner positions (default: 10)
    #[serde(default = "default_margin")]
    pub margin: f32,
    /// Gap between tiles in trademark/tiled mode (default: 100)
    #[serde(default = "default_tile_spacing")]
    pub tile_spacing: f32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            opacity: DEFAULT_OPACITY,
            margin: DEFAULT_MARGIN,
            tile_spacing: DEFAULT_TILE_SPACING,
        }
    }
}

/// Font used to rasterize draw-method text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FontConfig {
    /// TrueType/OpenType file; system fonts are probed when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Draw phase execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Render pages on a worker pool (default: true)
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Worker threads; 0 = one per core (default: 0)
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_parallel() -> bool {
    true
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl FontConfig {
    /// Load the configured font, or the first usable system font.
    pub fn painter(&self) -> Result<GlyphPainter> {
        match &self.path {
            Some(path) => GlyphPainter::from_file(path),
            None => GlyphPainter::discover(),
        }
    }
}

impl WatermarkConfig {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| WatermarkError::Config(e.to_string()))?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                WatermarkError::Config(format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                ))
            })?;
        }

        // Variables removed between the check and here substitute as empty
        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        let config: WatermarkConfig = serde_yaml::from_str(&substituted)
            .map_err(|e| WatermarkError::Config(e.to_string()))?;

        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| WatermarkError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(WatermarkError::Config(message));

        if !(MIN_DPI..=MAX_DPI).contains(&self.render.dpi) {
            return invalid(format!(
                "render.dpi must be between {} and {}, got {}",
                MIN_DPI, MAX_DPI, self.render.dpi
            ));
        }

        if !(1..=100).contains(&self.render.jpeg_quality) {
            return invalid(format!(
                "render.jpeg_quality must be between 1 and 100, got {}",
                self.render.jpeg_quality
            ));
        }

        if !(0.0..=1.0).contains(&self.style.opacity) {
            return invalid(format!(
                "style.opacity must be between 0.0 and 1.0, got {}",
                self.style.opacity
            ));
        }

        if !self.style.margin.is_finite() || self.style.margin < 0.0 {
            return invalid(format!(
                "style.margin must be non-negative, got {}",
                self.style.margin
            ));
        }

        if !self.style.tile_spacing.is_finite() || self.style.tile_spacing < 0.0 {
            return invalid(format!(
                "style.tile_spacing must be non-negative, got {}",
                self.style.tile_spacing
            ));
        }

        if let Some(path) = &self.font.path {
            if path.as_os_str().is_empty() {
                return invalid("font.path cannot be empty".to_string());
            }
        }

        Ok(())
    }
}
