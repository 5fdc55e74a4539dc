// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Config defaults, builder defaults and strategy defaults all read from here.

// =============================================================================
// Rendering defaults
// =============================================================================

/// Default resolution for rasterizing pages in the draw method
pub const DEFAULT_DPI: f32 = 300.0;

/// Default quality of the intermediate JPEG written back into drawn pages
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

// =============================================================================
// Style defaults
// =============================================================================

/// Default watermark opacity; keeps the underlying content legible
pub const DEFAULT_OPACITY: f32 = 0.5;

/// Default distance between a corner watermark and the container edges
pub const DEFAULT_MARGIN: f32 = 10.0;

/// Default gap between repeated watermarks in tiled mode
pub const DEFAULT_TILE_SPACING: f32 = 100.0;

/// Default text size of a new watermark spec
pub const DEFAULT_TEXT_SIZE: u32 = 24;

// =============================================================================
// Execution defaults
// =============================================================================

/// Default worker count; 0 lets rayon pick one thread per core
pub const DEFAULT_WORKERS: usize = 0;

/// Thread name prefix of the page worker pool
pub const WORKER_THREAD_PREFIX: &str = "pagemark-worker";

// =============================================================================
// Validation limits
// =============================================================================

/// Lowest accepted rendering resolution
pub const MIN_DPI: f32 = 36.0;

/// Highest accepted rendering resolution
pub const MAX_DPI: f32 = 1200.0;
