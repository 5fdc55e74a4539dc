//! Text and trademark watermarking for PDF documents and raster images.
//!
//! - [`watermark`]: specs, placement math, text rasterization, compositing
//! - [`pdf`]: document container, content rewriting, page rendering
//! - [`strategy`]: the draw and overlay per-page strategies
//! - [`service`]: orchestration of both strategies over whole documents

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod pdf;
pub mod service;
pub mod strategy;
pub mod watermark;

pub use error::{Result, WatermarkError};
pub use service::{ExecutionMode, WatermarkService, WatermarkServiceBuilder};
