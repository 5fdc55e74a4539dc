//! Per-page watermarking strategies.
//!
//! Each [`WatermarkMethod`](crate::watermark::WatermarkMethod) has one
//! strategy trait. The service only talks to the traits, so either side can
//! be replaced (tests use instrumented fakes).

pub mod draw;
pub mod overlay;

pub use draw::{DrawStrategy, DrawWatermarker, StampedPage};
pub use overlay::{OverlayStrategy, OverlayWatermarker};
