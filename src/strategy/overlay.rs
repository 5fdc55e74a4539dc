//! Overlay strategy: vector text appended to the page content.

use crate::constants::DEFAULT_OPACITY;
use crate::error::Result;
use crate::pdf::font_metrics;
use crate::pdf::PdfDocument;
use crate::watermark::{Extent, PositionResolver, WatermarkSpec};
use tracing::debug;

/// Applies overlay-method watermarks to single pages.
pub trait OverlayWatermarker: Send + Sync {
    /// Append every spec to the page, in list order.
    fn watermark(
        &self,
        document: &mut PdfDocument,
        page_index: usize,
        specs: &[WatermarkSpec],
    ) -> Result<()>;
}

/// Default overlay strategy writing Helvetica text through the content appender.
#[derive(Debug, Clone, Copy)]
pub struct OverlayStrategy {
    resolver: PositionResolver,
    opacity: f32,
}

impl Default for OverlayStrategy {
    fn default() -> Self {
        Self::new(PositionResolver::default(), DEFAULT_OPACITY)
    }
}

impl OverlayStrategy {
    pub fn new(resolver: PositionResolver, opacity: f32) -> Self {
        Self {
            resolver,
            opacity: opacity.clamp(0.0, 1.0),
        }
    }
}

impl OverlayWatermarker for OverlayStrategy {
    fn watermark(
        &self,
        document: &mut PdfDocument,
        page_index: usize,
        specs: &[WatermarkSpec],
    ) -> Result<()> {
        let page_box = document.page_box(page_index)?;
        let container = Extent::new(page_box.width(), page_box.height());

        document.append_content(page_index, |appender| {
            for spec in specs {
                if spec.text.is_empty() || spec.text_size == 0 {
                    continue;
                }

                let size = spec.text_size as f32;
                let descent = font_metrics::descent(size);
                let item = Extent::new(
                    font_metrics::text_width(&spec.text, size),
                    font_metrics::cap_height(size) + descent,
                );
                let anchors =
                    self.resolver
                        .placements(spec.position, spec.is_trademark, container, item);

                appender.set_fill_color(spec.color);
                appender.set_opacity(self.opacity);
                appender.set_font(size);

                // Anchors are top-down; the baseline sits `descent` above the item bottom
                for anchor in &anchors {
                    let x = page_box.llx + anchor.x;
                    let y = page_box.lly + (container.height - anchor.y - item.height) + descent;
                    appender.draw_text(&spec.text, x, y);
                }

                debug!(
                    page = page_index,
                    position = spec.position.as_str(),
                    placements = anchors.len(),
                    "Overlaid watermark text"
                );
            }
            Ok(())
        })
    }
}
