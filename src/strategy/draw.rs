//! Draw strategy: rasterize, stamp, replace.
//!
//! The per-page job is split in two halves. [`DrawWatermarker::stamp_page`]
//! does the expensive work (render, stamp, encode) against an immutable
//! renderer and can run on many pages at once.
//! [`DrawWatermarker::replace_page`] writes the result back into the
//! document and needs exclusive access to it.

use crate::error::{Result, WatermarkError};
use crate::pdf::{EmbeddedJpeg, PageRenderer, PdfDocument, RenderBackend};
use crate::watermark::{RasterWatermarker, WatermarkSpec};
use image::ImageFormat;
use std::sync::Arc;
use tracing::debug;

/// A page that has been rendered, stamped and encoded but not written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedPage {
    pub index: usize,
    pub image: EmbeddedJpeg,
}

/// Applies draw-method watermarks to single pages.
pub trait DrawWatermarker: Send + Sync {
    /// Build a renderer over a snapshot of `document`.
    fn open_renderer<'a>(&'a self, document: &PdfDocument)
        -> Result<Box<dyn PageRenderer + 'a>>;

    /// Render one page and stamp every spec onto it, in list order.
    fn stamp_page(
        &self,
        renderer: &dyn PageRenderer,
        page_index: usize,
        dpi: f32,
        specs: &[WatermarkSpec],
    ) -> Result<StampedPage>;

    /// Overwrite the page with its stamped raster.
    fn replace_page(&self, document: &mut PdfDocument, page: StampedPage) -> Result<()>;

    /// Stamp and replace one page.
    fn watermark(
        &self,
        document: &mut PdfDocument,
        renderer: &dyn PageRenderer,
        page_index: usize,
        dpi: f32,
        specs: &[WatermarkSpec],
    ) -> Result<()> {
        let stamped = self.stamp_page(renderer, page_index, dpi, specs)?;
        self.replace_page(document, stamped)
    }
}

/// Default draw strategy built on a [`RasterWatermarker`] and a render backend.
#[derive(Clone)]
pub struct DrawStrategy {
    watermarker: RasterWatermarker,
    backend: Arc<dyn RenderBackend>,
}

impl std::fmt::Debug for DrawStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawStrategy")
            .field("watermarker", &self.watermarker)
            .finish_non_exhaustive()
    }
}

impl DrawStrategy {
    pub fn new(watermarker: RasterWatermarker, backend: Arc<dyn RenderBackend>) -> Self {
        Self {
            watermarker,
            backend,
        }
    }

    pub fn watermarker(&self) -> &RasterWatermarker {
        &self.watermarker
    }
}

impl DrawWatermarker for DrawStrategy {
    fn open_renderer<'a>(
        &'a self,
        document: &PdfDocument,
    ) -> Result<Box<dyn PageRenderer + 'a>> {
        self.backend.open(document)
    }

    fn stamp_page(
        &self,
        renderer: &dyn PageRenderer,
        page_index: usize,
        dpi: f32,
        specs: &[WatermarkSpec],
    ) -> Result<StampedPage> {
        let mut raster = renderer.render_page(page_index, dpi)?;

        for spec in specs {
            self.watermarker.stamp(&mut raster, spec)?;
        }

        let (width, height) = raster.dimensions();
        let data = self.watermarker.encode(&raster, ImageFormat::Jpeg)?;

        debug!(
            page = page_index,
            width,
            height,
            specs = specs.len(),
            bytes = data.len(),
            "Stamped page raster"
        );

        Ok(StampedPage {
            index: page_index,
            image: EmbeddedJpeg {
                data,
                width,
                height,
            },
        })
    }

    fn replace_page(&self, document: &mut PdfDocument, page: StampedPage) -> Result<()> {
        if page.image.width == 0 || page.image.height == 0 {
            return Err(WatermarkError::Render {
                page: page.index,
                message: "rendered page is empty".to_string(),
            });
        }
        document.replace_with_image(page.index, &page.image)
    }
}
