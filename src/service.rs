//! Watermark orchestration.
//!
//! [`WatermarkService`] applies a list of [`WatermarkSpec`]s to a whole
//! document. Specs are partitioned by method and each group runs as one
//! phase over every page, in the fixed order given by
//! [`WatermarkMethod::PHASES`]: all draw work finishes before any overlay
//! work starts.
//!
//! The draw phase can fan out over a rayon pool. Page tasks only render
//! and stamp; the stamped rasters are written back on the calling thread in
//! page order once every task has completed, so a parallel run produces the
//! same bytes as a sequential one.
//!
//! # Example
//!
//! ```ignore
//! use pagemark::config::WatermarkConfig;
//! use pagemark::pdf::{EmbeddedImageBackend, PdfDocument};
//! use pagemark::service::WatermarkService;
//! use pagemark::watermark::{GlyphPainter, WatermarkSpec};
//! use std::sync::Arc;
//!
//! let config = WatermarkConfig::from_file("pagemark.yaml")?;
//! let service = WatermarkService::from_config(
//!     &config,
//!     Arc::new(GlyphPainter::discover()?),
//!     Arc::new(EmbeddedImageBackend::new()),
//! )?;
//!
//! let mut document = PdfDocument::load_file("scan.pdf")?;
//! let output = service.watermark(&mut document, &[WatermarkSpec::new("CONFIDENTIAL")])?;
//! ```

use crate::config::WatermarkConfig;
use crate::constants::{DEFAULT_DPI, WORKER_THREAD_PREFIX};
use crate::error::{Result, WatermarkError};
use crate::pdf::{PdfDocument, RenderBackend};
use crate::strategy::{
    DrawStrategy, DrawWatermarker, OverlayStrategy, OverlayWatermarker, StampedPage,
};
use crate::watermark::{
    PositionResolver, RasterWatermarker, TextPainter, WatermarkMethod, WatermarkSpec,
};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// How the draw phase schedules page jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Parallel when an executor is configured, sequential otherwise
    #[default]
    Auto,
    /// Pages one after another on the calling thread
    Sequential,
    /// One task per page on the executor; requires an executor
    Parallel,
}

/// Builder for [`WatermarkService`].
///
/// Both strategies are required. Missing collaborators are reported by
/// [`build`](WatermarkServiceBuilder::build), before any page is touched.
#[derive(Default)]
pub struct WatermarkServiceBuilder {
    draw: Option<Arc<dyn DrawWatermarker>>,
    overlay: Option<Arc<dyn OverlayWatermarker>>,
    executor: Option<Arc<ThreadPool>>,
    execution: ExecutionMode,
    dpi: Option<f32>,
    image_watermarker: Option<RasterWatermarker>,
}

impl WatermarkServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(mut self, strategy: Arc<dyn DrawWatermarker>) -> Self {
        self.draw = Some(strategy);
        self
    }

    pub fn overlay(mut self, strategy: Arc<dyn OverlayWatermarker>) -> Self {
        self.overlay = Some(strategy);
        self
    }

    /// Worker pool for the draw phase.
    pub fn executor(mut self, pool: Arc<ThreadPool>) -> Self {
        self.executor = Some(pool);
        self
    }

    pub fn execution(mut self, mode: ExecutionMode) -> Self {
        self.execution = mode;
        self
    }

    /// Rendering resolution for the draw phase (default: 300).
    pub fn dpi(mut self, dpi: f32) -> Self {
        self.dpi = Some(dpi);
        self
    }

    /// Raster watermarker exposed for plain images.
    pub fn image_watermarker(mut self, watermarker: RasterWatermarker) -> Self {
        self.image_watermarker = Some(watermarker);
        self
    }

    pub fn build(self) -> Result<WatermarkService> {
        let draw = self
            .draw
            .ok_or(WatermarkError::ServiceUnavailable("draw"))?;
        let overlay = self
            .overlay
            .ok_or(WatermarkError::ServiceUnavailable("overlay"))?;

        let parallel = match self.execution {
            ExecutionMode::Auto => self.executor.is_some(),
            ExecutionMode::Sequential => false,
            ExecutionMode::Parallel => {
                if self.executor.is_none() {
                    return Err(WatermarkError::ExecutorUnavailable);
                }
                true
            }
        };

        let dpi = self.dpi.unwrap_or(DEFAULT_DPI);
        if !dpi.is_finite() || dpi <= 0.0 {
            return Err(WatermarkError::Config(format!(
                "dpi must be a positive number, got {}",
                dpi
            )));
        }

        debug!(
            parallel,
            dpi,
            workers = ?self.executor.as_ref().map(|pool| pool.current_num_threads()),
            "Built watermark service"
        );

        Ok(WatermarkService {
            draw,
            overlay,
            executor: self.executor,
            parallel,
            dpi,
            image_watermarker: self.image_watermarker,
        })
    }
}

/// Applies watermark specs to PDF documents.
pub struct WatermarkService {
    draw: Arc<dyn DrawWatermarker>,
    overlay: Arc<dyn OverlayWatermarker>,
    executor: Option<Arc<ThreadPool>>,
    parallel: bool,
    dpi: f32,
    image_watermarker: Option<RasterWatermarker>,
}

impl std::fmt::Debug for WatermarkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkService")
            .field("parallel", &self.parallel)
            .field("dpi", &self.dpi)
            .field(
                "workers",
                &self.executor.as_ref().map(|pool| pool.current_num_threads()),
            )
            .finish_non_exhaustive()
    }
}

impl WatermarkService {
    pub fn builder() -> WatermarkServiceBuilder {
        WatermarkServiceBuilder::new()
    }

    /// Build the default strategies from configuration.
    ///
    /// When `execution.parallel` is set a dedicated pool with
    /// `execution.workers` threads runs the draw phase.
    pub fn from_config(
        config: &WatermarkConfig,
        painter: Arc<dyn TextPainter>,
        backend: Arc<dyn RenderBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let resolver = PositionResolver::new(config.style.margin, config.style.tile_spacing);
        let raster = RasterWatermarker::new(painter)
            .with_resolver(resolver)
            .with_opacity(config.style.opacity)
            .with_jpeg_quality(config.render.jpeg_quality);

        let mut builder = Self::builder()
            .draw(Arc::new(DrawStrategy::new(raster.clone(), backend)))
            .overlay(Arc::new(OverlayStrategy::new(
                resolver,
                config.style.opacity,
            )))
            .dpi(config.render.dpi)
            .image_watermarker(raster);

        if config.execution.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.execution.workers)
                .thread_name(|index| format!("{}-{}", WORKER_THREAD_PREFIX, index))
                .build()
                .map_err(|e| WatermarkError::Config(format!("Failed to build worker pool: {}", e)))?;
            builder = builder
                .executor(Arc::new(pool))
                .execution(ExecutionMode::Parallel);
        } else {
            builder = builder.execution(ExecutionMode::Sequential);
        }

        builder.build()
    }

    /// True when the draw phase fans out over the executor.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    /// Raster watermarker for plain images, when one was configured.
    pub fn image_watermarker(&self) -> Option<&RasterWatermarker> {
        self.image_watermarker.as_ref()
    }

    /// Watermark a document in place and return its serialized bytes.
    ///
    /// Any failure aborts the whole call; no bytes are produced. The output
    /// is never encrypted.
    pub fn watermark(
        &self,
        document: &mut PdfDocument,
        specs: &[WatermarkSpec],
    ) -> Result<Vec<u8>> {
        let started = Instant::now();
        let page_count = document.page_count();

        info!(
            pages = page_count,
            specs = specs.len(),
            parallel = self.parallel,
            "Watermarking document"
        );

        for method in WatermarkMethod::PHASES {
            let group: Vec<WatermarkSpec> = specs
                .iter()
                .filter(|spec| spec.method == method)
                .cloned()
                .collect();

            if group.is_empty() {
                debug!(phase = method.as_str(), "No specs for phase, skipping");
                continue;
            }

            let phase_started = Instant::now();
            match method {
                WatermarkMethod::Draw => self.run_draw(document, &group)?,
                WatermarkMethod::Overlay => self.run_overlay(document, &group)?,
            }
            debug!(
                phase = method.as_str(),
                specs = group.len(),
                elapsed_ms = phase_started.elapsed().as_millis() as u64,
                "Phase complete"
            );
        }

        if document.is_encrypted() {
            document.strip_security();
        }

        let output = document.to_bytes()?;

        info!(
            pages = page_count,
            bytes = output.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Watermarked document"
        );
        Ok(output)
    }

    /// Load a document from bytes and watermark it.
    pub fn watermark_bytes(&self, pdf: &[u8], specs: &[WatermarkSpec]) -> Result<Vec<u8>> {
        let mut document = PdfDocument::load(pdf)?;
        self.watermark(&mut document, specs)
    }

    fn run_draw(&self, document: &mut PdfDocument, specs: &[WatermarkSpec]) -> Result<()> {
        let renderer = self.draw.open_renderer(document)?;
        let page_count = document.page_count();

        let pool = match &self.executor {
            Some(pool) if self.parallel => pool,
            _ => {
                for index in 0..page_count {
                    debug!(page = index, "Drawing page");
                    self.draw
                        .watermark(document, renderer.as_ref(), index, self.dpi, specs)?;
                }
                return Ok(());
            }
        };

        let draw = self.draw.as_ref();
        let renderer = renderer.as_ref();
        let dpi = self.dpi;

        // Blocks until every page task has finished
        let results: Vec<Result<StampedPage>> = pool.install(|| {
            (0..page_count)
                .into_par_iter()
                .map(|index| {
                    debug!(page = index, "Drawing page");
                    draw.stamp_page(renderer, index, dpi, specs)
                })
                .collect()
        });

        let mut stamped = Vec::with_capacity(page_count);
        let mut first_failure = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(page) => stamped.push(page),
                Err(e) => {
                    error!(
                        page = index,
                        error = %e,
                        "An error occurred during watermarking on page number {}",
                        index
                    );
                    if first_failure.is_none() {
                        first_failure = Some(WatermarkError::page_task(index, e));
                    }
                }
            }
        }
        if let Some(failure) = first_failure {
            return Err(failure);
        }

        for page in stamped {
            draw.replace_page(document, page)?;
        }
        Ok(())
    }

    fn run_overlay(&self, document: &mut PdfDocument, specs: &[WatermarkSpec]) -> Result<()> {
        for index in 0..document.page_count() {
            debug!(page = index, "Overlaying page");
            self.overlay.watermark(document, index, specs)?;
        }
        Ok(())
    }
}
