// Error types module

use thiserror::Error;

/// Centralized error type for watermarking
///
/// Configuration problems are reported before any page is touched; every
/// other variant aborts the whole `watermark` call.
#[derive(Debug, Error)]
pub enum WatermarkError {
    /// A required strategy collaborator was not configured
    #[error("Watermark service unavailable: no {0} strategy configured")]
    ServiceUnavailable(&'static str),

    /// Parallel execution was requested without a worker pool
    #[error("Parallel execution requested but no executor is configured")]
    ExecutorUnavailable,

    /// Invalid engine configuration (bad YAML, missing env vars, out of range values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Image bytes could not be decoded
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Image could not be re-encoded
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// Font loading or text rasterization failed
    #[error("Failed to render watermark text: {0}")]
    Text(String),

    /// Page rasterization failed
    #[error("Failed to render page {page}: {message}")]
    Render { page: usize, message: String },

    /// PDF structure, content stream or serialization failure
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Page index outside the document
    #[error("Page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A page task failed during parallel execution
    #[error("Watermarking failed on page {page}: {source}")]
    AsyncTask {
        page: usize,
        #[source]
        source: Box<WatermarkError>,
    },
}

impl WatermarkError {
    /// Wrap a failure raised inside a parallel page task.
    pub fn page_task(page: usize, source: WatermarkError) -> Self {
        Self::AsyncTask {
            page,
            source: Box::new(source),
        }
    }

    /// True for errors caused by how the service was assembled rather than by input.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable(_) | Self::ExecutorUnavailable | Self::Config(_)
        )
    }

    /// Page index the failure is attributed to, if any.
    pub fn page(&self) -> Option<usize> {
        match self {
            Self::AsyncTask { page, .. } | Self::Render { page, .. } => Some(*page),
            Self::PageOutOfRange { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Result type for watermarking operations
pub type Result<T> = std::result::Result<T, WatermarkError>;
