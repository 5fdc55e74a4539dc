//! Page rasterization.
//!
//! A [`RenderBackend`] produces a [`PageRenderer`] bound to an immutable
//! snapshot of a document. Renderers are `Send + Sync` and own everything
//! they need, so one renderer can serve many page tasks at once while the
//! document itself is being rewritten.
//!
//! Two backends ship with the crate:
//!
//! - [`EmbeddedImageBackend`]: lopdf only. Handles pages whose visible
//!   content is nothing but image XObjects, which covers scanned documents.
//!   Any other page is a render error rather than a lossy guess.
//! - `PdfiumBackend` (feature `pdfium`): full rasterization through PDFium.

use super::{PageBox, PdfDocument};
use crate::error::{Result, WatermarkError};
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, trace};

/// Rasterizes pages of one document snapshot.
pub trait PageRenderer: Send + Sync {
    /// Render a zero-based page index at `dpi` dots per inch.
    ///
    /// The raster covers the page crop box: `width * dpi / 72` by
    /// `height * dpi / 72` pixels.
    fn render_page(&self, index: usize, dpi: f32) -> Result<RgbaImage>;
}

/// Creates renderers for documents.
pub trait RenderBackend: Send + Sync {
    fn open<'a>(&'a self, document: &PdfDocument) -> Result<Box<dyn PageRenderer + 'a>>;
}

/// Pixel size of a page box rendered at `dpi`.
pub fn raster_size(page_box: &PageBox, dpi: f32) -> (u32, u32) {
    let scale = dpi / 72.0;
    (
        ((page_box.width() * scale).round() as u32).max(1),
        ((page_box.height() * scale).round() as u32).max(1),
    )
}

/// Renders pages made of embedded raster images.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedImageBackend;

impl EmbeddedImageBackend {
    pub fn new() -> Self {
        Self
    }
}

impl RenderBackend for EmbeddedImageBackend {
    fn open<'a>(&'a self, document: &PdfDocument) -> Result<Box<dyn PageRenderer + 'a>> {
        let doc = document.inner();
        let pages = (0..document.page_count())
            .map(|index| {
                let page_id = document.page_id(index)?;
                let page_box = document.page_box(index)?;
                Ok(match document.page_content(index) {
                    Ok(content) => image_layout(doc, page_id, page_box, &content),
                    Err(e) => Err(format!("unreadable page content: {}", e)),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            pages = pages.len(),
            renderable = pages.iter().filter(|p| p.is_ok()).count(),
            "Opened embedded image renderer"
        );
        Ok(Box::new(EmbeddedImageRenderer { pages }))
    }
}

/// Encoded image data copied out of a page.
#[derive(Debug, Clone)]
enum PageImage {
    Jpeg(Vec<u8>),
    Raw {
        width: u32,
        height: u32,
        channels: u8,
        data: Vec<u8>,
    },
}

impl PageImage {
    fn decode(&self) -> std::result::Result<RgbaImage, String> {
        match self {
            PageImage::Jpeg(data) => image::load_from_memory_with_format(data, ImageFormat::Jpeg)
                .map(|img| img.to_rgba8())
                .map_err(|e| e.to_string()),
            PageImage::Raw {
                width,
                height,
                channels,
                data,
            } => {
                let pixels = (*width as usize) * (*height as usize);
                if data.len() < pixels * *channels as usize {
                    return Err(format!(
                        "raw image data too short: {} bytes for {}x{}",
                        data.len(),
                        width,
                        height
                    ));
                }

                let mut rgba = Vec::with_capacity(pixels * 4);
                match channels {
                    3 => {
                        for chunk in data[..pixels * 3].chunks(3) {
                            rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
                        }
                    }
                    _ => {
                        for &gray in &data[..pixels] {
                            rgba.extend_from_slice(&[gray, gray, gray, 255]);
                        }
                    }
                }
                RgbaImage::from_raw(*width, *height, rgba)
                    .ok_or_else(|| "raw image buffer size mismatch".to_string())
            }
        }
    }
}

/// An image painted at an axis-aligned rectangle in user space.
#[derive(Debug, Clone)]
struct PlacedImage {
    image: PageImage,
    rect: PageBox,
}

#[derive(Debug, Clone)]
struct PageLayout {
    page_box: PageBox,
    images: Vec<PlacedImage>,
}

struct EmbeddedImageRenderer {
    pages: Vec<std::result::Result<PageLayout, String>>,
}

impl PageRenderer for EmbeddedImageRenderer {
    fn render_page(&self, index: usize, dpi: f32) -> Result<RgbaImage> {
        let page = self.pages.get(index).ok_or(WatermarkError::PageOutOfRange {
            index,
            count: self.pages.len(),
        })?;
        let layout = page.as_ref().map_err(|message| WatermarkError::Render {
            page: index,
            message: message.clone(),
        })?;

        let page_box = layout.page_box;
        let scale = dpi / 72.0;
        let (width, height) = raster_size(&page_box, dpi);
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        for placed in &layout.images {
            let decoded = placed
                .image
                .decode()
                .map_err(|message| WatermarkError::Render { page: index, message })?;

            // Image space has y up; the canvas has y down from the box top
            let x = ((placed.rect.llx - page_box.llx) * scale).round() as i64;
            let y = ((page_box.ury - placed.rect.ury) * scale).round() as i64;
            let target_w = ((placed.rect.width() * scale).round() as u32).max(1);
            let target_h = ((placed.rect.height() * scale).round() as u32).max(1);

            let resized = if decoded.dimensions() == (target_w, target_h) {
                decoded
            } else {
                imageops::resize(&decoded, target_w, target_h, FilterType::Triangle)
            };
            imageops::overlay(&mut canvas, &resized, x, y);
        }

        trace!(page = index, dpi, width, height, "Rendered embedded page images");
        Ok(canvas)
    }
}

/// Current transformation matrix `[a b c d e f]`.
type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn concat(m: &Matrix, ctm: &Matrix) -> Matrix {
    [
        m[0] * ctm[0] + m[1] * ctm[2],
        m[0] * ctm[1] + m[1] * ctm[3],
        m[2] * ctm[0] + m[3] * ctm[2],
        m[2] * ctm[1] + m[3] * ctm[3],
        m[4] * ctm[0] + m[5] * ctm[2] + ctm[4],
        m[4] * ctm[1] + m[5] * ctm[3] + ctm[5],
    ]
}

/// Operators that put marks on the page other than through `Do`.
const MARKING_OPERATORS: &[&str] = &[
    "f", "F", "f*", "B", "B*", "b", "b*", "S", "s", "sh", "BI", "ID", "EI",
];

const TEXT_SHOWING_OPERATORS: &[&str] = &["Tj", "TJ", "'", "\""];

/// Text render mode that paints nothing (OCR layers of scans).
const INVISIBLE_TEXT: i64 = 3;

#[derive(Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
    text_mode: i64,
}

/// Work out which images make up a page.
///
/// The page qualifies when every visible mark is an image XObject drawn
/// without rotation or mirroring. Invisible text is allowed.
fn image_layout(
    doc: &Document,
    page_id: ObjectId,
    page_box: PageBox,
    content: &[u8],
) -> std::result::Result<PageLayout, String> {
    let content =
        Content::decode(content).map_err(|e| format!("unreadable page content: {}", e))?;
    let xobjects = page_resources(doc, page_id)
        .and_then(|resources| resolve_dict(doc, resources.get(b"XObject").ok()?));

    let mut state = GraphicsState {
        ctm: IDENTITY,
        text_mode: 0,
    };
    let mut saved = Vec::new();
    let mut images = Vec::new();

    for operation in &content.operations {
        let operator = operation.operator.as_str();
        match operator {
            "q" => saved.push(state),
            "Q" => state = saved.pop().unwrap_or(state),
            "cm" => {
                let matrix = matrix_operands(&operation.operands)
                    .ok_or_else(|| "malformed cm operator".to_string())?;
                state.ctm = concat(&matrix, &state.ctm);
            }
            "Tr" => {
                state.text_mode = operation
                    .operands
                    .first()
                    .and_then(|o| o.as_i64().ok())
                    .unwrap_or(0);
            }
            "Do" => {
                let name = operation
                    .operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .ok_or_else(|| "malformed Do operator".to_string())?;
                let stream = xobjects
                    .and_then(|dict| dict.get(name).ok())
                    .and_then(|object| resolve_stream(doc, object))
                    .ok_or_else(|| {
                        format!("missing XObject /{}", String::from_utf8_lossy(name))
                    })?;
                if !is_image(stream) {
                    return Err("page draws a form XObject".to_string());
                }
                let [a, b, c, d, e, f] = state.ctm;
                if b != 0.0 || c != 0.0 || a <= 0.0 || d <= 0.0 {
                    return Err("page draws a rotated or mirrored image".to_string());
                }
                let image = page_image(doc, stream)
                    .ok_or_else(|| "unsupported image encoding".to_string())?;
                images.push(PlacedImage {
                    image,
                    rect: PageBox {
                        llx: e,
                        lly: f,
                        urx: e + a,
                        ury: f + d,
                    },
                });
            }
            op if TEXT_SHOWING_OPERATORS.contains(&op) => {
                if state.text_mode != INVISIBLE_TEXT {
                    return Err("page has visible text".to_string());
                }
            }
            op if MARKING_OPERATORS.contains(&op) => {
                return Err(format!("page has vector content ({})", op));
            }
            _ => {}
        }
    }

    if images.is_empty() {
        return Err("page has no embedded image".to_string());
    }
    Ok(PageLayout { page_box, images })
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    if operands.len() != 6 {
        return None;
    }
    let mut matrix = IDENTITY;
    for (slot, operand) in matrix.iter_mut().zip(operands) {
        *slot = operand.as_float().ok()?;
    }
    Some(matrix)
}

fn resolve_stream<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Stream> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_stream().ok(),
        Object::Stream(stream) => Some(stream),
        _ => None,
    }
}

fn is_image(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype").and_then(Object::as_name), Ok(b"Image"))
}

fn page_image(doc: &Document, stream: &Stream) -> Option<PageImage> {
    let dict = &stream.dict;

    let filter = match dict.get(b"Filter") {
        Ok(Object::Name(name)) => Some(name.as_slice()),
        Ok(Object::Array(filters)) => filters.last().and_then(|f| f.as_name().ok()),
        _ => None,
    };
    if filter == Some(b"DCTDecode".as_slice()) {
        return Some(PageImage::Jpeg(stream.content.clone()));
    }
    if filter.is_some() && filter != Some(b"FlateDecode".as_slice()) {
        trace!("Skipping image with unsupported filter");
        return None;
    }

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        return None;
    }

    let channels = match color_space(doc, dict)? {
        b"DeviceRGB" | b"RGB" | b"CalRGB" => 3,
        b"DeviceGray" | b"G" | b"CalGray" => 1,
        _ => return None,
    };

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;

    Some(PageImage::Raw {
        width,
        height,
        channels,
        data,
    })
}

fn color_space<'a>(doc: &'a Document, dict: &'a Dictionary) -> Option<&'a [u8]> {
    match dict.get(b"ColorSpace").ok()? {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(parts) => parts.first().and_then(|o| o.as_name().ok()),
        Object::Reference(id) => doc.get_object(*id).ok()?.as_name().ok(),
        _ => None,
    }
}

/// Page resources, inherited through the page tree when absent on the page.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    loop {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => {
                node = doc.get_object(*parent_id).ok()?.as_dict().ok()?;
            }
            _ => return None,
        }
    }
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

#[cfg(feature = "pdfium")]
pub use self::pdfium::PdfiumBackend;

#[cfg(feature = "pdfium")]
mod pdfium {
    use super::{PageRenderer, PdfDocument, RenderBackend};
    use crate::error::{Result, WatermarkError};
    use image::RgbaImage;
    use pdfium_render::prelude::*;
    use tracing::debug;

    /// Full page rasterization through PDFium.
    pub struct PdfiumBackend {
        pdfium: Pdfium,
    }

    impl PdfiumBackend {
        /// Bind to libpdfium.
        ///
        /// Searches for the library in:
        /// 1. Current directory (./libpdfium.so)
        /// 2. vendor/pdfium/lib/
        /// 3. System library paths
        pub fn new() -> Result<Self> {
            let bindings =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| {
                        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                            "./vendor/pdfium/lib/",
                        ))
                    })
                    .or_else(|_| Pdfium::bind_to_system_library())
                    .map_err(|e| WatermarkError::Render {
                        page: 0,
                        message: format!("Failed to load PDFium library: {:?}", e),
                    })?;

            Ok(Self {
                pdfium: Pdfium::new(bindings),
            })
        }
    }

    impl RenderBackend for PdfiumBackend {
        fn open<'a>(&'a self, document: &PdfDocument) -> Result<Box<dyn PageRenderer + 'a>> {
            let bytes = document.snapshot_bytes()?;
            debug!(bytes = bytes.len(), "Opened PDFium renderer");
            Ok(Box::new(PdfiumRenderer {
                pdfium: &self.pdfium,
                bytes,
            }))
        }
    }

    struct PdfiumRenderer<'a> {
        pdfium: &'a Pdfium,
        bytes: Vec<u8>,
    }

    impl PageRenderer for PdfiumRenderer<'_> {
        fn render_page(&self, index: usize, dpi: f32) -> Result<RgbaImage> {
            let render_error = |message: String| WatermarkError::Render {
                page: index,
                message,
            };

            let document = self
                .pdfium
                .load_pdf_from_byte_slice(&self.bytes, None)
                .map_err(|e| render_error(format!("failed to open snapshot: {:?}", e)))?;
            let page_index = u16::try_from(index)
                .map_err(|_| render_error("page index exceeds PDFium range".to_string()))?;
            let page = document
                .pages()
                .get(page_index)
                .map_err(|e| render_error(format!("failed to load page: {:?}", e)))?;

            let pixels_per_point = dpi / 72.0;
            let width = (page.width().value * pixels_per_point).ceil() as i32;
            let height = (page.height().value * pixels_per_point).ceil() as i32;

            let config = PdfRenderConfig::new()
                .set_target_width(width.max(1))
                .set_target_height(height.max(1));

            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| render_error(format!("failed to render page: {:?}", e)))?;

            Ok(bitmap.as_image().to_rgba8())
        }
    }
}
