//! Page content rewriting.
//!
//! Two ways to put a watermark into a page:
//!
//! - [`PdfDocument::replace_with_image`] throws the page content away and
//!   paints a single JPEG over the crop box (draw method).
//! - [`PdfDocument::append_content`] keeps the page content, isolates it in
//!   a saved graphics state and appends a new stream with text operators
//!   (overlay method).

use super::font_metrics::encode_win_ansi;
use super::PdfDocument;
use crate::error::Result;
use crate::watermark::Color;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};
use tracing::trace;

/// Resource name of the page image written by the draw method.
pub const PAGE_IMAGE_NAME: &str = "WmImg";

/// Resource name of the overlay font.
pub const OVERLAY_FONT_NAME: &str = "WmF1";

/// A baseline JPEG ready to be embedded as an image XObject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedJpeg {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Collects operators for a stream appended to a page.
///
/// Obtained through [`PdfDocument::append_content`]; everything recorded is
/// written to the page when the closure returns.
#[derive(Debug, Default)]
pub struct ContentAppender {
    operations: Vec<Operation>,
    graphics_states: Vec<(String, f32)>,
    uses_font: bool,
}

impl ContentAppender {
    fn new() -> Self {
        Self::default()
    }

    /// Set the non-stroking (fill) color used for text.
    pub fn set_fill_color(&mut self, color: Color) {
        let [r, g, b] = color.to_pdf_rgb();
        self.operations.push(Operation::new(
            "rg",
            vec![Object::Real(r), Object::Real(g), Object::Real(b)],
        ));
    }

    /// Set fill opacity through an ExtGState (`ca`).
    pub fn set_opacity(&mut self, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        let name = match self
            .graphics_states
            .iter()
            .find(|(_, alpha)| *alpha == opacity)
        {
            Some((name, _)) => name.clone(),
            None => {
                let name = format!("WmGs{}", self.graphics_states.len() + 1);
                self.graphics_states.push((name.clone(), opacity));
                name
            }
        };
        self.operations
            .push(Operation::new("gs", vec![Object::Name(name.into_bytes())]));
    }

    /// Select the overlay font (Helvetica) at `size` points.
    pub fn set_font(&mut self, size: f32) {
        self.uses_font = true;
        self.operations.push(Operation::new(
            "Tf",
            vec![OVERLAY_FONT_NAME.into(), Object::Real(size)],
        ));
    }

    /// Show `text` with its baseline starting at `(x, y)` in user space.
    pub fn draw_text(&mut self, text: &str, x: f32, y: f32) {
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tm",
                vec![
                    1.into(),
                    0.into(),
                    0.into(),
                    1.into(),
                    Object::Real(x),
                    Object::Real(y),
                ],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl PdfDocument {
    /// Replace everything on a page with `image`, scaled to the crop box.
    ///
    /// Previous content streams and resources are dropped from the page.
    pub fn replace_with_image(&mut self, index: usize, image: &EmbeddedJpeg) -> Result<()> {
        let page_id = self.page_id(index)?;
        let page_box = self.page_box(index)?;

        let image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            image.data.clone(),
        )
        .with_compression(false);
        let image_id = self.inner.add_object(image_stream);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(page_box.width()),
                        0.into(),
                        0.into(),
                        Object::Real(page_box.height()),
                        Object::Real(page_box.llx),
                        Object::Real(page_box.lly),
                    ],
                ),
                Operation::new("Do", vec![PAGE_IMAGE_NAME.into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self
            .inner
            .add_object(Stream::new(Dictionary::new(), content.encode()?));

        let page = self.page_dict_mut(page_id)?;
        page.set("Contents", content_id);
        page.set(
            "Resources",
            dictionary! {
                "XObject" => dictionary! { PAGE_IMAGE_NAME => image_id },
            },
        );

        trace!(
            page = index,
            width = image.width,
            height = image.height,
            bytes = image.data.len(),
            "Replaced page content with image"
        );
        Ok(())
    }

    /// Append content to a page through a scoped [`ContentAppender`].
    ///
    /// Existing content is wrapped in `q`/`Q` so its graphics state cannot
    /// leak into the appended stream. Whatever the closure recorded is
    /// written even when it returns an error; the error is then returned.
    pub fn append_content<F>(&mut self, index: usize, write: F) -> Result<()>
    where
        F: FnOnce(&mut ContentAppender) -> Result<()>,
    {
        let page_id = self.page_id(index)?;

        let mut appender = ContentAppender::new();
        let outcome = write(&mut appender);

        if !appender.is_empty() {
            self.flush_appender(index, page_id, appender)?;
        }

        outcome
    }

    fn flush_appender(
        &mut self,
        index: usize,
        page_id: ObjectId,
        appender: ContentAppender,
    ) -> Result<()> {
        let mut resources = self.effective_resources(page_id)?;

        if appender.uses_font {
            let font_id = self.overlay_font_id();
            let mut fonts = self.resource_category(&resources, b"Font")?;
            fonts.set(OVERLAY_FONT_NAME, font_id);
            resources.set("Font", fonts);
        }

        if !appender.graphics_states.is_empty() {
            let mut states = self.resource_category(&resources, b"ExtGState")?;
            for (name, alpha) in &appender.graphics_states {
                states.set(
                    name.as_str(),
                    dictionary! {
                        "Type" => "ExtGState",
                        "ca" => Object::Real(*alpha),
                        "CA" => Object::Real(*alpha),
                    },
                );
            }
            resources.set("ExtGState", states);
        }

        let save_id = self.inner.add_object(Stream::new(
            Dictionary::new(),
            Content {
                operations: vec![Operation::new("q", vec![])],
            }
            .encode()?,
        ));

        let mut operations = Vec::with_capacity(appender.operations.len() + 3);
        operations.push(Operation::new("Q", vec![]));
        operations.push(Operation::new("q", vec![]));
        operations.extend(appender.operations);
        operations.push(Operation::new("Q", vec![]));
        let operation_count = operations.len();
        let appended_id = self.inner.add_object(Stream::new(
            Dictionary::new(),
            Content { operations }.encode()?,
        ));

        let mut contents = vec![Object::Reference(save_id)];
        contents.extend(self.content_streams(page_id)?);
        contents.push(Object::Reference(appended_id));

        let page = self.page_dict_mut(page_id)?;

        page.set("Contents", contents);
        page.set("Resources", resources);

        trace!(page = index, operations = operation_count, "Appended page content");
        Ok(())
    }

    /// Entries of a page's `Contents`, with an indirect array spliced in.
    fn content_streams(&self, page_id: ObjectId) -> Result<Vec<Object>> {
        let contents = match self.page_dict(page_id)?.get(b"Contents") {
            Ok(contents) => contents,
            Err(_) => return Ok(Vec::new()),
        };

        match contents {
            Object::Array(streams) => Ok(streams.clone()),
            Object::Reference(id) => match self.inner.get_object(*id)? {
                Object::Array(streams) => Ok(streams.clone()),
                _ => Ok(vec![Object::Reference(*id)]),
            },
            other => Ok(vec![other.clone()]),
        }
    }

    /// Resources in effect for a page, copied so they can be extended locally.
    fn effective_resources(&self, page_id: ObjectId) -> Result<Dictionary> {
        let mut node = self.page_dict(page_id)?;
        loop {
            if let Ok(resources) = node.get(b"Resources") {
                return Ok(self.resolve_dict(resources)?.clone());
            }
            match node.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => {
                    node = self.inner.get_object(*parent_id)?.as_dict()?;
                }
                _ => return Ok(Dictionary::new()),
            }
        }
    }

    /// A resource sub-dictionary (`Font`, `ExtGState`, ...), resolved and copied.
    fn resource_category(&self, resources: &Dictionary, key: &[u8]) -> Result<Dictionary> {
        match resources.get(key) {
            Ok(category) => Ok(self.resolve_dict(category)?.clone()),
            Err(_) => Ok(Dictionary::new()),
        }
    }

    fn resolve_dict<'a>(&'a self, object: &'a Object) -> Result<&'a Dictionary> {
        match object {
            Object::Reference(id) => Ok(self.inner.get_object(*id)?.as_dict()?),
            other => Ok(other.as_dict()?),
        }
    }

    /// Helvetica font dictionary shared by every overlaid page.
    fn overlay_font_id(&mut self) -> ObjectId {
        if let Some(id) = self.overlay_font {
            return id;
        }
        let id = self.inner.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        self.overlay_font = Some(id);
        id
    }
}
