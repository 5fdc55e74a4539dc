//! PDF document container.
//!
//! [`PdfDocument`] wraps a `lopdf::Document` and exposes the handful of
//! operations the watermark strategies need: page lookup, page boxes,
//! content replacement and appending (see [`content`]), security removal
//! and serialization. Page count and page order are never changed.

pub mod content;
pub mod font_metrics;
pub mod render;

pub use content::{ContentAppender, EmbeddedJpeg};
pub use render::{raster_size, EmbeddedImageBackend, PageRenderer, RenderBackend};

#[cfg(feature = "pdfium")]
pub use render::PdfiumBackend;

use crate::error::{Result, WatermarkError};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;
use tracing::debug;

/// US Letter, used when a page tree carries neither CropBox nor MediaBox.
const DEFAULT_PAGE_BOX: PageBox = PageBox {
    llx: 0.0,
    lly: 0.0,
    urx: 612.0,
    ury: 792.0,
};

/// Visible page rectangle in PDF user space (points, y axis up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PageBox {
    pub fn width(&self) -> f32 {
        (self.urx - self.llx).abs()
    }

    pub fn height(&self) -> f32 {
        (self.ury - self.lly).abs()
    }

    fn from_array(values: &[f32; 4]) -> Self {
        // Boxes may be written with any two opposite corners
        Self {
            llx: values[0].min(values[2]),
            lly: values[1].min(values[3]),
            urx: values[0].max(values[2]),
            ury: values[1].max(values[3]),
        }
    }
}

/// A loaded PDF document.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    inner: Document,
    pages: Vec<ObjectId>,
    overlay_font: Option<ObjectId>,
}

impl PdfDocument {
    /// Parse a document from memory.
    ///
    /// Documents protected only by an owner password are decrypted with the
    /// empty user password so their content can be rewritten.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let mut inner = Document::load_mem(bytes)?;

        if inner.is_encrypted() {
            debug!("Document is encrypted, trying empty user password");
            inner.decrypt("")?;
        }

        Ok(Self::from_document(inner))
    }

    /// Read and parse a document file.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::load(&bytes)
    }

    /// Wrap an already parsed document.
    pub fn from_document(inner: Document) -> Self {
        let pages = inner.get_pages().into_values().collect();
        Self {
            inner,
            pages,
            overlay_font: None,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Object id of the page at a zero-based index.
    pub fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.pages
            .get(index)
            .copied()
            .ok_or(WatermarkError::PageOutOfRange {
                index,
                count: self.pages.len(),
            })
    }

    /// Crop box of a page, falling back to the media box.
    ///
    /// Both boxes are inheritable, so the page tree is walked upwards.
    pub fn page_box(&self, index: usize) -> Result<PageBox> {
        let page_id = self.page_id(index)?;

        let found = self
            .inherited_box(page_id, b"CropBox")
            .or_else(|| self.inherited_box(page_id, b"MediaBox"));

        Ok(found.unwrap_or(DEFAULT_PAGE_BOX))
    }

    /// Decoded content of a page, all content streams concatenated.
    pub fn page_content(&self, index: usize) -> Result<Vec<u8>> {
        let page_id = self.page_id(index)?;
        Ok(self.inner.get_page_content(page_id)?)
    }

    /// True when the trailer carries an encryption dictionary.
    pub fn is_encrypted(&self) -> bool {
        self.inner.trailer.has(b"Encrypt")
    }

    /// Drop the encryption dictionary so the output is saved unprotected.
    pub fn strip_security(&mut self) {
        if let Some(encrypt) = self.inner.trailer.remove(b"Encrypt") {
            if let Object::Reference(id) = encrypt {
                self.inner.objects.remove(&id);
            }
            debug!("Removed document security");
        }
    }

    /// Serialize the document.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.inner.save_to(&mut output)?;
        Ok(output)
    }

    /// Serialize a copy of the document, leaving this one untouched.
    pub fn snapshot_bytes(&self) -> Result<Vec<u8>> {
        let mut copy = self.inner.clone();
        let mut output = Vec::new();
        copy.save_to(&mut output)?;
        Ok(output)
    }

    /// The underlying `lopdf` document.
    pub fn inner(&self) -> &Document {
        &self.inner
    }

    pub fn into_inner(self) -> Document {
        self.inner
    }

    fn page_dict(&self, page_id: ObjectId) -> Result<&Dictionary> {
        Ok(self.inner.get_object(page_id)?.as_dict()?)
    }

    fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary> {
        Ok(self.inner.get_object_mut(page_id)?.as_dict_mut()?)
    }

    fn inherited_box(&self, page_id: ObjectId, key: &[u8]) -> Option<PageBox> {
        let mut node = self.inner.get_object(page_id).ok()?.as_dict().ok()?;
        loop {
            if let Ok(value) = node.get(key) {
                if let Some(values) = self.rect(value) {
                    return Some(PageBox::from_array(&values));
                }
            }
            match node.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => {
                    node = self.inner.get_object(*parent_id).ok()?.as_dict().ok()?;
                }
                _ => return None,
            }
        }
    }

    fn rect(&self, value: &Object) -> Option<[f32; 4]> {
        let array = match value {
            Object::Reference(id) => self.inner.get_object(*id).ok()?.as_array().ok()?,
            Object::Array(array) => array,
            _ => return None,
        };
        if array.len() != 4 {
            return None;
        }

        let mut values = [0.0f32; 4];
        for (slot, item) in values.iter_mut().zip(array) {
            *slot = self.number(item)?;
        }
        Some(values)
    }

    fn number(&self, value: &Object) -> Option<f32> {
        match value {
            Object::Integer(i) => Some(*i as f32),
            Object::Real(r) => Some(*r),
            Object::Reference(id) => self.number(self.inner.get_object(*id).ok()?),
            _ => None,
        }
    }
}
