// Shared fixtures for the unit test suite

use image::{Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use md5::{Digest, Md5};
use pagemark::error::{Result, WatermarkError};
use pagemark::pdf::{EmbeddedJpeg, PageRenderer, PdfDocument, RenderBackend};
use pagemark::strategy::{DrawWatermarker, OverlayWatermarker, StampedPage};
use pagemark::watermark::{TextPainter, TextRenderOptions, WatermarkSpec};
use parking_lot::Mutex;
use std::sync::Arc;

/// Paints every character as a solid block of `font_size / 2` by `font_size` pixels.
pub struct BlockPainter;

impl TextPainter for BlockPainter {
    fn measure_text(&self, text: &str, font_size: f32) -> Result<(u32, u32)> {
        let size = font_size.max(1.0) as u32;
        Ok((text.chars().count() as u32 * (size / 2).max(1), size))
    }

    fn render_text(&self, options: &TextRenderOptions) -> Result<RgbaImage> {
        let (width, height) = self.measure_text(&options.text, options.font_size)?;
        Ok(RgbaImage::from_pixel(
            width,
            height,
            options.color.to_rgba(255),
        ))
    }
}

/// Renders page `n` as a 64x48 canvas whose shade depends on `n`.
/// Pages listed in `failing` return a render error instead.
#[derive(Default)]
pub struct ShadedBackend {
    pub failing: Vec<usize>,
}

struct ShadedRenderer {
    failing: Vec<usize>,
}

impl PageRenderer for ShadedRenderer {
    fn render_page(&self, index: usize, _dpi: f32) -> Result<RgbaImage> {
        if self.failing.contains(&index) {
            return Err(WatermarkError::Render {
                page: index,
                message: "simulated renderer crash".to_string(),
            });
        }
        let shade = 255u8.saturating_sub((index as u8).wrapping_mul(20));
        Ok(RgbaImage::from_pixel(64, 48, Rgba([shade, shade, shade, 255])))
    }
}

impl RenderBackend for ShadedBackend {
    fn open<'a>(&'a self, _document: &PdfDocument) -> Result<Box<dyn PageRenderer + 'a>> {
        Ok(Box::new(ShadedRenderer {
            failing: self.failing.clone(),
        }))
    }
}

/// Calls made on the recording strategies, in the order they happened.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Draw strategy that records its calls and writes nothing back.
pub struct RecordingDraw {
    pub events: EventLog,
}

impl DrawWatermarker for RecordingDraw {
    fn open_renderer<'a>(
        &'a self,
        _document: &PdfDocument,
    ) -> Result<Box<dyn PageRenderer + 'a>> {
        self.events.lock().push("draw:open".to_string());
        Ok(Box::new(ShadedRenderer { failing: vec![] }))
    }

    fn stamp_page(
        &self,
        _renderer: &dyn PageRenderer,
        page_index: usize,
        _dpi: f32,
        specs: &[WatermarkSpec],
    ) -> Result<StampedPage> {
        let texts: Vec<&str> = specs.iter().map(|spec| spec.text.as_str()).collect();
        self.events
            .lock()
            .push(format!("draw:stamp:{}:{}", page_index, texts.join(",")));
        Ok(StampedPage {
            index: page_index,
            image: EmbeddedJpeg {
                data: Vec::new(),
                width: 1,
                height: 1,
            },
        })
    }

    fn replace_page(&self, _document: &mut PdfDocument, page: StampedPage) -> Result<()> {
        self.events
            .lock()
            .push(format!("draw:replace:{}", page.index));
        Ok(())
    }
}

/// Overlay strategy that records its calls and writes nothing.
pub struct RecordingOverlay {
    pub events: EventLog,
}

impl OverlayWatermarker for RecordingOverlay {
    fn watermark(
        &self,
        _document: &mut PdfDocument,
        page_index: usize,
        specs: &[WatermarkSpec],
    ) -> Result<()> {
        let texts: Vec<&str> = specs.iter().map(|spec| spec.text.as_str()).collect();
        self.events
            .lock()
            .push(format!("overlay:{}:{}", page_index, texts.join(",")));
        Ok(())
    }
}

/// Letter-sized pages with one line of text each.
pub fn text_document(pages: usize) -> Document {
    build_document(pages, |doc, index| {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Page {}", index + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().unwrap_or_default(),
        ));
        (content_id, None)
    })
}

/// Pages that each show one full-page grayscale image, like a scan.
pub fn scanned_document(pages: usize) -> Document {
    build_document(pages, |doc, index| {
        let (width, height) = (32i64, 24i64);
        let shade = 200u8.saturating_sub(index as u8 * 10);
        let pixels = vec![shade; (width * height) as usize];
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            pixels,
        ));
        let content = b"q 612 0 0 792 0 0 cm /Scan Do Q".to_vec();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let resources = dictionary! {
            "XObject" => dictionary! { "Scan" => image_id },
        };
        (content_id, Some(resources))
    })
}

/// Text pages that also paint a small logo in the top-left corner.
pub fn letterhead_document(pages: usize) -> Document {
    build_document(pages, |doc, index| {
        let logo_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 4,
                "Height" => 4,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0; 16],
        ));
        let content = format!(
            "q 40 0 0 40 20 740 cm /Logo Do Q BT /F1 12 Tf 72 700 Td (Invoice {}) Tj ET",
            index + 1
        );
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let resources = dictionary! {
            "XObject" => dictionary! { "Logo" => logo_id },
        };
        (content_id, Some(resources))
    })
}

/// Add an encryption dictionary reference to the trailer.
pub fn mark_encrypted(doc: &mut Document) {
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
    });
    doc.trailer.set("Encrypt", encrypt_id);
}

/// Serialize `text_document(pages)` protected with the standard security
/// handler (V4/R4, RC4 with a 128-bit key). Every stream is encrypted.
pub fn protected_document(pages: usize, user_password: &[u8], owner_password: &[u8]) -> Vec<u8> {
    const PERMISSIONS: i32 = -3900;
    let file_id = b"pagemark-fixture".to_vec();
    let mut doc = text_document(pages);

    let owner_key = md5_rounds(&padded_password(owner_password));
    let owner_entry = rc4_rounds(&owner_key, &padded_password(user_password));

    let mut seed = padded_password(user_password);
    seed.extend_from_slice(&owner_entry);
    seed.extend_from_slice(&(PERMISSIONS as u32).to_le_bytes());
    seed.extend_from_slice(&file_id);
    let file_key = md5_rounds(&seed);

    let mut check = Md5::new();
    check.update(PASSWORD_PAD);
    check.update(&file_id);
    let mut user_entry = rc4_rounds(&file_key, &check.finalize());
    user_entry.extend_from_slice(&PASSWORD_PAD[..16]);

    for (&id, object) in doc.objects.iter_mut() {
        if let Object::Stream(stream) = object {
            let sealed = rc4(&object_key(&file_key, id), &stream.content);
            stream.set_content(sealed);
        }
    }

    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 4,
        "R" => 4,
        "Length" => 128,
        "P" => PERMISSIONS as i64,
        "O" => Object::String(owner_entry, StringFormat::Hexadecimal),
        "U" => Object::String(user_entry, StringFormat::Hexadecimal),
        "CF" => dictionary! {
            "StdCF" => dictionary! {
                "Type" => "CryptFilter",
                "CFM" => "V2",
                "AuthEvent" => "DocOpen",
                "Length" => 16,
            },
        },
        "StmF" => "StdCF",
        "StrF" => "StdCF",
    });
    doc.trailer.set("Encrypt", encrypt_id);
    doc.trailer.set(
        "ID",
        vec![
            Object::String(file_id.clone(), StringFormat::Hexadecimal),
            Object::String(file_id, StringFormat::Hexadecimal),
        ],
    );

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize protected document");
    bytes
}

const PASSWORD_PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

fn padded_password(password: &[u8]) -> Vec<u8> {
    let len = password.len().min(32);
    let mut padded = password[..len].to_vec();
    padded.extend_from_slice(&PASSWORD_PAD[..32 - len]);
    padded
}

/// MD5 of `seed`, then 50 more rounds over the 16-byte digest.
fn md5_rounds(seed: &[u8]) -> Vec<u8> {
    let mut hash = Md5::digest(seed).to_vec();
    for _ in 0..50 {
        hash = Md5::digest(&hash).to_vec();
    }
    hash
}

/// RC4 with `key`, then 19 passes with the key bytes XORed by the pass number.
fn rc4_rounds(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = rc4(key, data);
    for round in 1..=19u8 {
        let round_key: Vec<u8> = key.iter().map(|byte| byte ^ round).collect();
        out = rc4(&round_key, &out);
    }
    out
}

fn object_key(file_key: &[u8], (number, generation): ObjectId) -> Vec<u8> {
    let mut seed = file_key.to_vec();
    seed.extend_from_slice(&number.to_le_bytes()[..3]);
    seed.extend_from_slice(&generation.to_le_bytes()[..2]);
    Md5::digest(&seed)[..16].to_vec()
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut state: Vec<u8> = (0..=255u8).collect();
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
        state.swap(i, j as usize);
    }

    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(state[i as usize]);
            state.swap(i as usize, j as usize);
            let k = state[state[i as usize].wrapping_add(state[j as usize]) as usize];
            byte ^ k
        })
        .collect()
}

fn build_document<F>(pages: usize, mut page_body: F) -> Document
where
    F: FnMut(&mut Document, usize) -> ((u32, u16), Option<Dictionary>),
{
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::with_capacity(pages);
    for index in 0..pages {
        let (content_id, resources) = page_body(&mut doc, index);
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if let Some(resources) = resources {
            page.set("Resources", resources);
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}
