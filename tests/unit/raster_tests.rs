// Raster watermarking unit tests
// Plain image watermarking outside of PDF documents

use super::support::*;
use image::{ImageFormat, Rgba, RgbaImage};
use pagemark::error::WatermarkError;
use pagemark::watermark::{
    Color, PositionResolver, RasterWatermarker, WatermarkPosition, WatermarkSpec,
};
use std::io::Cursor;
use std::sync::Arc;

fn watermarker() -> RasterWatermarker {
    RasterWatermarker::new(Arc::new(BlockPainter))
        .with_resolver(PositionResolver::new(0.0, 4.0))
        .with_opacity(1.0)
}

fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    let mut buffer = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => image::DynamicImage::ImageRgba8(img)
            .to_rgb8()
            .write_to(&mut buffer, format)
            .expect("encode"),
        _ => img.write_to(&mut buffer, format).expect("encode"),
    }
    buffer.into_inner()
}

#[test]
fn test_png_watermark_keeps_format_and_size() {
    let input = encoded(40, 30, ImageFormat::Png);
    let spec = WatermarkSpec::new("AB")
        .with_size(10)
        .with_color(Color::new(0, 0, 0))
        .with_position(WatermarkPosition::TopLeft);

    let output = watermarker()
        .watermark(&input, ImageFormat::Png, &spec)
        .expect("watermark");

    assert_eq!(image::guess_format(&output).expect("format"), ImageFormat::Png);
    let img = image::load_from_memory(&output).expect("decode").to_rgba8();
    assert_eq!(img.dimensions(), (40, 30));
    assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
    assert_eq!(img.get_pixel(39, 29).0, [255, 255, 255, 255]);
}

#[test]
fn test_jpeg_watermark_round_trips() {
    let input = encoded(32, 32, ImageFormat::Jpeg);
    let output = watermarker()
        .with_jpeg_quality(80)
        .watermark(&input, ImageFormat::Jpeg, &WatermarkSpec::new("X").with_size(8))
        .expect("watermark");

    assert_eq!(
        image::guess_format(&output).expect("format"),
        ImageFormat::Jpeg
    );
    let img = image::load_from_memory(&output).expect("decode");
    assert_eq!((img.width(), img.height()), (32, 32));
}

#[test]
fn test_trademark_covers_whole_image() {
    let mut img = RgbaImage::from_pixel(60, 60, Rgba([255, 255, 255, 255]));
    let spec = WatermarkSpec::new("T")
        .with_size(8)
        .with_color(Color::new(255, 0, 0))
        .trademark(true);

    watermarker().stamp(&mut img, &spec).expect("stamp");

    let red = img.pixels().filter(|p| p.0 == [255, 0, 0, 255]).count();
    // 4x8 tiles on a 8x12 grid step
    assert!(red > 32 * 10);
}

#[test]
fn test_empty_text_is_a_no_op() {
    let mut img = RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]));
    let before = img.clone();
    watermarker()
        .stamp(&mut img, &WatermarkSpec::new(""))
        .expect("stamp");
    assert_eq!(img, before);
}

#[test]
fn test_undecodable_input_rejected() {
    let err = watermarker()
        .watermark(b"definitely not a png", ImageFormat::Png, &WatermarkSpec::new("x"))
        .unwrap_err();
    assert!(matches!(err, WatermarkError::Decode(_)));
}
