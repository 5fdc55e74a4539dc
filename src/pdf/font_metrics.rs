//! Metrics for the standard Helvetica font used by overlay watermarks.
//!
//! Widths come from the Adobe Helvetica AFM and are expressed in thousandths
//! of the font size. Helvetica is one of the 14 standard fonts, so overlay
//! text needs no embedded font program.

/// Glyph widths for character codes 32 (space) through 126 (`~`).
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
    278, 278, 584, 584, 584, 556, 1015, // :;<=>?@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A-M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
    278, 278, 278, 469, 556, 333, // [\]^_`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a-m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n-z
    334, 260, 334, 584, // {|}~
];

/// Width used for codes outside the printable ASCII range.
const DEFAULT_WIDTH: u16 = 556;

/// Height of capital letters above the baseline.
pub const CAP_HEIGHT: u16 = 718;

/// Depth of descenders below the baseline (negative, as in the AFM).
pub const DESCENDER: i16 = -207;

/// Width of a single character in font units.
pub fn char_width(c: char) -> u16 {
    let code = c as u32;
    if (32..=126).contains(&code) {
        HELVETICA_WIDTHS[(code - 32) as usize]
    } else {
        DEFAULT_WIDTH
    }
}

/// Width of `text` set in Helvetica at `font_size` points.
pub fn text_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| char_width(c) as u32).sum();
    units as f32 * font_size / 1000.0
}

/// Visible height of `font_size` point Helvetica capitals.
pub fn cap_height(font_size: f32) -> f32 {
    CAP_HEIGHT as f32 * font_size / 1000.0
}

/// Depth below the baseline reached by `font_size` point descenders.
pub fn descent(font_size: f32) -> f32 {
    -(DESCENDER as f32) * font_size / 1000.0
}

/// Encode text for a WinAnsi simple font.
///
/// Latin-1 characters map to their code, anything else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ 0x20..=0x7e | code @ 0xa0..=0xff => code as u8,
            _ => b'?',
        })
        .collect()
}
