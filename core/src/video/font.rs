//! Built-in user interface font.
//!
//! The glyphs are stored like a one-plane gfx ROM and go through the same
//! decoder as driver graphics.

use super::gfx::{DecodePlan, GfxElement, GfxError, GfxLayout, LayoutValue, PlaneOffsets, Sprite, Transparency, steps};
use super::{Bitmap, Pen};

/// Characters present in [`FONT_ROM`], in glyph order.
const FONT_CHARS: &[u8] = b" .-:0123456789ADEFPSU";

/// 4x5 glyphs, one byte per row, leftmost pixel in bit 7.
#[rustfmt::skip]
const FONT_ROM: [u8; FONT_CHARS.len() * 5] = [
    0x00, 0x00, 0x00, 0x00, 0x00, // ' '
    0x00, 0x00, 0x00, 0x00, 0x40, // '.'
    0x00, 0x00, 0xF0, 0x00, 0x00, // '-'
    0x00, 0x40, 0x00, 0x40, 0x00, // ':'
    0x60, 0x90, 0x90, 0x90, 0x60, // '0'
    0x20, 0x60, 0x20, 0x20, 0x70, // '1'
    0x60, 0x90, 0x20, 0x40, 0xF0, // '2'
    0x60, 0x90, 0x20, 0x90, 0x60, // '3'
    0x90, 0x90, 0xF0, 0x10, 0x10, // '4'
    0xF0, 0x80, 0xE0, 0x10, 0xE0, // '5'
    0x60, 0x80, 0xE0, 0x90, 0x60, // '6'
    0xF0, 0x10, 0x20, 0x40, 0x40, // '7'
    0x60, 0x90, 0x60, 0x90, 0x60, // '8'
    0x60, 0x90, 0x70, 0x10, 0x60, // '9'
    0x60, 0x90, 0xF0, 0x90, 0x90, // 'A'
    0xE0, 0x90, 0x90, 0x90, 0xE0, // 'D'
    0xF0, 0x80, 0xE0, 0x80, 0xF0, // 'E'
    0xF0, 0x80, 0xE0, 0x80, 0x80, // 'F'
    0xE0, 0x90, 0xE0, 0x80, 0x80, // 'P'
    0x70, 0x80, 0x60, 0x10, 0xE0, // 'S'
    0x90, 0x90, 0x90, 0x90, 0x60, // 'U'
];

pub const GLYPH_WIDTH: i32 = 4;
pub const GLYPH_HEIGHT: i32 = 5;

static FONT_PLANES: [LayoutValue; 1] = [LayoutValue::lit(0)];
static FONT_X: [LayoutValue; 4] = steps(0, 1);
static FONT_Y: [LayoutValue; 5] = steps(0, 8);

static FONT_LAYOUT: GfxLayout = GfxLayout {
    width: GLYPH_WIDTH as u16,
    height: GLYPH_HEIGHT as u16,
    total: LayoutValue::lit(FONT_CHARS.len() as u32),
    planes: 1,
    plane_offsets: PlaneOffsets::Bits(&FONT_PLANES),
    x_offsets: &FONT_X,
    y_offsets: &FONT_Y,
    increment: 40,
};

/// Decode the UI font. Its two pens start at `ui_pen_base`.
pub fn build_ui_font(ui_pen_base: Pen) -> Result<GfxElement, GfxError> {
    let plan = DecodePlan::resolve(&FONT_LAYOUT, FONT_ROM.len(), 0)?;
    let mut font = GfxElement::decode(&FONT_ROM, &plan)?;
    font.assign_colors(Some(ui_pen_base), 1);
    Ok(font)
}

fn glyph_code(ch: char) -> u32 {
    let ch = ch.to_ascii_uppercase();
    FONT_CHARS
        .iter()
        .position(|&c| char::from(c) == ch)
        .unwrap_or(0) as u32
}

/// Draw `text` with its top-left corner at (`x`, `y`). Characters the font
/// lacks are drawn as blanks.
pub fn draw_text(dest: &mut Bitmap, font: &GfxElement, text: &str, x: i32, y: i32) {
    let clip = dest.bounds();
    for (i, ch) in text.chars().enumerate() {
        let sprite = Sprite {
            code: glyph_code(ch),
            x: x + i as i32 * (GLYPH_WIDTH + 1),
            y,
            ..Sprite::default()
        };
        font.draw(dest, &sprite, &clip, Transparency::Pen(0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_glyph_decodes() {
        let font = build_ui_font(100).unwrap();
        assert_eq!(font.total_elements() as usize, FONT_CHARS.len());
        assert_eq!((font.width(), font.height()), (4, 5));
        assert_eq!(font.color_granularity(), 2);
    }

    #[test]
    fn zero_glyph_shape() {
        let font = build_ui_font(0).unwrap();
        let zero = glyph_code('0');
        let row0: Vec<u8> = (0..4).map(|x| font.pixel(zero, x, 0)).collect();
        let row1: Vec<u8> = (0..4).map(|x| font.pixel(zero, x, 1)).collect();
        assert_eq!(row0, [0, 1, 1, 0]);
        assert_eq!(row1, [1, 0, 0, 1]);
    }

    #[test]
    fn space_uses_only_background_pen() {
        let font = build_ui_font(0).unwrap();
        assert_eq!(font.pen_usage(glyph_code(' ')), Some(0b01));
        assert_eq!(font.pen_usage(glyph_code('8')), Some(0b11));
    }

    #[test]
    fn lowercase_and_unknown_characters() {
        assert_eq!(glyph_code('p'), glyph_code('P'));
        assert_eq!(glyph_code('#'), 0);
    }

    #[test]
    fn draw_text_uses_foreground_pen() {
        let font = build_ui_font(40).unwrap();
        let mut bitmap = Bitmap::new(32, 8, 16).unwrap();
        draw_text(&mut bitmap, &font, "1.", 1, 1);
        // '1' row 0 is 0x20: only the third pixel is lit.
        assert_eq!(bitmap.pixel(3, 1), Some(41));
        assert_eq!(bitmap.pixel(2, 1), Some(0));
        // '.' starts five pixels to the right and lights (1, 4).
        assert_eq!(bitmap.pixel(7, 5), Some(41));
        assert_eq!(bitmap.pixels().iter().filter(|&&p| p == 40).count(), 0);
    }

    #[test]
    fn text_is_clipped_to_bitmap() {
        let font = build_ui_font(0).unwrap();
        let mut bitmap = Bitmap::new(6, 3, 16).unwrap();
        draw_text(&mut bitmap, &font, "888", -2, -1);
        assert!(bitmap.pixels().iter().any(|&p| p == 1));
    }
}
