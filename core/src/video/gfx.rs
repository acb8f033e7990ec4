//! Graphics decoding: turns ROM bytes into rendering-ready tile and sprite sets.
//!
//! A [`GfxLayout`] describes where each bit of each pixel lives, in bits from
//! the start of an element. Offsets and the element count may be written as a
//! fraction of the source region's length in bits, so one layout can serve
//! ROM sets of different sizes. Layouts are resolved against the real region
//! into a [`DecodePlan`] at video start-up, and the plan is consumed to build
//! a [`GfxElement`].

use thiserror::Error;
use tracing::debug;

use super::{Bitmap, Pen, Rect};
use crate::driver::RegionTag;
use crate::host::MemorySystem;

pub const MAX_GFX_PLANES: usize = 8;
pub const MAX_GFX_SIZE: usize = 256;
/// Decode lists longer than this are truncated.
pub const MAX_GFX_ELEMENTS: usize = 32;
/// Largest pixel buffer one planar set may decode to, in bytes.
pub const MAX_GFX_DATA: u64 = 1 << 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GfxError {
    #[error("out of memory decoding gfx")]
    OutOfMemory,

    #[error("gfx region '{0}' is not loaded")]
    MissingRegion(RegionTag),

    #[error("invalid gfx layout: {0}")]
    InvalidLayout(&'static str),
}

/// A layout field: either an exact bit value or a fraction of the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutValue {
    Literal(u32),
    /// `offset + region_bits * num / den`. For element counts the offset is
    /// ignored and the fraction applies to the number of whole elements.
    Fraction { num: u8, den: u8, offset: u32 },
}

impl LayoutValue {
    pub const fn lit(value: u32) -> Self {
        Self::Literal(value)
    }

    pub const fn frac(num: u8, den: u8) -> Self {
        Self::Fraction {
            num,
            den,
            offset: 0,
        }
    }

    pub const fn frac_plus(num: u8, den: u8, offset: u32) -> Self {
        Self::Fraction { num, den, offset }
    }

    /// Resolve an offset against a region `region_bits` long.
    ///
    /// Multiplies by `num` before dividing by `den`; the base offset is added
    /// to the already-truncated quotient.
    pub fn resolve(self, region_bits: u64) -> Result<u64, GfxError> {
        match self {
            Self::Literal(value) => Ok(u64::from(value)),
            Self::Fraction { num, den, offset } => {
                check_den(den)?;
                Ok(u64::from(offset) + region_bits * u64::from(num) / u64::from(den))
            }
        }
    }

    /// Resolve an element count: `region_bits / increment * num / den`.
    pub fn resolve_count(self, region_bits: u64, increment: u32) -> Result<u64, GfxError> {
        match self {
            Self::Literal(value) => Ok(u64::from(value)),
            Self::Fraction { num, den, .. } => {
                check_den(den)?;
                if increment == 0 {
                    return Err(GfxError::InvalidLayout("fractional count needs a non-zero increment"));
                }
                Ok(region_bits / u64::from(increment) * u64::from(num) / u64::from(den))
            }
        }
    }
}

fn check_den(den: u8) -> Result<(), GfxError> {
    if den == 0 {
        return Err(GfxError::InvalidLayout("fraction with zero denominator"));
    }
    Ok(())
}

/// `N` evenly spaced literal offsets starting at `start`.
pub const fn steps<const N: usize>(start: u32, step: u32) -> [LayoutValue; N] {
    let mut out = [LayoutValue::Literal(0); N];
    let mut i = 0;
    while i < N {
        out[i] = LayoutValue::Literal(start + i as u32 * step);
        i += 1;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneOffsets {
    /// Bit offset of each plane; plane 0 supplies the most significant pixel bit.
    Bits(&'static [LayoutValue]),
    /// Leave the data as stored. `x_offsets[0]` is a displacement from the
    /// start of the data, `y_offsets[0]` the line modulo and `increment` the
    /// element modulo, all in bits. Four planes or fewer are packed two
    /// pixels per byte.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxLayout {
    pub width: u16,
    pub height: u16,
    pub total: LayoutValue,
    pub planes: u16,
    pub plane_offsets: PlaneOffsets,
    pub x_offsets: &'static [LayoutValue],
    pub y_offsets: &'static [LayoutValue],
    /// Distance between consecutive elements, in bits.
    pub increment: u32,
}

/// One decodable set: which region, where in it, and how to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxDecodeInfo {
    pub region: RegionTag,
    /// Byte offset of the first element within the region.
    pub start: u32,
    pub layout: &'static GfxLayout,
    /// First colour-table entry used by this set.
    pub color_codes_start: u32,
    pub total_color_codes: u32,
}

/// A layout with every fraction resolved against a concrete region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodePlan {
    pub width: u16,
    pub height: u16,
    pub total: u32,
    pub planes: u16,
    /// `None` for raw layouts.
    pub plane_offsets: Option<Vec<u64>>,
    pub x_offsets: Vec<u64>,
    pub y_offsets: Vec<u64>,
    pub increment: u32,
}

impl DecodePlan {
    /// Resolve `layout` against a region of `region_len` bytes whose
    /// elements start `start` bytes in.
    pub fn resolve(layout: &GfxLayout, region_len: usize, start: u32) -> Result<Self, GfxError> {
        let region_bits = 8 * region_len as u64;

        if usize::from(layout.planes) > MAX_GFX_PLANES {
            return Err(GfxError::InvalidLayout("too many planes"));
        }
        if usize::from(layout.width) > MAX_GFX_SIZE || usize::from(layout.height) > MAX_GFX_SIZE {
            return Err(GfxError::InvalidLayout("element larger than MAX_GFX_SIZE"));
        }

        let total = layout.total.resolve_count(region_bits, layout.increment)?;
        let mut total = u32::try_from(total).map_err(|_| GfxError::InvalidLayout("element count overflows"))?;

        let resolve_all = |values: &[LayoutValue]| -> Result<Vec<u64>, GfxError> {
            values.iter().map(|v| v.resolve(region_bits)).collect()
        };
        let x_offsets = resolve_all(layout.x_offsets)?;
        let y_offsets = resolve_all(layout.y_offsets)?;

        let plane_offsets = match layout.plane_offsets {
            PlaneOffsets::Bits(planes) => {
                if planes.len() < usize::from(layout.planes)
                    || x_offsets.len() < usize::from(layout.width)
                    || y_offsets.len() < usize::from(layout.height)
                {
                    return Err(GfxError::InvalidLayout("fewer offsets than planes or pixels"));
                }
                Some(resolve_all(planes)?)
            }
            PlaneOffsets::Raw => {
                let line_modulo = y_offsets.first().copied().unwrap_or(0);
                total = truncate_raw_count(total, start, region_len, layout, line_modulo);
                None
            }
        };

        Ok(Self {
            width: layout.width,
            height: layout.height,
            total,
            planes: layout.planes,
            plane_offsets,
            x_offsets,
            y_offsets,
            increment: layout.increment,
        })
    }

    pub fn is_raw(&self) -> bool {
        self.plane_offsets.is_none()
    }
}

/// Some boards step through ROM on partial-element boundaries. Drop elements
/// from the end until the last one no longer reaches past the region.
fn truncate_raw_count(
    mut total: u32,
    start: u32,
    region_len: usize,
    layout: &GfxLayout,
    line_modulo: u64,
) -> u32 {
    let base = i64::from(start);
    let end = region_len as i64;
    let footprint = i64::from(layout.height) * line_modulo as i64 / 8;
    while total > 0 {
        let element_base = base + (i64::from(total) - 1) * i64::from(layout.increment) / 8;
        let last_byte = element_base + footprint - 1;
        if last_byte < end {
            break;
        }
        total -= 1;
    }
    total
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GfxFlags {
    /// Two 4bpp pixels per byte, low nibble first.
    pub packed: bool,
    /// Data was copied as stored rather than converted to one byte per pixel.
    pub raw: bool,
}

/// How a [`GfxElement`] composites onto a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transparency {
    Opaque,
    /// Skip pixels whose raw value equals this pen.
    Pen(u8),
}

/// Placement of one element when drawing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Sprite {
    pub code: u32,
    pub color: u32,
    pub flip_x: bool,
    pub flip_y: bool,
    pub x: i32,
    pub y: i32,
}

/// A decoded set of same-sized tiles or sprites.
#[derive(Debug, Clone)]
pub struct GfxElement {
    width: u16,
    height: u16,
    total_elements: u32,
    color_granularity: u16,
    total_colors: u32,
    colortable_base: Option<u32>,
    pen_usage: Vec<u32>,
    data: Vec<u8>,
    line_modulo: u32,
    char_modulo: u32,
    flags: GfxFlags,
}

impl GfxElement {
    /// Decode every element of `plan` from `src`, which starts at the first element.
    ///
    /// Planar reads past the end of `src` yield zero bits.
    pub fn decode(src: &[u8], plan: &DecodePlan) -> Result<Self, GfxError> {
        let width = plan.width;
        let height = plan.height;
        let planes = usize::from(plan.planes);
        let color_granularity = 1u16 << plan.planes;

        let Some(plane_offsets) = &plan.plane_offsets else {
            return Self::decode_raw(src, plan, color_granularity);
        };

        let pixels_per_element = usize::from(width) * usize::from(height);
        let data_len = u64::from(plan.total) * pixels_per_element as u64;
        if data_len > MAX_GFX_DATA {
            return Err(GfxError::OutOfMemory);
        }
        let mut data = Vec::new();
        data.try_reserve_exact(data_len as usize)
            .map_err(|_| GfxError::OutOfMemory)?;
        let mut pen_usage = Vec::new();
        pen_usage
            .try_reserve_exact(plan.total as usize)
            .map_err(|_| GfxError::OutOfMemory)?;

        for code in 0..u64::from(plan.total) {
            let base = code * u64::from(plan.increment);
            let mut used = 0u32;
            for &y_offset in &plan.y_offsets[..usize::from(height)] {
                for &x_offset in &plan.x_offsets[..usize::from(width)] {
                    let mut pixel = 0u8;
                    for (plane, &plane_offset) in plane_offsets[..planes].iter().enumerate() {
                        if read_bit(src, base + plane_offset + y_offset + x_offset) {
                            pixel |= 1 << (planes - 1 - plane);
                        }
                    }
                    if color_granularity <= 32 {
                        used |= 1 << pixel;
                    }
                    data.push(pixel);
                }
            }
            pen_usage.push(used);
        }

        Ok(Self {
            width,
            height,
            total_elements: plan.total,
            color_granularity,
            total_colors: 0,
            colortable_base: None,
            pen_usage,
            data,
            line_modulo: u32::from(width),
            char_modulo: pixels_per_element as u32,
            flags: GfxFlags::default(),
        })
    }

    fn decode_raw(src: &[u8], plan: &DecodePlan, color_granularity: u16) -> Result<Self, GfxError> {
        let displacement = plan.x_offsets.first().copied().unwrap_or(0) / 8;
        let source = src.get(displacement as usize..).unwrap_or(&[]);
        let mut data = Vec::new();
        data.try_reserve_exact(source.len())
            .map_err(|_| GfxError::OutOfMemory)?;
        data.extend_from_slice(source);

        Ok(Self {
            width: plan.width,
            height: plan.height,
            total_elements: plan.total,
            color_granularity,
            total_colors: 0,
            colortable_base: None,
            pen_usage: Vec::new(),
            data,
            line_modulo: (plan.y_offsets.first().copied().unwrap_or(0) / 8) as u32,
            char_modulo: plan.increment / 8,
            flags: GfxFlags {
                packed: plan.planes <= 4,
                raw: true,
            },
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn total_elements(&self) -> u32 {
        self.total_elements
    }

    /// Number of pens per colour code (`1 << planes`).
    pub fn color_granularity(&self) -> u16 {
        self.color_granularity
    }

    pub fn total_colors(&self) -> u32 {
        self.total_colors
    }

    pub fn colortable_base(&self) -> Option<u32> {
        self.colortable_base
    }

    pub fn flags(&self) -> GfxFlags {
        self.flags
    }

    pub(crate) fn assign_colors(&mut self, colortable_base: Option<u32>, total_colors: u32) {
        self.colortable_base = colortable_base;
        self.total_colors = total_colors;
    }

    /// Bitmask of the raw pixel values `code` uses, when known.
    pub fn pen_usage(&self, code: u32) -> Option<u32> {
        self.pen_usage.get(code as usize).copied()
    }

    /// Raw pixel value at (`x`, `y`) of element `code`; 0 outside the element.
    pub fn pixel(&self, code: u32, x: u16, y: u16) -> u8 {
        if code >= self.total_elements || x >= self.width || y >= self.height {
            return 0;
        }
        let row = code as usize * self.char_modulo as usize + usize::from(y) * self.line_modulo as usize;
        if self.flags.packed {
            let byte = self.data.get(row + usize::from(x) / 2).copied().unwrap_or(0);
            if x & 1 == 0 { byte & 0x0F } else { byte >> 4 }
        } else {
            self.data.get(row + usize::from(x)).copied().unwrap_or(0)
        }
    }

    /// Pen for a raw pixel value in colour code `color`.
    pub fn pen(&self, color: u32, pixel: u8) -> Pen {
        let index = color * u32::from(self.color_granularity) + u32::from(pixel);
        self.colortable_base.map_or(index, |base| base + index)
    }

    /// Draw one element into `dest`, clipped to `clip`.
    pub fn draw(&self, dest: &mut Bitmap, sprite: &Sprite, clip: &Rect, transparency: Transparency) {
        if self.total_elements == 0 {
            return;
        }
        let code = sprite.code % self.total_elements;

        if let Transparency::Pen(pen) = transparency
            && let Some(usage) = self.pen_usage(code)
            && usage & !(1u32 << pen) == 0
        {
            return;
        }

        let placed = Rect::new(
            sprite.x,
            sprite.x + i32::from(self.width) - 1,
            sprite.y,
            sprite.y + i32::from(self.height) - 1,
        );
        let area = placed.intersect(clip).intersect(&dest.bounds());
        if area.is_empty() {
            return;
        }

        for dy in area.min_y..=area.max_y {
            let sy = (dy - sprite.y) as u16;
            let src_y = if sprite.flip_y { self.height - 1 - sy } else { sy };
            for dx in area.min_x..=area.max_x {
                let sx = (dx - sprite.x) as u16;
                let src_x = if sprite.flip_x { self.width - 1 - sx } else { sx };
                let pixel = self.pixel(code, src_x, src_y);
                if transparency == Transparency::Pen(pixel) {
                    continue;
                }
                dest.plot(dx, dy, self.pen(sprite.color, pixel));
            }
        }
    }
}

/// MSB-first bit read; bit 0 is the top bit of byte 0.
fn read_bit(src: &[u8], bit: u64) -> bool {
    src.get((bit / 8) as usize)
        .is_some_and(|byte| byte & (0x80 >> (bit % 8)) != 0)
}

/// Decode every set in `infos` from the regions held by `memory`.
///
/// When the palette keeps a remapped colour table, each set's colour table
/// is pointed at the entries reserved for it.
pub fn decode_graphics(
    infos: &[GfxDecodeInfo],
    memory: &dyn MemorySystem,
    remapped_colortable: bool,
) -> Result<Vec<GfxElement>, GfxError> {
    let mut elements = Vec::with_capacity(infos.len().min(MAX_GFX_ELEMENTS));
    for info in infos.iter().take(MAX_GFX_ELEMENTS) {
        let region = memory
            .region(info.region)
            .ok_or(GfxError::MissingRegion(info.region))?;
        let plan = DecodePlan::resolve(info.layout, region.len(), info.start)?;
        let src = region.get(info.start as usize..).unwrap_or(&[]);
        let mut element = GfxElement::decode(src, &plan)?;
        element.assign_colors(
            remapped_colortable.then_some(info.color_codes_start),
            info.total_color_codes,
        );
        debug!(
            region = info.region,
            elements = element.total_elements(),
            raw = plan.is_raw(),
            "decoded gfx set"
        );
        elements.push(element);
    }
    Ok(elements)
}
