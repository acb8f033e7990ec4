use thiserror::Error;

use super::Rect;

/// Index into the palette's pen table, or a packed RGB value for
/// direct-colour screens.
pub type Pen = u32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("out of memory allocating {width}x{height} bitmap")]
pub struct AllocError {
    pub width: u32,
    pub height: u32,
}

/// A frame buffer of pens, row-major, top-left origin.
#[derive(Debug, Clone)]
pub struct Bitmap {
    width: u32,
    height: u32,
    depth: u8,
    pixels: Vec<Pen>,
}

impl Bitmap {
    /// Allocate a bitmap cleared to pen 0.
    pub fn new(width: u32, height: u32, depth: u8) -> Result<Self, AllocError> {
        let len = width as usize * height as usize;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|_| AllocError { width, height })?;
        pixels.resize(len, 0);
        Ok(Self {
            width,
            height,
            depth,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bits per pixel the display was created with (15, 16 or 32).
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Full extent of the bitmap as an inclusive rectangle.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, self.width as i32 - 1, 0, self.height as i32 - 1)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Pen> {
        self.offset(x, y).map(|i| self.pixels[i])
    }

    /// Write one pixel; coordinates outside the bitmap are ignored.
    pub fn plot(&mut self, x: i32, y: i32, pen: Pen) {
        if let Some(i) = self.offset(x, y) {
            self.pixels[i] = pen;
        }
    }

    pub fn row(&self, y: u32) -> &[Pen] {
        let start = (y * self.width) as usize;
        &self.pixels[start..start + self.width as usize]
    }

    pub fn pixels(&self) -> &[Pen] {
        &self.pixels
    }

    /// Fill the bitmap, or the part of it inside `clip`, with one pen.
    pub fn fill(&mut self, pen: Pen, clip: Option<&Rect>) {
        let area = match clip {
            Some(clip) => self.bounds().intersect(clip),
            None => {
                self.pixels.fill(pen);
                return;
            }
        };
        if area.is_empty() {
            return;
        }
        for y in area.min_y..=area.max_y {
            let start = y as usize * self.width as usize;
            self.pixels[start + area.min_x as usize..=start + area.max_x as usize].fill(pen);
        }
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
}
