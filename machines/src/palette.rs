//! Table-driven palette.
//!
//! Pen layout depends on the driver:
//! * colour-table drivers: pens index the lookup table, which indexes the colours;
//! * plain drivers: pens index the colours directly;
//! * direct-RGB drivers: pens are `0xRRGGBB`.
//!
//! The two UI pens always follow the driver's pen space.

use marquee_core::driver::{MachineConfig, Rgb, VideoAttributes};
use marquee_core::host::{HostError, MemorySystem, Palette};
use marquee_core::video::Pen;
use tracing::debug;

/// UI pens of direct-RGB drivers sit above every packed colour.
const DIRECT_UI_BASE: Pen = 0x0100_0000;
const UI_COLORS: [Rgb; 2] = [(0, 0, 0), (0xFF, 0xFF, 0xFF)];

#[derive(Debug, Default)]
pub struct TablePalette {
    colors: Vec<Rgb>,
    colortable: Vec<Pen>,
    direct: bool,
    brightness: f32,
}

impl TablePalette {
    pub fn new() -> Self {
        Self {
            brightness: 1.0,
            ..Self::default()
        }
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn colortable(&self) -> &[Pen] {
        &self.colortable
    }

    fn pen_space(&self) -> u32 {
        if self.colortable.is_empty() {
            self.colors.len() as u32
        } else {
            self.colortable.len() as u32
        }
    }

    fn raw_rgb(&self, pen: Pen) -> Rgb {
        let ui_base = self.ui_pen_base();
        if let Some(ui) = pen.checked_sub(ui_base).and_then(|i| UI_COLORS.get(i as usize)) {
            return *ui;
        }
        if self.direct {
            return ((pen >> 16) as u8, (pen >> 8) as u8, pen as u8);
        }
        let color = if self.colortable.is_empty() {
            Some(pen)
        } else {
            self.colortable.get(pen as usize).copied()
        };
        color
            .and_then(|index| self.colors.get(index as usize))
            .copied()
            .unwrap_or_default()
    }
}

fn scale(channel: u8, brightness: f32) -> u8 {
    (f32::from(channel) * brightness).round().clamp(0.0, 255.0) as u8
}

impl Palette for TablePalette {
    fn start(&mut self, config: &MachineConfig) -> Result<(), HostError> {
        self.direct = config.video_attributes.contains(VideoAttributes::RGB_DIRECT);
        let colors = config.total_colors as usize;
        let lookups = config.color_table_len as usize;

        let mut table = Vec::new();
        table
            .try_reserve_exact(colors)
            .map_err(|_| HostError::failed("out of memory allocating palette"))?;
        table.resize(colors, (0, 0, 0));
        self.colors = table;

        // Identity until the driver's PROMs are applied.
        self.colortable = (0..config.color_table_len)
            .map(|pen| pen % config.total_colors.max(1))
            .collect();
        self.brightness = 1.0;
        debug!(colors, lookups, direct = self.direct, "palette started");
        Ok(())
    }

    fn init(&mut self, config: &MachineConfig, memory: &dyn MemorySystem) -> Result<(), HostError> {
        match config.palette_init {
            Some(palette_init) => palette_init(memory, &mut self.colors, &mut self.colortable),
            None => {
                // Grey ramp for drivers that bring no PROMs.
                let last = self.colors.len().saturating_sub(1).max(1);
                for (i, color) in self.colors.iter_mut().enumerate() {
                    let level = (i * 255 / last) as u8;
                    *color = (level, level, level);
                }
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.colors.clear();
        self.colortable.clear();
    }

    fn remapped_colortable(&self) -> bool {
        !self.colortable.is_empty()
    }

    fn ui_pen_base(&self) -> Pen {
        if self.direct { DIRECT_UI_BASE } else { self.pen_space() }
    }

    fn total_colors_with_ui(&self) -> u32 {
        self.pen_space() + UI_COLORS.len() as u32
    }

    fn black_pen(&self) -> Pen {
        if self.direct {
            return 0;
        }
        (0..self.pen_space())
            .find(|&pen| self.raw_rgb(pen) == (0, 0, 0))
            .unwrap_or_else(|| self.ui_pen_base())
    }

    fn set_brightness(&mut self, brightness: f32) {
        self.brightness = brightness.clamp(0.0, 1.0);
    }

    fn rgb(&self, pen: Pen) -> Rgb {
        let (r, g, b) = self.raw_rgb(pen);
        (scale(r, self.brightness), scale(g, self.brightness), scale(b, self.brightness))
    }
}
