use marquee_core::driver::{
    CpuSlot, CpuType, DriverDescriptor, InputPortDef, MachineConfig, Rgb, RomEntry, RomRegion,
    ScreenTarget, SlotError, SoundSlot, SoundType, VideoAttributes, VideoHardware,
};
use marquee_core::host::{HostError, MemorySystem};
use marquee_core::video::gfx::{PlaneOffsets, Sprite, Transparency, steps};
use marquee_core::video::{GfxDecodeInfo, GfxLayout, LayoutValue, Pen, Rect};

use crate::registry::DriverEntry;

// ---------------------------------------------------------------------------
// Pac-Man ROM definitions ("pacman" Midway set)
// ---------------------------------------------------------------------------

static PACMAN_ROMS: [RomRegion; 4] = [
    // 16KB program at 0x0000-0x3FFF; RAM and I/O above.
    RomRegion {
        tag: "maincpu",
        size: 0x10000,
        dispose: false,
        entries: &[
            RomEntry { name: "pacman.6e", size: 0x1000, offset: 0x0000, crc32: Some(0xc1e6ab10) },
            RomEntry { name: "pacman.6f", size: 0x1000, offset: 0x1000, crc32: Some(0x1a6fb2d4) },
            RomEntry { name: "pacman.6h", size: 0x1000, offset: 0x2000, crc32: Some(0xbcdd1beb) },
            RomEntry { name: "pacman.6j", size: 0x1000, offset: 0x3000, crc32: Some(0x817d94e3) },
        ],
    },
    // Tiles in the first half, sprites in the second.
    RomRegion {
        tag: "gfx1",
        size: 0x2000,
        dispose: true,
        entries: &[
            RomEntry { name: "pacman.5e", size: 0x1000, offset: 0x0000, crc32: Some(0x0c944964) },
            RomEntry { name: "pacman.5f", size: 0x1000, offset: 0x1000, crc32: Some(0x958fedf9) },
        ],
    },
    // Palette PROM, then the colour lookup PROM.
    RomRegion {
        tag: "proms",
        size: 0x0120,
        dispose: false,
        entries: &[
            RomEntry { name: "82s123.7f", size: 0x0020, offset: 0x0000, crc32: Some(0x2fc650bd) },
            RomEntry { name: "82s126.4a", size: 0x0100, offset: 0x0020, crc32: Some(0x3eb3a8e4) },
        ],
    },
    // 8 waveforms x 32 samples x 4 bits.
    RomRegion {
        tag: "namco",
        size: 0x0100,
        dispose: false,
        entries: &[RomEntry { name: "82s126.1m", size: 0x0100, offset: 0x0000, crc32: Some(0xa9cc86bf) }],
    },
];

static PACMAN_PORTS: [InputPortDef; 3] = [
    // Active low: joystick, coins, service.
    InputPortDef { name: "IN0", mask: 0xFF, default: 0xFF },
    InputPortDef { name: "IN1", mask: 0xFF, default: 0xFF },
    // 1 coin/1 credit, 3 lives, bonus at 10000, normal difficulty and ghost names.
    InputPortDef { name: "DSW1", mask: 0xFF, default: 0xC9 },
];

// ---------------------------------------------------------------------------
// Graphics
// ---------------------------------------------------------------------------

const fn lit(value: u32) -> LayoutValue {
    LayoutValue::lit(value)
}

static PLANES: [LayoutValue; 2] = [lit(0), lit(4)];

/// Pixels 0-3 live in the second 8 bytes of a tile, 4-7 in the first.
static CHAR_X: [LayoutValue; 8] = [lit(64), lit(65), lit(66), lit(67), lit(0), lit(1), lit(2), lit(3)];
static CHAR_Y: [LayoutValue; 8] = steps(0, 8);

static SPRITE_X: [LayoutValue; 16] = [
    lit(64), lit(65), lit(66), lit(67),
    lit(128), lit(129), lit(130), lit(131),
    lit(192), lit(193), lit(194), lit(195),
    lit(0), lit(1), lit(2), lit(3),
];
static SPRITE_Y: [LayoutValue; 16] = [
    lit(0), lit(8), lit(16), lit(24), lit(32), lit(40), lit(48), lit(56),
    lit(256), lit(264), lit(272), lit(280), lit(288), lit(296), lit(304), lit(312),
];

/// 256 tiles of 8x8 from the first half of gfx1.
static CHAR_LAYOUT: GfxLayout = GfxLayout {
    width: 8,
    height: 8,
    total: LayoutValue::frac(1, 2),
    planes: 2,
    plane_offsets: PlaneOffsets::Bits(&PLANES),
    x_offsets: &CHAR_X,
    y_offsets: &CHAR_Y,
    increment: 16 * 8,
};

/// 64 sprites of 16x16 from the second half of gfx1.
static SPRITE_LAYOUT: GfxLayout = GfxLayout {
    width: 16,
    height: 16,
    total: LayoutValue::frac(1, 2),
    planes: 2,
    plane_offsets: PlaneOffsets::Bits(&PLANES),
    x_offsets: &SPRITE_X,
    y_offsets: &SPRITE_Y,
    increment: 64 * 8,
};

static PACMAN_GFX: [GfxDecodeInfo; 2] = [
    GfxDecodeInfo {
        region: "gfx1",
        start: 0x0000,
        layout: &CHAR_LAYOUT,
        color_codes_start: 0,
        total_color_codes: 32,
    },
    GfxDecodeInfo {
        region: "gfx1",
        start: 0x1000,
        layout: &SPRITE_LAYOUT,
        color_codes_start: 0,
        total_color_codes: 32,
    },
];

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

const TOTAL_COLORS: u32 = 32;
/// 64 colour codes of 4 pens each.
const COLOR_TABLE_LEN: u32 = 64 * 4;

// 3-bit RGB channels with 1K/470/220 ohm resistors.
const RG_WEIGHTS: [f64; 3] = [1000.0, 470.0, 220.0];
const B_WEIGHTS: [f64; 2] = [470.0, 220.0];

/// Output level of a resistor-weighted DAC for the bits set in `bits`.
fn dac_level(weights: &[f64], bits: u8) -> u8 {
    let total: f64 = weights.iter().map(|w| 1.0 / w).sum();
    let level: f64 = weights
        .iter()
        .enumerate()
        .filter(|(bit, _)| bits & (1 << bit) != 0)
        .map(|(_, w)| (1.0 / w) / total)
        .sum();
    (level * 255.0).round().min(255.0) as u8
}

fn pacman_palette(memory: &dyn MemorySystem, colors: &mut [Rgb], colortable: &mut [Pen]) {
    let Some(proms) = memory.region("proms") else {
        return;
    };
    for (color, &entry) in colors.iter_mut().zip(proms) {
        *color = (
            dac_level(&RG_WEIGHTS, entry & 0x07),
            dac_level(&RG_WEIGHTS, (entry >> 3) & 0x07),
            dac_level(&B_WEIGHTS, (entry >> 6) & 0x03),
        );
    }
    let lookup = proms.get(0x20..).unwrap_or_default();
    for (entry, &value) in colortable.iter_mut().zip(lookup) {
        *entry = Pen::from(value & 0x0F);
    }
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

const VIDEO_RAM: usize = 0x4000;
const COLOR_RAM: usize = 0x4400;
const SPRITE_ATTRS: usize = 0x4FF0;
const SPRITE_COORDS: usize = 0x5060;

/// Sprites are clipped to the 32 columns between the side borders.
const SPRITE_CLIP: Rect = Rect::new(16, 271, 0, 223);

/// The 36x28 tilemap is not linear in video RAM: the middle 32 columns run
/// row-major, the two border columns on each side column-major.
fn tilemap_offset(col: i32, row: i32) -> usize {
    let r = row + 2;
    let c = col - 2;
    if c & 0x20 != 0 {
        (r + ((c & 0x1F) << 5)) as usize
    } else {
        (c + (r << 5)) as usize
    }
}

fn byte(memory: &[u8], addr: usize) -> u8 {
    memory.get(addr).copied().unwrap_or(0)
}

#[derive(Default)]
pub struct PacmanVideo;

impl PacmanVideo {
    fn draw_tiles(screen: &mut ScreenTarget<'_>, main: &[u8], clip: &Rect) {
        let gfx = screen.gfx;
        let Some(tiles) = gfx.first() else {
            return;
        };
        for row in 0..28 {
            let top = row * 8;
            if top + 7 < clip.min_y || top > clip.max_y {
                continue;
            }
            for col in 0..36 {
                let offset = tilemap_offset(col, row);
                let tile = Sprite {
                    code: u32::from(byte(main, VIDEO_RAM + offset)),
                    color: u32::from(byte(main, COLOR_RAM + offset) & 0x1F),
                    x: col * 8,
                    y: top,
                    ..Sprite::default()
                };
                tiles.draw(screen.bitmap, &tile, clip, Transparency::Opaque);
            }
        }
    }

    fn draw_sprites(screen: &mut ScreenTarget<'_>, main: &[u8], clip: &Rect) {
        let gfx = screen.gfx;
        let Some(sprites) = gfx.get(1) else {
            return;
        };
        let clip = clip.intersect(&SPRITE_CLIP);
        // Lowest number on top. Sprites 0-2 sit one line lower.
        for offs in (0..8usize).rev() {
            let attr = byte(main, SPRITE_ATTRS + offs * 2);
            let color = byte(main, SPRITE_ATTRS + offs * 2 + 1);
            let y_shift = if offs <= 2 { 1 } else { 0 };
            let sprite = Sprite {
                code: u32::from(attr >> 2),
                color: u32::from(color & 0x1F),
                flip_x: attr & 1 != 0,
                flip_y: attr & 2 != 0,
                x: 272 - i32::from(byte(main, SPRITE_COORDS + offs * 2 + 1)),
                y: i32::from(byte(main, SPRITE_COORDS + offs * 2)) - 31 + y_shift,
            };
            sprites.draw(screen.bitmap, &sprite, &clip, Transparency::Pen(0));
            // Wraparound for the tunnel.
            let wrapped = Sprite { x: sprite.x - 256, ..sprite };
            sprites.draw(screen.bitmap, &wrapped, &clip, Transparency::Pen(0));
        }
    }
}

impl VideoHardware for PacmanVideo {
    fn start(&mut self, memory: &dyn MemorySystem) -> Result<(), HostError> {
        if memory.region_length("maincpu") < SPRITE_COORDS + 0x10 {
            return Err(HostError::failed("pacman: main CPU region too small"));
        }
        Ok(())
    }

    fn update(&mut self, screen: &mut ScreenTarget<'_>, clip: &Rect) {
        let memory = screen.memory;
        let Some(main) = memory.region("maincpu") else {
            return;
        };
        Self::draw_tiles(screen, main, clip);
        Self::draw_sprites(screen, main, clip);
    }
}

fn pacman_video() -> Box<dyn VideoHardware> {
    Box::new(PacmanVideo)
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

const CPU_CLOCK_HZ: u32 = 3_072_000;

fn construct_pacman(config: &mut MachineConfig) -> Result<(), SlotError> {
    config.cpus.add(Some("maincpu"), CpuSlot { cpu_type: CpuType::Z80, clock: CPU_CLOCK_HZ })?;
    config.sounds.add(
        Some("namco"),
        SoundSlot {
            sound_type: SoundType::NamcoWsg,
            clock: CPU_CLOCK_HZ / 32,
        },
    )?;
    config.frames_per_second = 60.606_060;
    config.screen_width = 36 * 8;
    config.screen_height = 28 * 8;
    config.default_visible_area = Rect::new(0, 36 * 8 - 1, 0, 28 * 8 - 1);
    config.video_attributes = VideoAttributes::RASTER;
    config.gfx_decode = &PACMAN_GFX;
    config.total_colors = TOTAL_COLORS;
    config.color_table_len = COLOR_TABLE_LEN;
    config.palette_init = Some(pacman_palette);
    config.video = Some(pacman_video);
    Ok(())
}

/// Pac-Man (Namco/Midway, 1980). Z80 @ 3.072 MHz, Namco WSG, 36x28 tiles
/// plus 8 sprites, displayed rotated on a vertical monitor.
pub static PACMAN: DriverDescriptor = DriverDescriptor {
    name: "pacman",
    description: "Pac-Man (Midway)",
    year: "1980",
    manufacturer: "Namco (Midway license)",
    clone_of: None,
    construct: construct_pacman,
    driver_init: None,
    roms: &PACMAN_ROMS,
    input_ports: &PACMAN_PORTS,
};

inventory::submit! { DriverEntry::new(&PACMAN) }
