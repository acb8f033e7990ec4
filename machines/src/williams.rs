//! Williams gen-1 board pieces shared by Joust, Robotron and friends.
//!
//! The main CPU sees a 304x256 4bpp frame buffer at 0x0000-0x97FF, stored
//! column-major (one byte is two horizontally adjacent pixels, high nibble
//! first), a 16-entry palette RAM at 0xC000 and 1KB of 4-bit battery-backed
//! CMOS RAM at 0xCC00.

use std::io::{self, Read};

use marquee_core::driver::{
    CpuSlot, CpuType, MachineConfig, NvramAccess, RomEntry, RomRegion, ScreenTarget, SlotError,
    SoundSlot, SoundType, VideoAttributes, VideoHardware,
};
use marquee_core::host::{HostError, MemorySystem};
use marquee_core::video::{Pen, Rect};
use tracing::debug;

pub const SCREEN_WIDTH: u32 = 304;
pub const SCREEN_HEIGHT: u32 = 256;

/// Visible area after cropping the blanking edges: 292x240.
pub const VISIBLE_AREA: Rect = Rect::new(6, 297, 7, 246);

const PALETTE_RAM: usize = 0xC000;
const CMOS_RAM: usize = 0xCC00;
const CMOS_SIZE: usize = 0x400;

/// Only the low nibble of each CMOS byte is stored; the rest reads as 1s.
const CMOS_UNUSED_BITS: u8 = 0xF0;

// ---------------------------------------------------------------------------
// Shared ROM definitions (common to all Williams gen-1 games)
// ---------------------------------------------------------------------------

/// SC-1 sound board ROM, mapped at the top of the sound CPU's space.
pub const SOUND_REGION: RomRegion = RomRegion {
    tag: "soundcpu",
    size: 0x10000,
    dispose: false,
    entries: &[RomEntry {
        name: "video_sound_rom_4_std_780.ic12",
        size: 0x1000,
        offset: 0xF000,
        crc32: Some(0xf1835bdd),
    }],
};

/// Address decoder PROMs, identical across gen-1 boards.
pub const DECODER_REGION: RomRegion = RomRegion {
    tag: "proms",
    size: 0x0400,
    dispose: false,
    entries: &[
        RomEntry { name: "decoder_rom_4.3g", size: 0x0200, offset: 0x0000, crc32: Some(0xe6631c23) },
        RomEntry { name: "decoder_rom_6.3c", size: 0x0200, offset: 0x0200, crc32: Some(0x83faf25e) },
    ],
};

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

const RG_LUT: [u8; 8] = [0, 38, 81, 118, 137, 174, 217, 255];
const B_LUT: [u8; 4] = [0, 95, 160, 255];

/// Palette RAM entry (BBGGGRRR) as a packed `0xRRGGBB` pen.
pub fn palette_pen(entry: u8) -> Pen {
    let r = RG_LUT[usize::from(entry & 0x07)];
    let g = RG_LUT[usize::from((entry >> 3) & 0x07)];
    let b = B_LUT[usize::from((entry >> 6) & 0x03)];
    (Pen::from(r) << 16) | (Pen::from(g) << 8) | Pen::from(b)
}

/// Draws straight from video RAM; no tiles, no sprites.
#[derive(Default)]
pub struct WilliamsVideo;

impl VideoHardware for WilliamsVideo {
    fn start(&mut self, memory: &dyn MemorySystem) -> Result<(), HostError> {
        if memory.region_length("maincpu") < CMOS_RAM + CMOS_SIZE {
            return Err(HostError::failed("williams: main CPU region too small"));
        }
        Ok(())
    }

    fn update(&mut self, screen: &mut ScreenTarget<'_>, clip: &Rect) {
        let Some(main) = screen.memory.region("maincpu") else {
            return;
        };
        let Some(palette) = main.get(PALETTE_RAM..PALETTE_RAM + 16) else {
            return;
        };
        let pens: Vec<Pen> = palette.iter().map(|&entry| palette_pen(entry)).collect();

        let area = clip.intersect(&screen.bitmap.bounds());
        for y in area.min_y..=area.max_y {
            for x in area.min_x..=area.max_x {
                let addr = (x as usize / 2) * 256 + y as usize;
                let byte = main.get(addr).copied().unwrap_or(0);
                let index = if x & 1 == 0 { byte >> 4 } else { byte & 0x0F };
                screen.bitmap.plot(x, y, pens[usize::from(index)]);
            }
        }
    }
}

fn williams_video() -> Box<dyn VideoHardware> {
    Box::new(WilliamsVideo)
}

// ---------------------------------------------------------------------------
// CMOS NVRAM
// ---------------------------------------------------------------------------

fn cmos(memory: &mut dyn MemorySystem) -> io::Result<&mut [u8]> {
    memory
        .region_mut("maincpu")
        .and_then(|main| main.get_mut(CMOS_RAM..CMOS_RAM + CMOS_SIZE))
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "CMOS RAM is not mapped"))
}

/// Battery-backed CMOS: restore from the saved image, or start blank.
pub fn cmos_nvram(memory: &mut dyn MemorySystem, access: NvramAccess<'_>) -> io::Result<()> {
    let ram = cmos(memory)?;
    match access {
        NvramAccess::Load(Some(file)) => {
            let mut saved = Vec::with_capacity(CMOS_SIZE);
            file.take(CMOS_SIZE as u64).read_to_end(&mut saved)?;
            ram.fill(CMOS_UNUSED_BITS);
            for (cell, value) in ram.iter_mut().zip(&saved) {
                *cell = value | CMOS_UNUSED_BITS;
            }
            debug!(bytes = saved.len(), "CMOS restored");
        }
        NvramAccess::Load(None) => ram.fill(CMOS_UNUSED_BITS),
        NvramAccess::Save(file) => file.write_all(ram)?,
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// M6809 main CPU at 1 MHz, M6800 sound CPU driving a DAC.
pub fn construct_williams(config: &mut MachineConfig) -> Result<(), SlotError> {
    config.cpus.add(Some("maincpu"), CpuSlot { cpu_type: CpuType::M6809, clock: 1_000_000 })?;
    config.cpus.add(Some("soundcpu"), CpuSlot { cpu_type: CpuType::M6800, clock: 894_886 })?;
    config.sounds.add(Some("dac"), SoundSlot { sound_type: SoundType::Dac, clock: 0 })?;
    config.frames_per_second = 60.0;
    config.screen_width = SCREEN_WIDTH;
    config.screen_height = SCREEN_HEIGHT;
    config.default_visible_area = VISIBLE_AREA;
    config.video_attributes = VideoAttributes::RGB_DIRECT;
    config.total_colors = 16;
    config.video = Some(williams_video);
    config.nvram_handler = Some(cmos_nvram);
    Ok(())
}
