//! Materialized machine configuration and the per-driver hardware hooks.

use std::io;
use std::ops::BitOr;

use super::slots::{CpuSlot, SlotError, SlotTable, SoundSlot};
use super::DriverDescriptor;
use crate::host::{HostError, MemorySystem};
use crate::storage::{StorageAdapter, StorageFile};
use crate::video::{Bitmap, GfxDecodeInfo, GfxElement, Pen, Rect};

/// 8-bit-per-channel colour.
pub type Rgb = (u8, u8, u8);

/// Video hardware flags.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoAttributes(u32);

impl VideoAttributes {
    pub const RASTER: Self = Self(0);
    pub const VECTOR: Self = Self(1 << 0);
    pub const DUAL_MONITOR: Self = Self(1 << 1);
    /// Bitmap pens are packed RGB rather than palette indices.
    pub const RGB_DIRECT: Self = Self(1 << 2);
    pub const NEEDS_6BITS_PER_GUN: Self = Self(1 << 3);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for VideoAttributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Fills the colour palette and the colour lookup table from PROM data.
pub type PaletteInit = fn(memory: &dyn MemorySystem, colors: &mut [Rgb], colortable: &mut [Pen]);

/// What an NVRAM handler is asked to do.
pub enum NvramAccess<'a> {
    /// Restore battery-backed state. `None` when nothing has been saved yet;
    /// the handler should then apply factory defaults.
    Load(Option<&'a mut dyn StorageFile>),
    Save(&'a mut dyn StorageFile),
}

pub type NvramHandler = fn(memory: &mut dyn MemorySystem, access: NvramAccess<'_>) -> io::Result<()>;

/// Everything a driver's post-init hook may touch.
pub struct InitContext<'a> {
    pub driver: &'static DriverDescriptor,
    pub memory: &'a mut dyn MemorySystem,
    pub storage: &'a mut StorageAdapter,
}

/// The frame being drawn, handed to [`VideoHardware::update`].
pub struct ScreenTarget<'a> {
    pub bitmap: &'a mut Bitmap,
    /// Per-pixel sprite priority, cleared after every frame that sets
    /// `priority_used`.
    pub priority: &'a mut Bitmap,
    pub priority_used: bool,
    pub gfx: &'a [GfxElement],
    pub memory: &'a dyn MemorySystem,
}

/// A driver's video hooks.
pub trait VideoHardware {
    fn start(&mut self, memory: &dyn MemorySystem) -> Result<(), HostError>;

    /// Redraw the rows of the frame inside `clip`.
    fn update(&mut self, screen: &mut ScreenTarget<'_>, clip: &Rect);

    fn end_of_frame(&mut self, _memory: &dyn MemorySystem) {}

    fn stop(&mut self) {}
}

/// The concrete configuration of one session, built fresh from a driver.
#[derive(Clone, Default)]
pub struct MachineConfig {
    pub cpus: SlotTable<CpuSlot>,
    pub sounds: SlotTable<SoundSlot>,
    pub frames_per_second: f64,
    pub screen_width: u32,
    pub screen_height: u32,
    pub default_visible_area: Rect,
    pub video_attributes: VideoAttributes,
    /// Explicit display aspect ratio.
    pub aspect: Option<(u32, u32)>,
    pub gfx_decode: &'static [GfxDecodeInfo],
    pub total_colors: u32,
    /// Length of the colour lookup table; zero for drivers that draw with palette pens directly.
    pub color_table_len: u32,
    pub palette_init: Option<PaletteInit>,
    pub video: Option<fn() -> Box<dyn VideoHardware>>,
    pub nvram_handler: Option<NvramHandler>,
}

impl MachineConfig {
    pub fn is_vector(&self) -> bool {
        self.video_attributes.contains(VideoAttributes::VECTOR)
    }

    /// Display aspect ratio: explicit when given, otherwise 4:3, or 4:6 for
    /// two stacked monitors.
    pub fn aspect_ratio(&self) -> (u32, u32) {
        match self.aspect {
            Some((x, y)) if x != 0 && y != 0 => (x, y),
            _ if self.video_attributes.contains(VideoAttributes::DUAL_MONITOR) => (4, 6),
            _ => (4, 3),
        }
    }

    /// Size of the output display: the default visible area for raster
    /// screens, the full screen for vector ones.
    pub fn display_size(&self) -> (u32, u32) {
        if self.is_vector() {
            (self.screen_width, self.screen_height)
        } else {
            (
                self.default_visible_area.width().max(0) as u32,
                self.default_visible_area.height().max(0) as u32,
            )
        }
    }
}

/// Run `driver`'s constructor against a zeroed configuration.
pub fn build_config(driver: &DriverDescriptor) -> Result<MachineConfig, SlotError> {
    let mut config = MachineConfig::default();
    (driver.construct)(&mut config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{CpuType, SoundType};

    fn base(config: &mut MachineConfig) -> Result<(), SlotError> {
        config.cpus.add(Some("main"), CpuSlot { cpu_type: CpuType::Z80, clock: 3_072_000 })?;
        config.cpus.add(Some("audio"), CpuSlot { cpu_type: CpuType::Z80, clock: 1_789_772 })?;
        config.sounds.add(Some("dac"), SoundSlot { sound_type: SoundType::Dac, clock: 0 })?;
        config.screen_width = 288;
        config.screen_height = 224;
        config.default_visible_area = Rect::new(0, 287, 16, 239);
        Ok(())
    }

    fn bootleg(config: &mut MachineConfig) -> Result<(), SlotError> {
        base(config)?;
        config.cpus.find("main")?.kind.clock = 4_000_000;
        config.cpus.remove("audio")?;
        config.sounds.remove("dac")?;
        Ok(())
    }

    fn broken(config: &mut MachineConfig) -> Result<(), SlotError> {
        base(config)?;
        config.sounds.remove("ym2151")?;
        Ok(())
    }

    fn driver(construct: fn(&mut MachineConfig) -> Result<(), SlotError>) -> DriverDescriptor {
        DriverDescriptor {
            name: "test",
            description: "Test",
            year: "1981",
            manufacturer: "Test",
            clone_of: None,
            construct,
            driver_init: None,
            roms: &[],
            input_ports: &[],
        }
    }

    #[test]
    fn derived_constructor_patches_parent() {
        let config = build_config(&driver(bootleg)).unwrap();
        assert_eq!(config.cpus.len(), 1);
        assert_eq!(config.cpus.get(0).unwrap().kind.clock, 4_000_000);
        assert!(config.sounds.is_empty());
    }

    #[test]
    fn every_build_starts_from_zero() {
        let d = driver(base);
        let first = build_config(&d).unwrap();
        let second = build_config(&d).unwrap();
        assert_eq!(first.cpus.len(), 2);
        assert_eq!(second.cpus.len(), 2);
    }

    #[test]
    fn constructor_errors_propagate() {
        assert!(matches!(
            build_config(&driver(broken)),
            Err(SlotError::NotFound { kind: "sound", .. })
        ));
    }

    #[test]
    fn aspect_defaults() {
        let mut config = MachineConfig::default();
        assert_eq!(config.aspect_ratio(), (4, 3));
        config.video_attributes = VideoAttributes::DUAL_MONITOR;
        assert_eq!(config.aspect_ratio(), (4, 6));
        config.aspect = Some((3, 4));
        assert_eq!(config.aspect_ratio(), (3, 4));
    }

    #[test]
    fn display_size_follows_screen_type() {
        let mut config = build_config(&driver(base)).unwrap();
        assert_eq!(config.display_size(), (288, 224));
        config.video_attributes = VideoAttributes::VECTOR | VideoAttributes::RGB_DIRECT;
        config.screen_width = 1024;
        config.screen_height = 768;
        assert_eq!(config.display_size(), (1024, 768));
        assert!(config.video_attributes.contains(VideoAttributes::RGB_DIRECT));
        assert!(!config.video_attributes.contains(VideoAttributes::DUAL_MONITOR));
    }
}
