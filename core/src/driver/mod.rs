//! Declarative descriptions of emulated systems.
//!
//! A [`DriverDescriptor`] is a process-wide constant. Everything a session
//! mutates lives in the [`MachineConfig`] built from it by [`build_config`].

pub mod config;
pub mod slots;

pub use config::{
    InitContext, MachineConfig, NvramAccess, NvramHandler, PaletteInit, Rgb, ScreenTarget,
    VideoAttributes, VideoHardware, build_config,
};
pub use slots::{CpuSlot, CpuType, MAX_SLOTS, Slot, SlotError, SlotTable, SoundSlot, SoundType};

/// Name of a memory region, e.g. `"maincpu"` or `"gfx1"`.
pub type RegionTag = &'static str;

// ---------------------------------------------------------------------------
// ROM regions
// ---------------------------------------------------------------------------

/// Describes how a single ROM file maps into a memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomEntry {
    /// Filename in the ROM set.
    pub name: &'static str,
    /// Expected size in bytes.
    pub size: usize,
    /// Offset within the region where this ROM is loaded.
    pub offset: usize,
    /// `None` accepts any contents.
    pub crc32: Option<u32>,
}

/// One named memory region and the ROM files that fill it.
///
/// A region with no entries is zero-filled RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomRegion {
    pub tag: RegionTag,
    /// Total size of the region in bytes.
    pub size: usize,
    /// Free the region once video start-up has consumed it (typically gfx ROMs).
    pub dispose: bool,
    pub entries: &'static [RomEntry],
}

// ---------------------------------------------------------------------------
// Input ports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPortDef {
    pub name: &'static str,
    /// Bits of the port this definition drives.
    pub mask: u8,
    pub default: u8,
}

/// A live input port, allocated from an [`InputPortDef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPort {
    pub name: &'static str,
    pub mask: u8,
    pub default: u8,
    pub value: u8,
}

impl From<&InputPortDef> for InputPort {
    fn from(def: &InputPortDef) -> Self {
        Self {
            name: def.name,
            mask: def.mask,
            default: def.default,
            value: def.default,
        }
    }
}

// ---------------------------------------------------------------------------
// DriverDescriptor
// ---------------------------------------------------------------------------

/// One emulated system.
pub struct DriverDescriptor {
    /// Short name; also the ROM set and NVRAM file name.
    pub name: &'static str,
    pub description: &'static str,
    pub year: &'static str,
    pub manufacturer: &'static str,
    /// Parent set. ROMs and disk images missing from a clone are looked up here.
    pub clone_of: Option<&'static DriverDescriptor>,
    /// Fill in a zeroed configuration.
    pub construct: fn(&mut MachineConfig) -> Result<(), SlotError>,
    /// Runs once the memory system is up, before video start.
    pub driver_init: Option<fn(&mut InitContext<'_>)>,
    pub roms: &'static [RomRegion],
    pub input_ports: &'static [InputPortDef],
}

impl DriverDescriptor {
    /// This driver followed by its parent, grandparent, and so on.
    pub fn ancestry(&'static self) -> impl Iterator<Item = &'static DriverDescriptor> {
        std::iter::successors(Some(self), |driver| driver.clone_of)
    }

    pub fn is_clone(&self) -> bool {
        self.clone_of.is_some()
    }

    pub fn has_roms(&self) -> bool {
        !self.roms.is_empty()
    }

    pub fn region(&self, tag: &str) -> Option<&'static RomRegion> {
        self.roms.iter().find(|region| region.tag == tag)
    }
}

impl std::fmt::Debug for DriverDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverDescriptor")
            .field("name", &self.name)
            .field("clone_of", &self.clone_of.map(|parent| parent.name))
            .finish_non_exhaustive()
    }
}
