//! A memory system backed by the driver's ROM regions.
//!
//! Every region a driver declares becomes one flat byte buffer, ROM files
//! placed at their offsets and the rest zero-filled RAM. Drivers address
//! the buffers directly by tag.

use std::collections::BTreeMap;

use marquee_core::driver::{DriverDescriptor, MachineConfig};
use marquee_core::host::{HostError, MemorySystem};
use tracing::{debug, info, warn};

use crate::rom_loader::{RegionLoader, RomLoadError, RomSet};

/// Where a board gets the ROM files for a driver.
pub trait RomSource {
    fn rom_set(&self, driver: &'static DriverDescriptor) -> Result<RomSet, RomLoadError>;
}

/// A fixed set, whatever the driver. Handy for tests and single-game hosts.
impl RomSource for RomSet {
    fn rom_set(&self, _driver: &'static DriverDescriptor) -> Result<RomSet, RomLoadError> {
        Ok(self.clone())
    }
}

pub struct RomBoard {
    source: Box<dyn RomSource>,
    verify_checksums: bool,
    regions: BTreeMap<&'static str, Vec<u8>>,
    /// One entry per address space registered for save states.
    state_entries: Vec<String>,
    mapped: bool,
}

impl RomBoard {
    pub fn new(source: Box<dyn RomSource>) -> Self {
        Self {
            source,
            verify_checksums: true,
            regions: BTreeMap::new(),
            state_entries: Vec::new(),
            mapped: false,
        }
    }

    /// Accept ROMs whose CRC-32 does not match.
    pub fn skip_checksums(mut self) -> Self {
        self.verify_checksums = false;
        self
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    pub fn loaded_regions(&self) -> Vec<&'static str> {
        self.regions.keys().copied().collect()
    }

    pub fn state_entries(&self) -> &[String] {
        &self.state_entries
    }

    fn assemble(&self, driver: &'static DriverDescriptor) -> Result<BTreeMap<&'static str, Vec<u8>>, RomLoadError> {
        let rom_set = self.source.rom_set(driver)?;
        let mut regions = BTreeMap::new();
        for region in driver.roms {
            let data = if self.verify_checksums {
                region.load(&rom_set)?
            } else {
                region.load_skip_checksums(&rom_set)?
            };
            regions.insert(region.tag, data);
        }
        Ok(regions)
    }
}

impl MemorySystem for RomBoard {
    fn load_roms(&mut self, driver: &'static DriverDescriptor) -> Result<(), HostError> {
        let regions = self.assemble(driver).map_err(|err| {
            warn!(driver = driver.name, %err, "ROM load failed");
            HostError::failed(err.to_string())
        })?;
        info!(driver = driver.name, regions = regions.len(), "ROMs loaded");
        self.regions = regions;
        Ok(())
    }

    fn init(&mut self, config: &MachineConfig) -> Result<(), HostError> {
        self.state_entries = config
            .cpus
            .iter()
            .enumerate()
            .map(|(index, slot)| format!("cpu{index}:{}", slot.tag.unwrap_or("-")))
            .collect();
        self.mapped = true;
        debug!(spaces = self.state_entries.len(), "address maps built");
        Ok(())
    }

    fn shutdown(&mut self) {
        self.mapped = false;
    }

    fn region(&self, tag: &str) -> Option<&[u8]> {
        self.regions.get(tag).map(Vec::as_slice)
    }

    fn region_mut(&mut self, tag: &str) -> Option<&mut [u8]> {
        self.regions.get_mut(tag).map(Vec::as_mut_slice)
    }

    fn free_regions(&mut self) {
        self.regions.clear();
    }

    fn dispose_region(&mut self, tag: &str) -> bool {
        self.regions.remove(tag).is_some()
    }

    fn reset_save_state(&mut self) {
        self.state_entries.clear();
    }
}
