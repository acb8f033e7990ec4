//! ROM-set loading and validation.
//!
//! A [`RomSet`] is a bag of named files, read from an extracted directory,
//! an archive, or test data. [`RegionLoader`] assembles a driver's
//! [`RomRegion`] from a set, checking sizes and CRC-32 checksums.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use marquee_core::driver::RomRegion;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CRC-32 (private)
// ---------------------------------------------------------------------------

/// Reflected polynomial 0xEDB88320, as used by ZIP and PNG.
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0u32;
    while i < 256 {
        let mut crc = i;
        let mut j = 0;
        while j < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            j += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
};

fn crc32(data: &[u8]) -> u32 {
    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        (crc >> 8) ^ CRC32_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize]
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RomLoadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("missing ROM file: {0}")]
    MissingFile(String),

    #[error("ROM {file}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        file: String,
        expected: usize,
        actual: usize,
    },

    #[error("ROM {file}: CRC32 expected 0x{expected:08X}, got 0x{actual:08X}")]
    ChecksumMismatch {
        file: String,
        expected: u32,
        actual: u32,
    },

    #[error("ROM {file} does not fit in region '{region}'")]
    OutOfBounds { file: String, region: &'static str },
}

// ---------------------------------------------------------------------------
// RomSet
// ---------------------------------------------------------------------------

/// Named ROM files, keyed by file name without any path.
#[derive(Debug, Default, Clone)]
pub struct RomSet {
    files: HashMap<String, Vec<u8>>,
}

impl RomSet {
    /// Read every regular file in `path` (non-recursive).
    pub fn from_directory(path: &Path) -> Result<Self, RomLoadError> {
        let mut set = Self::default();
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            let Some(name) = file_path.file_name() else {
                continue;
            };
            let name = name.to_string_lossy().into_owned();
            set.insert(name, std::fs::read(&file_path)?);
        }
        Ok(set)
    }

    /// Build a set from `(filename, data)` pairs.
    pub fn from_slices(entries: &[(&str, &[u8])]) -> Self {
        let mut set = Self::default();
        for (name, data) in entries {
            set.insert(*name, data.to_vec());
        }
        set
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.files.insert(name.into(), data);
    }

    /// Add every file of `fallback` this set does not already have.
    pub fn merge_missing(&mut self, fallback: RomSet) {
        for (name, data) in fallback.files {
            self.files.entry(name).or_insert(data);
        }
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn require(&self, name: &str) -> Result<&[u8], RomLoadError> {
        self.get(name)
            .ok_or_else(|| RomLoadError::MissingFile(name.to_string()))
    }

    pub fn require_sized(&self, name: &str, expected_size: usize) -> Result<&[u8], RomLoadError> {
        let data = self.require(name)?;
        if data.len() != expected_size {
            return Err(RomLoadError::SizeMismatch {
                file: name.to_string(),
                expected: expected_size,
                actual: data.len(),
            });
        }
        Ok(data)
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Region assembly
// ---------------------------------------------------------------------------

/// Assembles a [`RomRegion`] from a [`RomSet`].
pub trait RegionLoader {
    /// Load every file into a zero-filled buffer, validating sizes and CRC-32s.
    fn load(&self, rom_set: &RomSet) -> Result<Vec<u8>, RomLoadError>;

    /// Like [`load`](Self::load), but only sizes are checked. For modified
    /// or development ROMs.
    fn load_skip_checksums(&self, rom_set: &RomSet) -> Result<Vec<u8>, RomLoadError>;
}

impl RegionLoader for RomRegion {
    fn load(&self, rom_set: &RomSet) -> Result<Vec<u8>, RomLoadError> {
        load_region(self, rom_set, true)
    }

    fn load_skip_checksums(&self, rom_set: &RomSet) -> Result<Vec<u8>, RomLoadError> {
        load_region(self, rom_set, false)
    }
}

fn load_region(region: &RomRegion, rom_set: &RomSet, verify: bool) -> Result<Vec<u8>, RomLoadError> {
    let mut buffer = vec![0u8; region.size];

    for entry in region.entries {
        let data = rom_set.require_sized(entry.name, entry.size)?;

        if verify && let Some(expected) = entry.crc32 {
            let actual = crc32(data);
            if actual != expected {
                return Err(RomLoadError::ChecksumMismatch {
                    file: entry.name.to_string(),
                    expected,
                    actual,
                });
            }
        }

        let dest = entry
            .offset
            .checked_add(entry.size)
            .and_then(|end| buffer.get_mut(entry.offset..end))
            .ok_or_else(|| RomLoadError::OutOfBounds {
                file: entry.name.to_string(),
                region: region.tag,
            })?;
        dest.copy_from_slice(data);
    }

    Ok(buffer)
}
