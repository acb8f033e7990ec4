//! ROM path resolution: loads a [`RomSet`] from a MAME-style rompath,
//! a direct ZIP file, or a directory of loose ROM files.
//!
//! A clone's set is completed from its parent's, so files a clone shares
//! with its parent only need to exist once.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use marquee_core::driver::DriverDescriptor;
use marquee_machines::{RomLoadError, RomSet, RomSource};
use tracing::debug;

/// Resolve a ROM path for one set name.
///
/// Resolution order:
/// 1. If `path` ends with `.zip` → load directly as a ZIP archive.
/// 2. If `path` is a directory containing `{set_name}.zip` → load that ZIP.
/// 3. If `path` contains a `{set_name}` directory → load its loose files.
///
/// Returns `Ok(None)` when `path` holds nothing for `set_name`.
pub fn load_rom_set(set_name: &str, path: &Path) -> Result<Option<RomSet>, RomLoadError> {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
    {
        let matches = path.file_stem().is_some_and(|stem| stem == set_name);
        return if matches { load_from_zip(path).map(Some) } else { Ok(None) };
    }

    if path.is_dir() {
        let zip_path = path.join(format!("{set_name}.zip"));
        if zip_path.is_file() {
            return load_from_zip(&zip_path).map(Some);
        }
        let set_dir = path.join(set_name);
        if set_dir.is_dir() {
            return RomSet::from_directory(&set_dir).map(Some);
        }
    }
    Ok(None)
}

/// Extract all files from a ZIP archive into a [`RomSet`].
fn load_from_zip(path: &Path) -> Result<RomSet, RomLoadError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut archive = zip::ZipArchive::new(reader)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid ZIP: {e}")))?;

    let mut set = RomSet::default();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("ZIP entry error: {e}")))?;

        if entry.is_dir() {
            continue;
        }

        // Archives sometimes nest the files one directory down.
        let name = entry.name().rsplit('/').next().unwrap_or_default().to_string();
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        set.insert(name, data);
    }
    debug!(path = %path.display(), files = set.len(), "ZIP loaded");
    Ok(set)
}

/// The directories (or ZIP files) searched for ROM sets, in order.
#[derive(Debug, Clone, Default)]
pub struct RomPath {
    roots: Vec<PathBuf>,
}

impl RomPath {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// First set named `set_name` along the path.
    fn find(&self, set_name: &str) -> Result<Option<RomSet>, RomLoadError> {
        for root in &self.roots {
            if let Some(set) = load_rom_set(set_name, root)? {
                debug!(set = set_name, root = %root.display(), "ROM set found");
                return Ok(Some(set));
            }
        }
        Ok(None)
    }
}

impl RomSource for RomPath {
    fn rom_set(&self, driver: &'static DriverDescriptor) -> Result<RomSet, RomLoadError> {
        let mut merged: Option<RomSet> = None;
        for ancestor in driver.ancestry() {
            let Some(set) = self.find(ancestor.name)? else {
                continue;
            };
            match merged.as_mut() {
                Some(nearer) => nearer.merge_missing(set),
                None => merged = Some(set),
            }
        }
        merged.ok_or_else(|| {
            RomLoadError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no ROM set for '{}' on the ROM path", driver.name),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use marquee_machines::{JOUST, JOUSTR};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn create_test_zip(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let zip_path = dir.join(name);
        let file = File::create(&zip_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options =
            zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (fname, data) in files {
            zip.start_file(*fname, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
        zip_path
    }

    #[test]
    fn resolve_zip_file_directly() {
        let dir = scratch_dir("marquee_rompath_test_zip");
        let zip_path = create_test_zip(&dir, "joust.zip", &[("rom.bin", &[0xAA; 16])]);

        let rom_set = load_rom_set("joust", &zip_path).unwrap().unwrap();
        assert_eq!(rom_set.get("rom.bin"), Some(&[0xAA; 16][..]));
        assert!(load_rom_set("pacman", &zip_path).unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn resolve_zip_from_rompath_directory() {
        let dir = scratch_dir("marquee_rompath_test_dir");
        create_test_zip(&dir, "joust.zip", &[("joust/rom.bin", &[0xBB; 8])]);

        let rom_set = load_rom_set("joust", &dir).unwrap().unwrap();
        assert_eq!(rom_set.get("rom.bin"), Some(&[0xBB; 8][..]));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn resolve_loose_set_directory() {
        let dir = scratch_dir("marquee_rompath_test_loose");
        std::fs::create_dir_all(dir.join("joust")).unwrap();
        std::fs::write(dir.join("joust").join("test.rom"), [0xCC; 4]).unwrap();

        let rom_set = load_rom_set("joust", &dir).unwrap().unwrap();
        assert_eq!(rom_set.get("test.rom"), Some(&[0xCC; 4][..]));
        assert!(load_rom_set("pacman", &dir).unwrap().is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn clone_set_is_completed_from_parent() {
        let dir = scratch_dir("marquee_rompath_test_clone");
        create_test_zip(&dir, "joust.zip", &[("shared.rom", &[1; 4]), ("label.rom", &[1; 4])]);
        create_test_zip(&dir, "joustr.zip", &[("label.rom", &[2; 4])]);

        let path = RomPath::new(vec![dir.clone()]);
        let set = path.rom_set(&JOUSTR).unwrap();
        assert_eq!(set.get("label.rom"), Some(&[2; 4][..]));
        assert_eq!(set.get("shared.rom"), Some(&[1; 4][..]));

        let parent = path.rom_set(&JOUST).unwrap();
        assert_eq!(parent.get("label.rom"), Some(&[1; 4][..]));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_set_is_not_found() {
        let dir = scratch_dir("marquee_rompath_test_missing");
        let err = RomPath::new(vec![dir.clone()]).rom_set(&JOUST).unwrap_err();
        assert!(matches!(err, RomLoadError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
