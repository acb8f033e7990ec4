//! Files a session reads and writes, laid out under one data directory:
//!
//! ```text
//! <data>/nvram/<name>.nv
//! <data>/cfg/<name>.toml
//! <data>/diff/<system>/<name>      writable disk images
//! <rompath>/<system>/<name>        read-only disk images
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use marquee_core::storage::{FileType, StorageBackend, StorageFile};
use tracing::{debug, warn};

pub struct FsStorage {
    data_dir: PathBuf,
    rom_roots: Vec<PathBuf>,
}

impl FsStorage {
    pub fn new(data_dir: PathBuf, rom_roots: Vec<PathBuf>) -> Self {
        Self { data_dir, rom_roots }
    }

    pub fn cfg_dir(&self) -> PathBuf {
        self.data_dir.join("cfg")
    }

    fn path(&self, system: Option<&str>, filename: &str, file_type: FileType) -> Option<PathBuf> {
        let scoped = |base: PathBuf| match system {
            Some(system) => base.join(system).join(filename),
            None => base.join(filename),
        };
        match file_type {
            FileType::Nvram => Some(self.data_dir.join("nvram").join(format!("{filename}.nv"))),
            FileType::Config => Some(self.cfg_dir().join(format!("{filename}.toml"))),
            FileType::ImageDiff => Some(scoped(self.data_dir.join("diff"))),
            FileType::Image => self
                .rom_roots
                .iter()
                .filter(|root| root.is_dir())
                .map(|root| scoped(root.clone()))
                .find(|path| path.is_file()),
        }
    }
}

fn open_path(path: &Path, file_type: FileType, for_write: bool) -> std::io::Result<File> {
    if !for_write {
        return File::open(path);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    // Disk images are patched in place; everything else is rewritten whole.
    let truncate = !matches!(file_type, FileType::ImageDiff);
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(truncate)
        .open(path)
}

impl StorageBackend for FsStorage {
    fn open(
        &mut self,
        system: Option<&str>,
        filename: &str,
        file_type: FileType,
        for_write: bool,
    ) -> Option<Box<dyn StorageFile>> {
        if for_write && file_type == FileType::Image {
            warn!(filename, "ROM-set images are read-only");
            return None;
        }
        let path = self.path(system, filename, file_type)?;
        match open_path(&path, file_type, for_write) {
            Ok(file) => {
                debug!(path = %path.display(), for_write, "opened");
                Some(Box::new(file))
            }
            Err(err) => {
                debug!(path = %path.display(), %err, "open failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn nvram_is_written_then_read_back() {
        let dir = scratch_dir("marquee_storage_test_nvram");
        let mut storage = FsStorage::new(dir.clone(), Vec::new());

        assert!(storage.open(Some("joust"), "joust", FileType::Nvram, false).is_none());
        let mut file = storage.open(Some("joust"), "joust", FileType::Nvram, true).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        drop(file);

        let mut data = Vec::new();
        let mut file = storage.open(Some("joust"), "joust", FileType::Nvram, false).unwrap();
        file.read_to_end(&mut data).unwrap();
        assert_eq!(data, [1, 2, 3]);
        assert!(dir.join("nvram").join("joust.nv").is_file());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn images_come_from_the_first_root_that_has_them() {
        let dir = scratch_dir("marquee_storage_test_images");
        let (first, second) = (dir.join("a"), dir.join("b"));
        fs::create_dir_all(second.join("joust")).unwrap();
        fs::create_dir_all(&first).unwrap();
        fs::write(second.join("joust").join("disk.chd"), [9; 4]).unwrap();

        let mut storage = FsStorage::new(dir.join("data"), vec![first, second]);
        let mut file = storage.open(Some("joust"), "disk.chd", FileType::Image, false).unwrap();
        assert_eq!(file.size().unwrap(), 4);
        assert!(storage.open(Some("joust"), "disk.chd", FileType::Image, true).is_none());
        assert!(storage.open(Some("pacman"), "disk.chd", FileType::Image, false).is_none());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn diff_images_keep_their_contents_when_reopened_for_write() {
        let dir = scratch_dir("marquee_storage_test_diff");
        let mut storage = FsStorage::new(dir.clone(), Vec::new());

        let mut file = storage.open(Some("joust"), "disk.dif", FileType::ImageDiff, true).unwrap();
        file.write_all(&[5; 8]).unwrap();
        drop(file);

        let mut file = storage.open(Some("joust"), "disk.dif", FileType::ImageDiff, true).unwrap();
        assert_eq!(file.size().unwrap(), 8);
        assert!(dir.join("diff").join("joust").join("disk.dif").is_file());

        fs::remove_dir_all(&dir).unwrap();
    }
}
