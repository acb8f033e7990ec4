//! Disk-image access on top of the host's generic file storage.
//!
//! Read-only images are searched for in the ROM sets of the running driver
//! and then each of its ancestors, so a clone can share its parent's disks.
//! Writable images always live in a separate differencing area.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::{debug, warn};

use crate::driver::DriverDescriptor;

/// Which storage area a file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileType {
    /// Read-only disk image inside a ROM set.
    Image,
    /// Writable disk image in the differencing area.
    ImageDiff,
    Nvram,
    Config,
}

/// An open file. Anything seekable and readable/writable qualifies.
pub trait StorageFile: Read + Write + Seek {
    fn size(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(end)
    }
}

impl<T: Read + Write + Seek> StorageFile for T {}

/// The host's file storage.
pub trait StorageBackend {
    /// Open `filename` of the given type, optionally scoped to a system's
    /// ROM set. Returns `None` when the file does not exist or cannot be opened.
    fn open(
        &mut self,
        system: Option<&str>,
        filename: &str,
        file_type: FileType,
        for_write: bool,
    ) -> Option<Box<dyn StorageFile>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

impl OpenMode {
    /// Interpret an fopen-style mode string: `"r"` and `"rb"` are read-only,
    /// anything else (`"r+"`, `"w"`, `"rb+"`) is read/write.
    pub fn parse(mode: &str) -> Self {
        if mode.starts_with('r') && !mode.contains('+') {
            Self::ReadOnly
        } else {
            Self::ReadWrite
        }
    }
}

/// An open disk image and the mode it was opened with.
pub struct StorageHandle {
    file: Box<dyn StorageFile>,
    mode: OpenMode,
}

impl StorageHandle {
    pub fn new(file: Box<dyn StorageFile>, mode: OpenMode) -> Self {
        Self { file, mode }
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Read up to `buf.len()` bytes at `offset`; short at end of file.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut total = 0;
        while total < buf.len() {
            match self.file.read(&mut buf[total..])? {
                0 => break,
                n => total += n,
            }
        }
        Ok(total)
    }

    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<usize> {
        if self.mode == OpenMode::ReadOnly {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "disk image is open read-only",
            ));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(data.len())
    }

    pub fn size(&mut self) -> io::Result<u64> {
        self.file.size()
    }
}

/// Identifies an open disk image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiskId(u32);

/// Disk-image interface for the running session.
pub struct StorageAdapter {
    backend: Box<dyn StorageBackend>,
    driver: Option<&'static DriverDescriptor>,
    images: BTreeMap<DiskId, StorageHandle>,
    next_id: u32,
}

impl StorageAdapter {
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            driver: None,
            images: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Resolve read-only images through `driver`'s clone chain from now on.
    pub fn attach(&mut self, driver: &'static DriverDescriptor) {
        debug!(driver = driver.name, "disk interface installed");
        self.driver = Some(driver);
    }

    /// Close every image and forget the driver.
    pub fn detach(&mut self) {
        self.close_all();
        self.driver = None;
    }

    pub fn is_attached(&self) -> bool {
        self.driver.is_some()
    }

    /// Open a disk image with an fopen-style `mode`.
    pub fn open_image(&mut self, filename: &str, mode: &str) -> Option<DiskId> {
        let mode = OpenMode::parse(mode);
        let file = match mode {
            OpenMode::ReadOnly => {
                let Some(driver) = self.driver else {
                    warn!(filename, "disk image opened with no driver attached");
                    return None;
                };
                driver.ancestry().find_map(|system| {
                    self.backend
                        .open(Some(system.name), filename, FileType::Image, false)
                })?
            }
            OpenMode::ReadWrite => self
                .backend
                .open(None, filename, FileType::ImageDiff, true)?,
        };

        let id = DiskId(self.next_id);
        self.next_id += 1;
        self.images.insert(id, StorageHandle::new(file, mode));
        debug!(filename, ?mode, ?id, "disk image opened");
        Some(id)
    }

    pub fn read(&mut self, id: DiskId, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.handle(id)?.read_at(offset, buf)
    }

    pub fn write(&mut self, id: DiskId, offset: u64, data: &[u8]) -> io::Result<usize> {
        self.handle(id)?.write_at(offset, data)
    }

    pub fn length(&mut self, id: DiskId) -> io::Result<u64> {
        self.handle(id)?.size()
    }

    pub fn mode(&self, id: DiskId) -> Option<OpenMode> {
        self.images.get(&id).map(StorageHandle::mode)
    }

    /// Returns `false` if `id` was not open.
    pub fn close(&mut self, id: DiskId) -> bool {
        self.images.remove(&id).is_some()
    }

    /// Close every open image, returning how many were open.
    pub fn close_all(&mut self) -> usize {
        let count = self.images.len();
        self.images.clear();
        if count > 0 {
            debug!(count, "closed disk images");
        }
        count
    }

    pub fn open_count(&self) -> usize {
        self.images.len()
    }

    /// Open a plain file (NVRAM, settings) directly through the backend.
    pub fn open_file(
        &mut self,
        system: Option<&str>,
        filename: &str,
        file_type: FileType,
        for_write: bool,
    ) -> Option<Box<dyn StorageFile>> {
        self.backend.open(system, filename, file_type, for_write)
    }

    fn handle(&mut self, id: DiskId) -> io::Result<&mut StorageHandle> {
        self.images
            .get_mut(&id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "disk image is not open"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn mode_strings() {
        assert_eq!(OpenMode::parse("r"), OpenMode::ReadOnly);
        assert_eq!(OpenMode::parse("rb"), OpenMode::ReadOnly);
        assert_eq!(OpenMode::parse("r+"), OpenMode::ReadWrite);
        assert_eq!(OpenMode::parse("rb+"), OpenMode::ReadWrite);
        assert_eq!(OpenMode::parse("w"), OpenMode::ReadWrite);
        assert_eq!(OpenMode::parse("wr"), OpenMode::ReadWrite);
    }

    #[test]
    fn handle_reads_short_at_end() {
        let mut handle = StorageHandle::new(Box::new(Cursor::new(vec![1, 2, 3, 4])), OpenMode::ReadOnly);
        let mut buf = [0u8; 4];
        assert_eq!(handle.read_at(2, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[3, 4]);
        assert_eq!(handle.size().unwrap(), 4);
    }

    #[test]
    fn read_only_handle_rejects_writes() {
        let mut handle = StorageHandle::new(Box::new(Cursor::new(vec![0; 4])), OpenMode::ReadOnly);
        let err = handle.write_at(0, &[9]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn write_extends_file() {
        let mut handle = StorageHandle::new(Box::new(Cursor::new(Vec::new())), OpenMode::ReadWrite);
        assert_eq!(handle.write_at(4, &[0xAA, 0xBB]).unwrap(), 2);
        assert_eq!(handle.size().unwrap(), 6);
        let mut buf = [0xFFu8; 6];
        handle.read_at(0, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0, 0, 0xAA, 0xBB]);
    }

    #[test]
    fn size_keeps_position() {
        let mut file = Cursor::new(vec![0u8; 10]);
        file.seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(file.size().unwrap(), 10);
        assert_eq!(file.stream_position().unwrap(), 3);
    }
}
