//! File-I/O collaborator boundary
//!
//! The kernel core does not parse paths or walk directories; it asks an
//! external collaborator for a binary's bytes through this narrow trait:
//! open, stat for the size, read the full contents, close. Calls are
//! synchronous and fallible.
//!
//! `MemoryFs` is a bounded in-memory implementation used by the boot
//! sequence and the test suites.

use alloc::vec::Vec;

use crate::types::{KernError, KernResult, MAX_PATH};

/// Opaque handle to an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandle(pub usize);

/// File open modes. The loader only ever reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    ReadWrite,
}

/// File information returned by `stat`.
#[derive(Debug, Clone, Copy)]
pub struct FileStat {
    pub size: usize,
    pub read_only: bool,
    pub created: u64,
    pub modified: u64,
}

/// The file-I/O operations the core depends on.
pub trait FileIo {
    fn open(&mut self, path: &str, mode: OpenMode) -> KernResult<FileHandle>;
    fn stat(&self, handle: FileHandle) -> KernResult<FileStat>;
    /// Read from the handle's cursor into `buffer`; returns bytes read.
    fn read(&mut self, handle: FileHandle, buffer: &mut [u8]) -> KernResult<usize>;
    fn close(&mut self, handle: FileHandle) -> KernResult<()>;
}

const MAX_FILES: usize = 16;
const MAX_OPEN: usize = 16;

struct MemFile {
    name: heapless::String<MAX_PATH>,
    data: Vec<u8>,
    read_only: bool,
}

#[derive(Clone, Copy)]
struct OpenSlot {
    file: usize,
    cursor: usize,
}

/// Bounded in-memory filesystem.
pub struct MemoryFs {
    files: heapless::Vec<MemFile, MAX_FILES>,
    open: [Option<OpenSlot>; MAX_OPEN],
}

impl MemoryFs {
    pub const fn new() -> Self {
        Self {
            files: heapless::Vec::new(),
            open: [None; MAX_OPEN],
        }
    }

    /// Register a file under `name`.
    pub fn add_file(&mut self, name: &str, data: &[u8]) -> KernResult<()> {
        let mut bounded = heapless::String::new();
        bounded
            .push_str(name)
            .map_err(|_| KernError::InvalidArgument)?;

        let file = MemFile {
            name: bounded,
            data: Vec::from(data),
            read_only: true,
        };
        self.files.push(file).map_err(|_| KernError::OutOfResources)
    }

    fn slot(&self, handle: FileHandle) -> KernResult<OpenSlot> {
        self.open
            .get(handle.0)
            .copied()
            .flatten()
            .ok_or(KernError::Io)
    }
}

impl FileIo for MemoryFs {
    fn open(&mut self, path: &str, mode: OpenMode) -> KernResult<FileHandle> {
        let file = self
            .files
            .iter()
            .position(|f| f.name.as_str() == path)
            .ok_or(KernError::Io)?;

        if mode == OpenMode::ReadWrite && self.files[file].read_only {
            return Err(KernError::Io);
        }

        let vacant = self
            .open
            .iter()
            .position(Option::is_none)
            .ok_or(KernError::OutOfResources)?;
        self.open[vacant] = Some(OpenSlot { file, cursor: 0 });
        Ok(FileHandle(vacant))
    }

    fn stat(&self, handle: FileHandle) -> KernResult<FileStat> {
        let slot = self.slot(handle)?;
        let file = &self.files[slot.file];
        Ok(FileStat {
            size: file.data.len(),
            read_only: file.read_only,
            created: 0,
            modified: 0,
        })
    }

    fn read(&mut self, handle: FileHandle, buffer: &mut [u8]) -> KernResult<usize> {
        let slot = self.slot(handle)?;
        let data = &self.files[slot.file].data;

        let remaining = data.len().saturating_sub(slot.cursor);
        let count = remaining.min(buffer.len());
        buffer[..count].copy_from_slice(&data[slot.cursor..slot.cursor + count]);

        if let Some(slot) = self.open[handle.0].as_mut() {
            slot.cursor += count;
        }
        Ok(count)
    }

    fn close(&mut self, handle: FileHandle) -> KernResult<()> {
        match self.open.get_mut(handle.0) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                Ok(())
            }
            _ => Err(KernError::Io),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs_with(name: &str, data: &[u8]) -> MemoryFs {
        let mut fs = MemoryFs::new();
        fs.add_file(name, data).unwrap();
        fs
    }

    #[test]
    fn test_open_stat_read_close() {
        let mut fs = fs_with("boot.bin", &[1, 2, 3, 4, 5]);

        let handle = fs.open("boot.bin", OpenMode::Read).unwrap();
        assert_eq!(fs.stat(handle).unwrap().size, 5);

        let mut buffer = [0u8; 5];
        assert_eq!(fs.read(handle, &mut buffer).unwrap(), 5);
        assert_eq!(buffer, [1, 2, 3, 4, 5]);

        fs.close(handle).unwrap();
        assert_eq!(fs.stat(handle).unwrap_err(), KernError::Io);
    }

    #[test]
    fn test_open_missing_file() {
        let mut fs = MemoryFs::new();
        assert_eq!(
            fs.open("nope.bin", OpenMode::Read).unwrap_err(),
            KernError::Io
        );
    }

    #[test]
    fn test_read_advances_cursor() {
        let mut fs = fs_with("a.bin", &[10, 20, 30]);
        let handle = fs.open("a.bin", OpenMode::Read).unwrap();

        let mut chunk = [0u8; 2];
        assert_eq!(fs.read(handle, &mut chunk).unwrap(), 2);
        assert_eq!(chunk, [10, 20]);

        assert_eq!(fs.read(handle, &mut chunk).unwrap(), 1);
        assert_eq!(chunk[0], 30);

        assert_eq!(fs.read(handle, &mut chunk).unwrap(), 0);
    }

    #[test]
    fn test_write_mode_rejected_for_read_only() {
        let mut fs = fs_with("a.bin", &[0]);
        assert_eq!(
            fs.open("a.bin", OpenMode::ReadWrite).unwrap_err(),
            KernError::Io
        );
    }

    #[test]
    fn test_double_close_fails() {
        let mut fs = fs_with("a.bin", &[0]);
        let handle = fs.open("a.bin", OpenMode::Read).unwrap();
        fs.close(handle).unwrap();
        assert_eq!(fs.close(handle).unwrap_err(), KernError::Io);
    }
}
