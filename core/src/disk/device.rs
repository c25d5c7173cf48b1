//! File-descriptor backed `BlockIo`
//!
//! Wraps the opened target device (or, in tests, a plain image file) and
//! exposes it through `gpt_disk_io::BlockIo` with 512-byte blocks so the
//! byte helpers from `bootlink_persistent::io` work on it unchanged.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::{FileExt, MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

use super::{ioctl, SECTOR_SIZE};
use crate::error::{InstallError, Result};

#[derive(Debug)]
pub struct BlockDevice {
    file: File,
    path: PathBuf,
}

impl BlockDevice {
    /// Open a device for synchronous read-write access
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(nix::libc::O_SYNC)
            .open(path)
            .map_err(|e| InstallError::io(format!("cannot open device {}", path.display()), e))?;

        Ok(Self::from_file(file, path))
    }

    /// Wrap an already opened file
    pub fn from_file(file: File, path: impl Into<PathBuf>) -> Self {
        Self {
            file,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Device number this handle refers to (`st_rdev`)
    pub fn rdev(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.rdev())
    }

    /// Size in bytes, or 0 if nothing reports one
    pub fn size_bytes(&self) -> u64 {
        let fd = self.file.as_raw_fd();

        let mut bytes: u64 = 0;
        // SAFETY: fd is open for the lifetime of self, bytes outlives the call
        if unsafe { ioctl::blkgetsize64(fd, &mut bytes) }.is_ok() {
            return bytes;
        }

        let mut sects: nix::libc::c_ulong = 0;
        // SAFETY: as above
        if unsafe { ioctl::blkgetsize(fd, &mut sects) }.is_ok() {
            return u64::from(sects) << 9;
        }

        match self.file.metadata() {
            Ok(st) if st.len() != 0 => st.len(),
            _ => 0,
        }
    }

    fn offset(start_lba: Lba) -> u64 {
        start_lba.0 * SECTOR_SIZE as u64
    }
}

impl BlockIo for BlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::BS_512
    }

    fn num_blocks(&mut self) -> core::result::Result<u64, Self::Error> {
        Ok(self.size_bytes() / SECTOR_SIZE as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> core::result::Result<(), Self::Error> {
        self.file.read_exact_at(dst, Self::offset(start_lba))
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> core::result::Result<(), Self::Error> {
        self.file.write_all_at(src, Self::offset(start_lba))
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        self.file.sync_all()
    }
}
