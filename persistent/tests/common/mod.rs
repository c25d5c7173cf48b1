//! Common test utilities and mock block devices

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use std::io;

/// In-memory block device for testing
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    pub data: Vec<u8>,
    pub block_size: usize,
    pub flushes: usize,
}

impl MemoryBlockDevice {
    /// Create a zero-filled device of `blocks` 512-byte sectors
    pub fn zeroed(blocks: usize) -> Self {
        Self {
            data: vec![0u8; blocks * 512],
            block_size: 512,
            flushes: 0,
        }
    }
}

impl BlockIo for MemoryBlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).expect("valid block size")
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok((self.data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + dst.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read beyond end of device",
            ));
        }
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + src.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write beyond end of device",
            ));
        }
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}
