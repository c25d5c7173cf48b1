//! Common test utilities: in-memory devices and synthetic boot assets

#![allow(dead_code)]

use std::fs::File;
use std::io;

use bootlink_core::fs::SectorResolver;
use bootlink_core::image::LDLINUX_MAGIC;
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

/// In-memory block device for testing
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    pub data: Vec<u8>,
    pub block_size: usize,
}

impl MemoryBlockDevice {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            block_size: 512,
        }
    }

    pub fn zeroed(bytes: usize) -> Self {
        Self::new(vec![0u8; bytes])
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
        Ok(())
    }
}

// Synthetic loader image layout
pub const PATCH_AREA: usize = 0x40;
pub const EPA: usize = 0x80;
pub const ADV_PTRS: usize = 0xA0;
pub const DIR: usize = 0xB0;

// Boot sector offsets, inside the boot code so vfat keeps them
pub const SECT1PTR0: usize = 0x1F0;
pub const SECT1PTR1: usize = 0x1F4;
pub const RAIDPATCH: usize = 0x1F8;

/// Offsets of a synthetic image built by [`boot_image`]
#[derive(Debug, Clone, Copy)]
pub struct ImageLayout {
    pub dirlen: usize,
    pub subvol: usize,
    pub subvollen: usize,
    pub extents: usize,
    pub extent_capacity: usize,
}

impl ImageLayout {
    pub fn new(dirlen: usize, subvollen: usize, extent_capacity: usize) -> Self {
        let subvol = DIR + dirlen;
        let extents = (subvol + subvollen).next_multiple_of(16);
        Self {
            dirlen,
            subvol,
            subvollen,
            extents,
            extent_capacity,
        }
    }

    pub fn end(&self) -> usize {
        self.extents + self.extent_capacity * 10
    }
}

impl Default for ImageLayout {
    fn default() -> Self {
        Self::new(128, 64, 16)
    }
}

fn put16(buf: &mut [u8], at: usize, v: usize) {
    buf[at..at + 2].copy_from_slice(&(v as u16).to_le_bytes());
}

/// A loader image of `sectors` sectors with a patch area described by
/// `layout`. Everything outside the patch structures is a byte pattern.
pub fn boot_image(sectors: usize, layout: ImageLayout) -> Vec<u8> {
    let len = sectors * 512;
    assert!(layout.end() <= len, "image too small for layout");

    let mut image: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
    image[PATCH_AREA..layout.end()].fill(0);

    image[PATCH_AREA..PATCH_AREA + 4].copy_from_slice(&LDLINUX_MAGIC.to_le_bytes());
    put16(&mut image, PATCH_AREA + 22, EPA);

    let epa = [
        ADV_PTRS,
        DIR,
        layout.dirlen,
        layout.subvol,
        layout.subvollen,
        layout.extents,
        layout.extent_capacity,
        SECT1PTR0,
        SECT1PTR1,
        RAIDPATCH,
    ];
    for (i, v) in epa.into_iter().enumerate() {
        put16(&mut image, EPA + 2 * i, v);
    }

    image
}

/// Boot sector stub: jump, signature, boot code, 0x55AA
pub fn boot_sector_stub() -> [u8; 512] {
    let mut bs = [0u8; 512];
    bs[..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
    bs[3..11].copy_from_slice(b"EXTLINUX");
    bs[90..510].fill(0xCC);
    bs[510] = 0x55;
    bs[511] = 0xAA;
    bs
}

/// A formatted FAT32 boot sector as found on disk
pub fn fat32_boot_sector() -> [u8; 512] {
    let mut bs = [0u8; 512];
    bs[..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
    bs[3..11].copy_from_slice(b"mkfs.fat");
    put16(&mut bs, 11, 512);
    bs[13] = 8;
    put16(&mut bs, 14, 32);
    bs[16] = 2;
    put16(&mut bs, 24, 63);
    put16(&mut bs, 26, 255);
    bs[28..32].copy_from_slice(&2048u32.to_le_bytes());
    bs[71..82].copy_from_slice(b"NO NAME    ");
    bs[82..90].copy_from_slice(b"FAT32   ");
    bs[510] = 0x55;
    bs[511] = 0xAA;
    bs
}

pub fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub fn u64_at(buf: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(b)
}

/// Maps a file to consecutive sectors starting at `first`
pub struct ContiguousSectors(pub u64);

impl SectorResolver for ContiguousSectors {
    fn sectors(&self, _file: &File, count: usize) -> bootlink_core::Result<Vec<u64>> {
        Ok((self.0..self.0 + count as u64).collect())
    }
}
