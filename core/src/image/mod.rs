//! Boot image and boot sector handling
//!
//! # Architecture
//!
//! - [`BootAssets`] - owned copies of the loader image and boot sector stub
//! - [`patch_area`] - typed view of the patch area found inside the image
//! - [`extent`] - sector list compaction
//! - [`bootsect`] - FAT-shaped boot sector template fields
//! - [`patch`] - fills everything in and checksums the result

pub mod bootsect;
pub mod extent;
pub mod patch;
pub mod patch_area;

use std::fs;
use std::path::Path;

use crate::disk::SECTOR_SIZE;
use crate::error::{InstallError, Result};

pub use extent::{pack, Extent};
pub use patch::{patch, PatchInput};
pub use patch_area::{PatchLayout, LDLINUX_MAGIC};

/// Sectors reserved for the ADV after the image
pub const ADV_SECTORS: usize = 2;

/// The loader image and the boot sector stub it pairs with
#[derive(Debug, Clone)]
pub struct BootAssets {
    image: Vec<u8>,
    boot_sector: [u8; SECTOR_SIZE],
}

impl BootAssets {
    pub fn new(image: Vec<u8>, boot_sector: &[u8]) -> Result<Self> {
        if image.is_empty() || image.len() % SECTOR_SIZE != 0 {
            return Err(InstallError::InvalidAssets(format!(
                "boot image is {} bytes, expected a non-zero multiple of {}",
                image.len(),
                SECTOR_SIZE
            )));
        }

        let boot_sector: [u8; SECTOR_SIZE] = boot_sector.try_into().map_err(|_| {
            InstallError::InvalidAssets(format!(
                "boot sector is {} bytes, expected {}",
                boot_sector.len(),
                SECTOR_SIZE
            ))
        })?;

        Ok(Self { image, boot_sector })
    }

    pub fn load(image: &Path, boot_sector: &Path) -> Result<Self> {
        let read = |path: &Path| {
            fs::read(path).map_err(|e| InstallError::io(format!("reading {}", path.display()), e))
        };
        Self::new(read(image)?, &read(boot_sector)?)
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    pub fn boot_sector(&self) -> &[u8; SECTOR_SIZE] {
        &self.boot_sector
    }

    pub fn boot_sector_mut(&mut self) -> &mut [u8; SECTOR_SIZE] {
        &mut self.boot_sector
    }

    /// Sectors taken by the image plus its ADV
    pub fn sector_count(&self) -> usize {
        self.image.len().div_ceil(SECTOR_SIZE) + ADV_SECTORS
    }
}

// Bounds checked little-endian field access

fn field<'a>(buf: &'a [u8], offset: usize, len: usize, what: &str) -> Result<&'a [u8]> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or_else(|| out_of_bounds(what, offset, buf.len()))
}

fn field_mut<'a>(buf: &'a mut [u8], offset: usize, len: usize, what: &str) -> Result<&'a mut [u8]> {
    let size = buf.len();
    offset
        .checked_add(len)
        .and_then(|end| buf.get_mut(offset..end))
        .ok_or_else(|| out_of_bounds(what, offset, size))
}

fn out_of_bounds(what: &str, offset: usize, size: usize) -> InstallError {
    InstallError::PatchArea(format!("{} at {:#x} is outside a {} byte buffer", what, offset, size))
}

pub(crate) fn check_range(buf: &[u8], offset: usize, len: usize, what: &str) -> Result<()> {
    field(buf, offset, len, what).map(|_| ())
}

pub(crate) fn get_u16(buf: &[u8], offset: usize, what: &str) -> Result<u16> {
    let b = field(buf, offset, 2, what)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

pub(crate) fn get_u32(buf: &[u8], offset: usize, what: &str) -> Result<u32> {
    let b = field(buf, offset, 4, what)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn put_bytes(buf: &mut [u8], offset: usize, value: &[u8], what: &str) -> Result<()> {
    field_mut(buf, offset, value.len(), what)?.copy_from_slice(value);
    Ok(())
}

pub(crate) fn put_u16(buf: &mut [u8], offset: usize, value: u16, what: &str) -> Result<()> {
    put_bytes(buf, offset, &value.to_le_bytes(), what)
}

pub(crate) fn put_u32(buf: &mut [u8], offset: usize, value: u32, what: &str) -> Result<()> {
    put_bytes(buf, offset, &value.to_le_bytes(), what)
}

pub(crate) fn put_u64(buf: &mut [u8], offset: usize, value: u64, what: &str) -> Result<()> {
    put_bytes(buf, offset, &value.to_le_bytes(), what)
}
