//! Sector extents
//!
//! The early loader reads the rest of itself with real-mode BIOS calls, so
//! a single read must stay within one 64 KiB segment. Extents are therefore
//! broken both at discontinuities and at segment boundaries of the address
//! each sector will be loaded to.

use crate::disk::SECTOR_SIZE;

/// Serialized size: lba (u64) + len (u16)
pub const EXTENT_SIZE: usize = 10;

/// Where the first extent lands: after the boot sector and the first
/// loader sector at 0x7C00
pub const LOAD_ADDRESS: u64 = 0x7C00 + 2 * SECTOR_SIZE as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub lba: u64,
    pub len: u16,
}

impl Extent {
    pub fn to_bytes(&self) -> [u8; EXTENT_SIZE] {
        let mut out = [0u8; EXTENT_SIZE];
        out[..8].copy_from_slice(&self.lba.to_le_bytes());
        out[8..].copy_from_slice(&self.len.to_le_bytes());
        out
    }

    /// Sectors covered, in order
    pub fn sectors(&self) -> impl Iterator<Item = u64> {
        self.lba..self.lba + u64::from(self.len)
    }
}

/// Compress a sector list into extents
pub fn pack(sectors: &[u64]) -> Vec<Extent> {
    let mut extents = Vec::new();
    let mut current: Option<Extent> = None;
    let mut base = LOAD_ADDRESS;
    let mut addr = LOAD_ADDRESS;

    for &sect in sectors {
        match current.as_mut() {
            Some(ext)
                if sect == ext.lba + u64::from(ext.len)
                    && (addr ^ base) >> 16 == 0
                    && ext.len < u16::MAX =>
            {
                ext.len += 1;
            }
            _ => {
                extents.extend(current.take());
                current = Some(Extent { lba: sect, len: 1 });
                base = addr;
            }
        }
        addr += SECTOR_SIZE as u64;
    }

    extents.extend(current);
    extents
}
