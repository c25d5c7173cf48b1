//! Patch area layout
//!
//! The loader image carries a patch area, found by scanning for
//! [`LDLINUX_MAGIC`] on a 4-byte boundary:
//!
//! ```text
//! +0   magic          u32
//! +4   instance       u32
//! +8   data_sectors   u16
//! +10  adv_sectors    u16
//! +12  dwords         u32
//! +16  checksum       u32
//! +20  maxtransfer    u16
//! +22  epaoffset      u16   image offset of the extended patch area
//! ```
//!
//! The extended patch area is ten u16 offsets/lengths. `sect1ptr0`,
//! `sect1ptr1` and `raidpatch` point into the boot sector, everything
//! else into the image.

use super::extent::EXTENT_SIZE;
use super::{check_range, get_u16, get_u32};
use crate::disk::SECTOR_SIZE;
use crate::error::{InstallError, Result};

pub const LDLINUX_MAGIC: u32 = 0x3EB2_02FE;

// Patch area fields, relative to the magic
pub(crate) const PA_DATA_SECTORS: usize = 8;
pub(crate) const PA_ADV_SECTORS: usize = 10;
pub(crate) const PA_DWORDS: usize = 12;
pub(crate) const PA_CHECKSUM: usize = 16;
pub(crate) const PA_MAXTRANSFER: usize = 20;
const PA_EPAOFFSET: usize = 22;
const PA_SIZE: usize = 24;

const EPA_SIZE: usize = 20;

/// Extended patch area, offsets as stored in the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtPatchArea {
    pub advptroffset: u16,
    pub diroffset: u16,
    pub dirlen: u16,
    pub subvoloffset: u16,
    pub subvollen: u16,
    pub secptroffset: u16,
    pub secptrcnt: u16,
    pub sect1ptr0: u16,
    pub sect1ptr1: u16,
    pub raidpatch: u16,
}

impl ExtPatchArea {
    fn read(image: &[u8], at: usize) -> Result<Self> {
        check_range(image, at, EPA_SIZE, "extended patch area")?;
        let word = |i: usize| get_u16(image, at + 2 * i, "extended patch area");

        Ok(Self {
            advptroffset: word(0)?,
            diroffset: word(1)?,
            dirlen: word(2)?,
            subvoloffset: word(3)?,
            subvollen: word(4)?,
            secptroffset: word(5)?,
            secptrcnt: word(6)?,
            sect1ptr0: word(7)?,
            sect1ptr1: word(8)?,
            raidpatch: word(9)?,
        })
    }
}

/// Where everything lives, computed once from a scan of the image.
///
/// Construction checks that every referenced field fits its buffer, so
/// patching with a layout can only fail on content, never on bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchLayout {
    /// Image offset of the magic
    pub patch_area: usize,
    pub epa: ExtPatchArea,
}

impl PatchLayout {
    pub fn locate(image: &[u8]) -> Result<Self> {
        let patch_area = image
            .chunks_exact(4)
            .position(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]) == LDLINUX_MAGIC)
            .map(|word| word * 4)
            .ok_or_else(|| InstallError::PatchArea("no patch area magic in boot image".into()))?;

        check_range(image, patch_area, PA_SIZE, "patch area")?;
        let epaoffset = get_u16(image, patch_area + PA_EPAOFFSET, "patch area")?;
        let epa = ExtPatchArea::read(image, usize::from(epaoffset))?;

        let layout = Self { patch_area, epa };
        layout.check_bounds(image.len())?;

        log::debug!("patch area at {:#x}, extended patch area at {:#x}", patch_area, epaoffset);
        Ok(layout)
    }

    fn check_bounds(&self, image_len: usize) -> Result<()> {
        let image = (image_len, "image");
        let bootsect = (SECTOR_SIZE, "boot sector");
        let epa = &self.epa;

        let ranges = [
            (epa.advptroffset, 16, image, "ADV pointers"),
            (epa.diroffset, usize::from(epa.dirlen), image, "directory path"),
            (epa.subvoloffset, usize::from(epa.subvollen), image, "subvolume name"),
            (
                epa.secptroffset,
                usize::from(epa.secptrcnt) * EXTENT_SIZE,
                image,
                "extent table",
            ),
            (epa.sect1ptr0, 4, bootsect, "first sector pointer"),
            (epa.sect1ptr1, 4, bootsect, "first sector pointer (high)"),
            (epa.raidpatch, 2, bootsect, "RAID patch"),
        ];

        for (offset, len, (size, buffer), what) in ranges {
            let end = usize::from(offset) + len;
            if end > size {
                return Err(InstallError::PatchArea(format!(
                    "{} at {:#x}+{} is outside the {}",
                    what, offset, len, buffer
                )));
            }
        }

        Ok(())
    }

    pub fn field(&self, offset: usize) -> usize {
        self.patch_area + offset
    }

    /// Number of 4-byte words covered by the checksum
    pub fn dwords(&self, image: &[u8]) -> Result<u32> {
        get_u32(image, self.field(PA_DWORDS), "dwords")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_patch_area(epa: [u16; 10]) -> Vec<u8> {
        let mut image = vec![0u8; 2048];
        image[0x20..0x24].copy_from_slice(&LDLINUX_MAGIC.to_le_bytes());
        image[0x20 + PA_EPAOFFSET..0x20 + PA_EPAOFFSET + 2].copy_from_slice(&0x100u16.to_le_bytes());
        for (i, v) in epa.iter().enumerate() {
            image[0x100 + 2 * i..0x100 + 2 * i + 2].copy_from_slice(&v.to_le_bytes());
        }
        image
    }

    const GOOD: [u16; 10] = [0x200, 0x210, 64, 0x250, 32, 0x300, 20, 0x1F8, 0x1FC, 0x40];

    #[test]
    fn test_locate() {
        let image = image_with_patch_area(GOOD);
        let layout = PatchLayout::locate(&image).unwrap();
        assert_eq!(layout.patch_area, 0x20);
        assert_eq!(layout.epa.secptrcnt, 20);
        assert_eq!(layout.epa.raidpatch, 0x40);
    }

    #[test]
    fn test_missing_magic() {
        assert!(matches!(
            PatchLayout::locate(&[0u8; 1024]),
            Err(InstallError::PatchArea(_))
        ));
    }

    #[test]
    fn test_unaligned_magic_is_ignored() {
        let mut image = vec![0u8; 1024];
        image[0x21..0x25].copy_from_slice(&LDLINUX_MAGIC.to_le_bytes());
        assert!(PatchLayout::locate(&image).is_err());
    }

    #[test]
    fn test_extent_table_out_of_bounds() {
        let mut epa = GOOD;
        epa[6] = 200; // 2000 bytes of extents at 0x300
        let image = image_with_patch_area(epa);
        assert!(matches!(
            PatchLayout::locate(&image),
            Err(InstallError::PatchArea(_))
        ));
    }

    #[test]
    fn test_boot_sector_pointer_out_of_bounds() {
        let mut epa = GOOD;
        epa[7] = 0x1FE;
        let image = image_with_patch_area(epa);
        assert!(PatchLayout::locate(&image).is_err());
    }
}
