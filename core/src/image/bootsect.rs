// FAT-shaped boot sector template
//
// Every kind gets a FAT BIOS parameter block because the early boot code is
// shared with the FAT bootstrap. Only the fields below are touched.

use super::{get_u16, put_bytes, put_u16, put_u32};
use crate::disk::{Geometry, SECTOR_SIZE, SECTOR_SHIFT};
use crate::error::Result;

pub const OEM_NAME: usize = 3;
pub const BYTES_PER_SEC: usize = 11;
pub const RES_SECTORS: usize = 14;
pub const FATS: usize = 16;
pub const SECTORS: usize = 19;
pub const SEC_PER_TRACK: usize = 24;
pub const HEADS: usize = 26;
pub const HIDDEN_SECS: usize = 28;
pub const HUGE_SECTORS: usize = 32;
pub const FAT16_FS_TYPE: usize = 54;
pub const FAT32_FS_TYPE: usize = 82;
pub const CODE: usize = 90;
pub const SIGNATURE: usize = 510;

/// Jump + OEM name
pub const HEAD_LEN: usize = BYTES_PER_SEC;
pub const CODE_LEN: usize = SIGNATURE - CODE;

/// Marker left at [`OEM_NAME`] by an installed boot sector
pub const INSTALLED_SIGNATURE: &[u8; 8] = b"EXTLINUX";

/// Write the device geometry into the parameter block
pub fn set_geometry(bs: &mut [u8; SECTOR_SIZE], geo: &Geometry, total_bytes: u64) -> Result<()> {
    let total_sectors = total_bytes >> SECTOR_SHIFT;

    put_u16(bs, SECTORS, u16::try_from(total_sectors).unwrap_or(0), "total sectors")?;
    put_u32(bs, HUGE_SECTORS, total_sectors as u32, "total sectors")?;
    put_u16(bs, BYTES_PER_SEC, SECTOR_SIZE as u16, "bytes per sector")?;
    put_u16(bs, SEC_PER_TRACK, geo.sectors as u16, "sectors per track")?;
    put_u16(bs, HEADS, geo.heads as u16, "heads")?;
    put_u32(bs, HIDDEN_SECS, geo.start as u32, "hidden sectors")
}

/// Whether `bs` carries a plausible FAT parameter block
pub fn is_fat(bs: &[u8; SECTOR_SIZE]) -> bool {
    let fs_type_has_fat = |at: usize| bs[at..at + 8].windows(3).any(|w| w == b"FAT");

    get_u16(bs, RES_SECTORS, "reserved sectors").is_ok_and(|n| n != 0)
        && bs[FATS] != 0
        && (fs_type_has_fat(FAT16_FS_TYPE) || fs_type_has_fat(FAT32_FS_TYPE))
}

/// Whether the OEM name field carries our signature
pub fn is_installed(bs: &[u8]) -> bool {
    bs.get(OEM_NAME..OEM_NAME + INSTALLED_SIGNATURE.len()) == Some(&INSTALLED_SIGNATURE[..])
}

/// Copy only the parts of `stub` that don't belong to the parameter block
pub fn merge_fat(on_disk: &mut [u8; SECTOR_SIZE], stub: &[u8; SECTOR_SIZE]) -> Result<()> {
    put_bytes(on_disk, 0, &stub[..HEAD_LEN], "boot sector head")?;
    put_bytes(on_disk, CODE, &stub[CODE..CODE + CODE_LEN], "boot code")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{get_u16, get_u32};

    #[test]
    fn test_set_geometry_small_device() {
        let mut bs = [0u8; SECTOR_SIZE];
        let geo = Geometry {
            heads: 2,
            sectors: 18,
            cylinders: 80,
            start: 0,
        };
        set_geometry(&mut bs, &geo, 1_474_560).unwrap();

        assert_eq!(get_u16(&bs, SECTORS, "").unwrap(), 2880);
        assert_eq!(get_u32(&bs, HUGE_SECTORS, "").unwrap(), 2880);
        assert_eq!(get_u16(&bs, BYTES_PER_SEC, "").unwrap(), 512);
        assert_eq!(get_u16(&bs, SEC_PER_TRACK, "").unwrap(), 18);
        assert_eq!(get_u16(&bs, HEADS, "").unwrap(), 2);
    }

    #[test]
    fn test_set_geometry_large_device() {
        let mut bs = [0u8; SECTOR_SIZE];
        let geo = Geometry {
            heads: 255,
            sectors: 63,
            cylinders: 1024,
            start: 2048,
        };
        set_geometry(&mut bs, &geo, 65536 * 512).unwrap();

        assert_eq!(get_u16(&bs, SECTORS, "").unwrap(), 0);
        assert_eq!(get_u32(&bs, HUGE_SECTORS, "").unwrap(), 65536);
        assert_eq!(get_u32(&bs, HIDDEN_SECS, "").unwrap(), 2048);
    }

    #[test]
    fn test_is_fat() {
        let mut bs = [0u8; SECTOR_SIZE];
        assert!(!is_fat(&bs));

        bs[RES_SECTORS] = 32;
        bs[FATS] = 2;
        bs[FAT32_FS_TYPE..FAT32_FS_TYPE + 8].copy_from_slice(b"FAT32   ");
        assert!(is_fat(&bs));

        bs[FATS] = 0;
        assert!(!is_fat(&bs));
    }

    #[test]
    fn test_merge_fat_keeps_bpb() {
        let mut on_disk = [0x11u8; SECTOR_SIZE];
        let stub = [0x22u8; SECTOR_SIZE];
        merge_fat(&mut on_disk, &stub).unwrap();

        assert!(on_disk[..HEAD_LEN].iter().all(|&b| b == 0x22));
        assert!(on_disk[HEAD_LEN..CODE].iter().all(|&b| b == 0x11));
        assert!(on_disk[CODE..SIGNATURE].iter().all(|&b| b == 0x22));
        assert!(on_disk[SIGNATURE..].iter().all(|&b| b == 0x11));
    }

    #[test]
    fn test_is_installed() {
        let mut bs = [0u8; SECTOR_SIZE];
        assert!(!is_installed(&bs));
        bs[3..11].copy_from_slice(b"EXTLINUX");
        assert!(is_installed(&bs));
    }
}
