//! Boot sector installation
//!
//! Must run after the image has been installed: the stub in sector 0
//! points at the image's first sector.

use std::io;
use std::path::Path;

use bootlink_persistent::io::{read_bytes, write_bytes};
use gpt_disk_io::BlockIo;

use crate::disk::SECTOR_SIZE;
use crate::error::{InstallError, Result};
use crate::fs::FsKind;
use crate::image::bootsect;

pub const EXT2_SUPER_OFFSET: u64 = 1024;
const EXT2_MAGIC_OFFSET: u64 = 56;
const EXT2_MAGIC: u16 = 0xEF53;

pub const BTRFS_SUPER_INFO_OFFSET: u64 = 0x10000;
const BTRFS_MAGIC_OFFSET: u64 = 64;
pub const BTRFS_MAGIC: &[u8; 8] = b"_BHRfS_M";

fn read_sector0<B>(dev: &mut B) -> io::Result<[u8; SECTOR_SIZE]>
where
    B: BlockIo<Error = io::Error>,
{
    let mut bs = [0u8; SECTOR_SIZE];
    read_bytes(dev, 0, &mut bs)?;
    Ok(bs)
}

/// Whether the device carries the superblock `kind` expects
pub fn has_superblock<B>(kind: FsKind, dev: &mut B) -> io::Result<bool>
where
    B: BlockIo<Error = io::Error>,
{
    match kind {
        FsKind::Ext2 => {
            let mut magic = [0u8; 2];
            read_bytes(dev, EXT2_SUPER_OFFSET + EXT2_MAGIC_OFFSET, &mut magic)?;
            Ok(u16::from_le_bytes(magic) == EXT2_MAGIC)
        }
        FsKind::Btrfs => {
            let mut magic = [0u8; 8];
            read_bytes(dev, BTRFS_SUPER_INFO_OFFSET + BTRFS_MAGIC_OFFSET, &mut magic)?;
            Ok(&magic == BTRFS_MAGIC)
        }
        FsKind::Vfat => Ok(bootsect::is_fat(&read_sector0(dev)?)),
    }
}

/// Install the boot sector stub.
///
/// On vfat only the jump, OEM name and boot code are replaced, the on-disk
/// parameter block stays. Elsewhere the whole sector is written.
pub fn write_boot_sector<B>(kind: FsKind, dev: &mut B, name: &Path, stub: &[u8; SECTOR_SIZE]) -> Result<()>
where
    B: BlockIo<Error = io::Error>,
{
    let found = has_superblock(kind, dev).map_err(|e| InstallError::io("reading superblock", e))?;
    if !found {
        return Err(InstallError::NoSuperblock(name.to_path_buf()));
    }

    let sector = match kind {
        FsKind::Vfat => {
            let mut on_disk = read_sector0(dev).map_err(|e| InstallError::io("reading fat superblock", e))?;
            bootsect::merge_fat(&mut on_disk, stub)?;
            on_disk
        }
        FsKind::Ext2 | FsKind::Btrfs => *stub,
    };

    write_bytes(dev, 0, &sector).map_err(|e| InstallError::io("writing bootblock", e))?;
    log::info!("boot sector written to {}", name.display());
    Ok(())
}

/// An installed boot sector carries its signature in the OEM name field
pub fn already_installed<B>(dev: &mut B) -> Result<bool>
where
    B: BlockIo<Error = io::Error>,
{
    let mut bs = [0u8; SECTOR_SIZE];
    read_bytes(dev, 0, &mut bs).map_err(|e| InstallError::io("reading boot sector", e))?;
    Ok(bootsect::is_installed(&bs))
}
