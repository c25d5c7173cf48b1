//! Boot sector writer tests

mod common;

use std::path::Path;

use bootlink_core::install::bootblock::{already_installed, has_superblock, write_boot_sector};
use bootlink_core::{FsKind, InstallError};
use common::*;

const DEV: &str = "/dev/test0";

fn ext2_device() -> MemoryBlockDevice {
    let mut dev = MemoryBlockDevice::zeroed(8192);
    dev.data[1024 + 56..1024 + 58].copy_from_slice(&0xEF53u16.to_le_bytes());
    dev
}

fn btrfs_device() -> MemoryBlockDevice {
    let mut dev = MemoryBlockDevice::zeroed(0x10000 + 4096);
    dev.data[0x10040..0x10048].copy_from_slice(b"_BHRfS_M");
    dev
}

fn vfat_device() -> MemoryBlockDevice {
    let mut dev = MemoryBlockDevice::zeroed(8192);
    dev.data[..512].copy_from_slice(&fat32_boot_sector());
    dev
}

#[test]
fn test_superblock_detection() {
    assert!(has_superblock(FsKind::Ext2, &mut ext2_device()).unwrap());
    assert!(has_superblock(FsKind::Btrfs, &mut btrfs_device()).unwrap());
    assert!(has_superblock(FsKind::Vfat, &mut vfat_device()).unwrap());

    assert!(!has_superblock(FsKind::Btrfs, &mut ext2_device()).unwrap());
    assert!(!has_superblock(FsKind::Ext2, &mut vfat_device()).unwrap());
    assert!(!has_superblock(FsKind::Vfat, &mut MemoryBlockDevice::zeroed(8192)).unwrap());
}

#[test]
fn test_short_device_is_io_error() {
    let mut dev = MemoryBlockDevice::zeroed(4096);
    assert!(has_superblock(FsKind::Btrfs, &mut dev).is_err());
    assert!(matches!(
        write_boot_sector(FsKind::Btrfs, &mut dev, Path::new(DEV), &boot_sector_stub()),
        Err(InstallError::Io { .. })
    ));
}

#[test]
fn test_ext2_gets_whole_sector() {
    let mut dev = ext2_device();
    let stub = boot_sector_stub();
    write_boot_sector(FsKind::Ext2, &mut dev, Path::new(DEV), &stub).unwrap();

    assert_eq!(&dev.data[..512], &stub[..]);
    // Superblock untouched
    assert_eq!(u16_at(&dev.data, 1024 + 56), 0xEF53);
    assert!(already_installed(&mut dev).unwrap());
}

#[test]
fn test_btrfs_gets_whole_sector() {
    let mut dev = btrfs_device();
    let stub = boot_sector_stub();
    write_boot_sector(FsKind::Btrfs, &mut dev, Path::new(DEV), &stub).unwrap();
    assert_eq!(&dev.data[..512], &stub[..]);
}

#[test]
fn test_vfat_keeps_parameter_block() {
    let mut dev = vfat_device();
    let original = fat32_boot_sector();
    let stub = boot_sector_stub();

    write_boot_sector(FsKind::Vfat, &mut dev, Path::new(DEV), &stub).unwrap();

    let bs = &dev.data[..512];
    assert_eq!(&bs[..11], &stub[..11]);
    assert_eq!(&bs[11..90], &original[11..90]);
    assert_eq!(&bs[90..510], &stub[90..510]);
    assert_eq!(&bs[510..], &original[510..]);
    assert!(already_installed(&mut dev).unwrap());
}

#[test]
fn test_missing_superblock_writes_nothing() {
    let mut dev = MemoryBlockDevice::zeroed(8192);
    let err = write_boot_sector(FsKind::Ext2, &mut dev, Path::new(DEV), &boot_sector_stub()).unwrap_err();

    assert!(matches!(err, InstallError::NoSuperblock(_)));
    assert!(dev.data.iter().all(|&b| b == 0));
}

#[test]
fn test_not_installed() {
    assert!(!already_installed(&mut vfat_device()).unwrap());
    assert!(!already_installed(&mut MemoryBlockDevice::zeroed(512)).unwrap());
}
