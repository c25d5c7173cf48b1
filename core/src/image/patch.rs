//! Image patching
//!
//! Fills the patch area with everything the loader needs to find the rest
//! of itself without a filesystem driver: the sector map, the ADV location,
//! the install directory and btrfs subvolume, then checksums the image.
//! The boot sector template gets the geometry and the first sector.

use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use super::bootsect;
use super::extent::{pack, EXTENT_SIZE};
use super::patch_area::{
    PatchLayout, LDLINUX_MAGIC, PA_ADV_SECTORS, PA_CHECKSUM, PA_DATA_SECTORS, PA_DWORDS,
    PA_MAXTRANSFER,
};
use super::{get_u32, put_bytes, put_u16, put_u32, put_u64, BootAssets, ADV_SECTORS};
use crate::disk::Geometry;
use crate::error::{InstallError, Result};

/// INT 18h, "boot failed, try the next device"
const RAID_PATCH: u16 = 0x18CD;

#[derive(Debug, Clone, Copy)]
pub struct PatchInput<'a> {
    pub geometry: Geometry,
    /// Size of the whole device
    pub total_bytes: u64,
    /// Physical sectors of image + ADV, see [`BootAssets::sector_count`]
    pub sectors: &'a [u64],
    /// Directory the boot file is installed in
    pub directory: &'a Path,
    /// btrfs subvolume, empty if none
    pub subvolume: &'a [u8],
    /// On boot failure fall through to the next BIOS device
    pub raid: bool,
    /// Transfer one sector at a time (buggy BIOSes)
    pub stupid: bool,
}

/// Patch `assets` for an install in `input.directory`.
///
/// Returns the number of leading image bytes that changed.
pub fn patch(assets: &mut BootAssets, input: &PatchInput<'_>) -> Result<usize> {
    let subpath = subpath(input.directory)?;
    log::debug!("subpath = {}", String::from_utf8_lossy(&subpath));
    patch_with_subpath(assets, input, &subpath)
}

/// Path of `directory` relative to the root of its filesystem, as raw
/// path bytes
pub fn subpath(directory: &Path) -> Result<Vec<u8>> {
    let st = fs::metadata(directory).map_err(|e| {
        InstallError::io(format!("accessing install directory {}", directory.display()), e)
    })?;
    let real = fs::canonicalize(directory).map_err(|e| {
        InstallError::io(format!("accessing install directory {}", directory.display()), e)
    })?;

    match fs::symlink_metadata(&real) {
        Ok(xst) if xst.ino() == st.ino() && xst.dev() == st.dev() => {}
        _ => return Err(InstallError::Internal("realpath returned nonsense".into())),
    }

    Ok(subpath_on_device(&real, st.dev(), |p| {
        fs::symlink_metadata(p).ok().map(|m| m.dev())
    }))
}

/// Walk up from `real` while ancestors stay on `dev`; the last one that
/// does is the filesystem root. Anything unstat-able counts as a boundary.
pub fn subpath_on_device(real: &Path, dev: u64, stat_dev: impl Fn(&Path) -> Option<u64>) -> Vec<u8> {
    let mut root: PathBuf = real.to_path_buf();

    for ancestor in real.ancestors().skip(1) {
        if stat_dev(ancestor) != Some(dev) {
            break;
        }
        root = ancestor.to_path_buf();
    }

    let rest = real.strip_prefix(&root).unwrap_or(Path::new("")).as_os_str().as_bytes();
    let mut subpath = Vec::with_capacity(rest.len() + 1);
    subpath.push(b'/');
    subpath.extend_from_slice(rest);
    subpath
}

/// Everything after the subpath has been worked out
pub fn patch_with_subpath(assets: &mut BootAssets, input: &PatchInput<'_>, subpath: &[u8]) -> Result<usize> {
    let layout = PatchLayout::locate(assets.image())?;
    let epa = layout.epa;

    let nsect = assets.sector_count();
    if input.sectors.len() != nsect {
        return Err(InstallError::Internal(format!(
            "sector map has {} entries, expected {}",
            input.sectors.len(),
            nsect
        )));
    }
    let data_sectors = u16::try_from(nsect - ADV_SECTORS).map_err(|_| InstallError::ImageTooLarge {
        size: assets.image().len() as u64,
        limit: u64::from(u16::MAX) * 512,
    })?;

    // The boot sector points at sector 0, the extents cover the rest of
    // the image, the ADV pointers the last two
    let first = input.sectors[0];
    let extents = pack(&input.sectors[1..nsect - ADV_SECTORS]);
    let adv = &input.sectors[nsect - ADV_SECTORS..];

    // Validate before touching anything
    let capacity = usize::from(epa.secptrcnt);
    if extents.len() > capacity {
        return Err(InstallError::ExtentOverflow {
            needed: extents.len(),
            capacity,
        });
    }
    let dirlen = usize::from(epa.dirlen);
    if subpath.len() + 1 > dirlen {
        return Err(InstallError::PathTooLong {
            len: subpath.len(),
            capacity: dirlen.saturating_sub(1),
        });
    }
    let subvollen = usize::from(epa.subvollen);
    if input.subvolume.len() + 1 > subvollen {
        return Err(InstallError::SubvolumeTooLong {
            len: input.subvolume.len(),
            capacity: subvollen.saturating_sub(1),
        });
    }
    let dwords = assets.image().len() / 4;
    let dwords32 = u32::try_from(dwords).map_err(|_| InstallError::ImageTooLarge {
        size: assets.image().len() as u64,
        limit: u64::from(u32::MAX),
    })?;

    // Boot sector template
    let bs = assets.boot_sector_mut();
    bootsect::set_geometry(bs, &input.geometry, input.total_bytes)?;
    put_u32(bs, usize::from(epa.sect1ptr0), first as u32, "sect1ptr0")?;
    put_u32(bs, usize::from(epa.sect1ptr1), (first >> 32) as u32, "sect1ptr1")?;
    if input.raid {
        put_u16(bs, usize::from(epa.raidpatch), RAID_PATCH, "raidpatch")?;
    }

    // Patch area
    let image = assets.image_mut();
    put_u16(image, layout.field(PA_DATA_SECTORS), data_sectors, "data_sectors")?;
    put_u16(image, layout.field(PA_ADV_SECTORS), ADV_SECTORS as u16, "adv_sectors")?;
    put_u32(image, layout.field(PA_DWORDS), dwords32, "dwords")?;
    if input.stupid {
        put_u16(image, layout.field(PA_MAXTRANSFER), 1, "maxtransfer")?;
    }

    let table = usize::from(epa.secptroffset);
    image[table..table + capacity * EXTENT_SIZE].fill(0);
    for (i, ext) in extents.iter().enumerate() {
        put_bytes(image, table + i * EXTENT_SIZE, &ext.to_bytes(), "extent")?;
    }
    log::debug!("{} extents (room for {})", extents.len(), capacity);

    let advptr = usize::from(epa.advptroffset);
    put_u64(image, advptr, adv[0], "ADV pointer")?;
    put_u64(image, advptr + 8, adv[1], "ADV pointer")?;

    put_c_string(image, usize::from(epa.diroffset), subpath, "directory path")?;
    put_c_string(image, usize::from(epa.subvoloffset), input.subvolume, "subvolume name")?;

    // Negative checksum: all covered words sum to the magic
    put_u32(image, layout.field(PA_CHECKSUM), 0, "checksum")?;
    let csum = word_sum(image, dwords)?;
    put_u32(image, layout.field(PA_CHECKSUM), LDLINUX_MAGIC.wrapping_sub(csum), "checksum")?;

    Ok(dwords * 4)
}

fn put_c_string(buf: &mut [u8], offset: usize, s: &[u8], what: &str) -> Result<()> {
    put_bytes(buf, offset, s, what)?;
    put_bytes(buf, offset + s.len(), &[0], what)
}

fn word_sum(image: &[u8], dwords: usize) -> Result<u32> {
    (0..dwords).try_fold(0u32, |acc, i| Ok(acc.wrapping_add(get_u32(image, i * 4, "checksum word")?)))
}

/// True when the image checksum is consistent
pub fn verify_checksum(image: &[u8]) -> Result<bool> {
    let layout = PatchLayout::locate(image)?;
    let dwords = layout.dwords(image)? as usize;
    Ok(word_sum(image, dwords)? == LDLINUX_MAGIC)
}
