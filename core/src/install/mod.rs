//! Writing the boot loader to the target
//!
//! ext2 and vfat get a regular boot file in the install directory, mapped
//! to device sectors after it has been written. btrfs relocates file data
//! at will, so there the image goes into the unused area in front of the
//! first superblock instead.

pub mod adv;
pub mod bootblock;
pub mod orchestrator;

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileExt, MetadataExt, OpenOptionsExt};

use bootlink_persistent::io::write_bytes;
use bootlink_persistent::storage::FileAttributes;
use bootlink_persistent::Adv;

use crate::disk::geometry;
use crate::error::{InstallError, Result};
use crate::fs::attributes::BootFileProtection;
use crate::fs::sectmap::raw_sectors;
use crate::fs::{FilesystemContext, SectorResolver};
use crate::image::{patch, BootAssets, PatchInput};

pub use adv::AdvEdits;
pub use orchestrator::{install_loader, install_on, modify_adv_on, modify_existing_adv, InstallOptions};

/// Byte offset of the image inside the btrfs reserved area
pub const BTRFS_IMAGE_OFFSET: u64 = 2 * 1024;

/// The btrfs primary superblock; nothing of ours may reach it
pub const BTRFS_RESERVED_END: u64 = 64 * 1024;

/// Where the ADV follows a raw btrfs image of `image_len` bytes
pub fn btrfs_adv_offset(image_len: u64) -> u64 {
    BTRFS_IMAGE_OFFSET + image_len
}

/// Write image and ADV, patched for their final location.
///
/// Returns the device id the result ended up on, for the caller to check
/// against the one seen at resolution time.
pub fn install_file(
    ctx: &mut FilesystemContext,
    assets: &mut BootAssets,
    adv: &Adv,
    options: &InstallOptions,
    resolver: &dyn SectorResolver,
) -> Result<u64> {
    if ctx.kind.is_raw() {
        install_raw(ctx, assets, adv, options)
    } else {
        install_boot_file(ctx, assets, adv, options, resolver)
    }
}

fn patch_for(
    ctx: &FilesystemContext,
    assets: &mut BootAssets,
    options: &InstallOptions,
    sectors: &[u64],
) -> Result<usize> {
    let total_bytes = ctx.device.size_bytes();
    let probed = geometry::probe(ctx.device.file(), total_bytes, options.geometry);

    patch(
        assets,
        &PatchInput {
            geometry: probed.geometry,
            total_bytes,
            sectors,
            directory: &ctx.mount,
            subvolume: ctx.subvolume_name(),
            raid: options.raid,
            stupid: options.stupid,
        },
    )
}

fn install_boot_file(
    ctx: &mut FilesystemContext,
    assets: &mut BootAssets,
    adv: &Adv,
    options: &InstallOptions,
    resolver: &dyn SectorResolver,
) -> Result<u64> {
    let path = ctx.boot_file();
    let name = path.display().to_string();
    let err = |what: &str| {
        let context = format!("{}: {}", name, what);
        move |e: io::Error| InstallError::io(context, e)
    };
    let protection = BootFileProtection::new(ctx.kind);

    match File::open(&path) {
        Ok(old) => protection.clear(&old).map_err(err("clearing attributes"))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(err("open")(e)),
    }

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o444)
        .custom_flags(nix::libc::O_SYNC)
        .open(&path)
        .map_err(err("create"))?;

    let image_len = assets.image().len() as u64;
    file.write_all_at(assets.image(), 0).map_err(err("write failure"))?;
    file.write_all_at(adv.as_bytes(), image_len).map_err(err("write failure"))?;

    let sectors = resolver.sectors(&file, assets.sector_count())?;
    let modified = patch_for(ctx, assets, options, &sectors)?;

    // Rewrite in place; the sectors must stay where they were mapped
    file.write_all_at(&assets.image()[..modified], 0).map_err(err("write failure"))?;
    log::debug!("patched {} bytes of {}", modified, name);

    protection.set(&file).map_err(err("setting attributes"))?;

    let st = file.metadata().map_err(err("stat"))?;
    log::info!("installed {}", name);
    Ok(st.dev())
}

fn install_raw(
    ctx: &mut FilesystemContext,
    assets: &mut BootAssets,
    adv: &Adv,
    options: &InstallOptions,
) -> Result<u64> {
    let image_len = assets.image().len() as u64;
    let adv_offset = btrfs_adv_offset(image_len);
    let end = adv_offset + adv.as_bytes().len() as u64;

    if end > BTRFS_RESERVED_END {
        return Err(InstallError::ImageTooLarge {
            size: end - BTRFS_IMAGE_OFFSET,
            limit: BTRFS_RESERVED_END - BTRFS_IMAGE_OFFSET,
        });
    }

    let sectors = raw_sectors(BTRFS_IMAGE_OFFSET, assets.sector_count());
    patch_for(ctx, assets, options, &sectors)?;

    write_bytes(&mut ctx.device, BTRFS_IMAGE_OFFSET, assets.image())
        .map_err(|e| InstallError::io("writing boot image", e))?;
    log::info!("boot image written to {:#x}", BTRFS_IMAGE_OFFSET);

    write_bytes(&mut ctx.device, adv_offset, adv.as_bytes())
        .map_err(|e| InstallError::io("writing ADV", e))?;
    log::info!("ADV written to {:#x}", adv_offset);

    let st = fs::metadata(&ctx.mount)
        .map_err(|e| InstallError::io(format!("stat {}", ctx.mount.display()), e))?;
    Ok(st.dev())
}
