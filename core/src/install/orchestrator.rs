//! Install and ADV-edit sequencing
//!
//! Install:
//!
//! ```text
//! resolve -> [update only: check installed] -> load/reset ADV -> edit ADV
//!   -> install image -> check device unchanged -> barrier
//!   -> write boot sector -> barrier
//! ```
//!
//! The first barrier makes sure the image is on disk before the boot sector
//! that references it; the second that the boot sector is on disk before
//! we report success. Any failure stops the sequence where it is.

use std::path::Path;

use gpt_disk_io::BlockIo;

use super::adv::{self as adv_store, AdvEdits};
use super::bootblock;
use crate::disk::GeometryOverrides;
use crate::error::{InstallError, Result};
use crate::fs::{DeviceResolver, FilesystemContext, Fibmap, SectorResolver};
use crate::image::BootAssets;

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Refuse to install unless a boot sector of ours is already there
    pub update_only: bool,
    pub geometry: GeometryOverrides,
    pub raid: bool,
    pub stupid: bool,
    pub adv: AdvEdits,
}

/// Install the boot loader into `path`
pub fn install_loader(path: &Path, assets: &mut BootAssets, options: &InstallOptions) -> Result<()> {
    let mut ctx = DeviceResolver::new().resolve(path)?;
    install_on(&mut ctx, assets, options, &Fibmap)
}

/// Install into an already resolved target
pub fn install_on(
    ctx: &mut FilesystemContext,
    assets: &mut BootAssets,
    options: &InstallOptions,
    resolver: &dyn SectorResolver,
) -> Result<()> {
    if options.update_only && !bootblock::already_installed(&mut ctx.device)? {
        return Err(InstallError::NotInstalled(ctx.device_path.clone()));
    }

    let image_len = assets.image().len() as u64;
    let mut adv = adv_store::load_or_reset(ctx, image_len, &options.adv)?;
    options.adv.apply(&mut adv)?;

    let dev = super::install_file(ctx, assets, &adv, options, resolver)?;
    if dev != ctx.mount_dev {
        return Err(InstallError::FilesystemChanged(ctx.mount.clone()));
    }

    barrier(ctx)?;
    bootblock::write_boot_sector(ctx.kind, &mut ctx.device, &ctx.device_path, assets.boot_sector())?;
    barrier(ctx)?;

    log::info!(
        "installed on {} ({}, device {})",
        ctx.mount.display(),
        ctx.kind,
        ctx.device_path.display()
    );
    Ok(())
}

/// Edit the ADV of an existing installation in `path`.
///
/// `image_len` locates the ADV on raw (btrfs) installs.
pub fn modify_existing_adv(path: &Path, image_len: u64, edits: &AdvEdits) -> Result<()> {
    let mut ctx = DeviceResolver::new().resolve(path)?;
    modify_adv_on(&mut ctx, image_len, edits)
}

pub fn modify_adv_on(ctx: &mut FilesystemContext, image_len: u64, edits: &AdvEdits) -> Result<()> {
    let mut adv = adv_store::load_or_reset(ctx, image_len, edits)?;
    edits.apply(&mut adv)?;
    adv_store::save(ctx, image_len, &adv)
}

/// Device data to stable storage, then everything else
fn barrier(ctx: &mut FilesystemContext) -> Result<()> {
    ctx.device
        .flush()
        .map_err(|e| InstallError::io(format!("flushing {}", ctx.device_path.display()), e))?;
    nix::unistd::sync();
    Ok(())
}
