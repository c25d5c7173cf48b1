// ADV store selection per filesystem kind

use bootlink_persistent::adv::{ADV_BOOTONCE, ADV_MENUSAVE};
use bootlink_persistent::storage::file::FileStore;
use bootlink_persistent::storage::raw::RawStore;
use bootlink_persistent::{Adv, AdvStore};

use super::btrfs_adv_offset;
use crate::error::Result;
use crate::fs::attributes::BootFileProtection;
use crate::fs::{FilesystemContext, FsKind};

/// Requested ADV changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvEdits {
    /// Start from an empty ADV instead of the installed one
    pub reset: bool,
    /// Boot-once command; an empty string clears it
    pub once: Option<String>,
    pub menu_save: Option<String>,
}

impl AdvEdits {
    pub fn is_empty(&self) -> bool {
        !self.reset && self.once.is_none() && self.menu_save.is_none()
    }

    pub fn apply(&self, adv: &mut Adv) -> Result<()> {
        if let Some(once) = &self.once {
            adv.set(ADV_BOOTONCE, once.as_bytes())?;
        }
        if let Some(label) = &self.menu_save {
            adv.set(ADV_MENUSAVE, label.as_bytes())?;
        }
        Ok(())
    }
}

/// Run `f` against the store the ADV of `ctx` lives in
fn with_store<R>(
    ctx: &mut FilesystemContext,
    image_len: u64,
    f: impl FnOnce(&mut dyn AdvStore) -> bootlink_persistent::Result<R>,
) -> Result<R> {
    let result = match ctx.kind {
        FsKind::Btrfs => f(&mut RawStore::new(&mut ctx.device, btrfs_adv_offset(image_len))),
        FsKind::Ext2 | FsKind::Vfat => {
            let protection = BootFileProtection::new(ctx.kind);
            f(&mut FileStore::with_attributes(ctx.boot_file(), &protection))
        }
    };
    result.map_err(Into::into)
}

/// The installed ADV, or an empty one if `edits` asks for a reset
pub fn load_or_reset(ctx: &mut FilesystemContext, image_len: u64, edits: &AdvEdits) -> Result<Adv> {
    if edits.reset {
        log::debug!("resetting ADV");
        return Ok(Adv::new());
    }

    with_store(ctx, image_len, |store| {
        log::debug!("reading ADV from {}", store.name());
        store.load()
    })
}

pub fn save(ctx: &mut FilesystemContext, image_len: u64, adv: &Adv) -> Result<()> {
    with_store(ctx, image_len, |store| store.save(adv))
}
