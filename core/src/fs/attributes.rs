//! Boot file protection
//!
//! Once installed, the boot file must not move: its sectors are baked into
//! the patch area. It is made read-only, immutable on ext2 when owned by
//! root, and read-only/hidden/system on FAT. The flag ioctls are best
//! effort; the mode change is not.

use std::fs::{File, Permissions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::{MetadataExt, PermissionsExt};

use bootlink_persistent::storage::FileAttributes;
use nix::libc::c_long;

use super::FsKind;
use crate::disk::ioctl;

const S_IWUSR: u32 = 0o200;
const READ_ONLY_MASK: u32 = 0o444;

/// Protection for the boot file on one filesystem kind
#[derive(Debug, Clone, Copy)]
pub struct BootFileProtection {
    kind: FsKind,
}

impl BootFileProtection {
    pub fn new(kind: FsKind) -> Self {
        Self { kind }
    }

    fn update_ext2_flags(file: &File, immutable: bool) {
        let fd = file.as_raw_fd();
        let mut flags: c_long = 0;

        // SAFETY: fd is open, flags outlives both calls
        let result = unsafe { ioctl::fs_ioc_getflags(fd, &mut flags) }.and_then(|_| {
            if immutable {
                flags |= ioctl::FS_IMMUTABLE_FL;
            } else {
                flags &= !ioctl::FS_IMMUTABLE_FL;
            }
            unsafe { ioctl::fs_ioc_setflags(fd, &flags) }
        });

        if let Err(e) = result {
            log::warn!("cannot update inode flags: {}", e);
        }
    }

    fn set_fat_attributes(file: &File, attr: u32) {
        // SAFETY: fd is open, attr outlives the call
        if let Err(e) = unsafe { ioctl::fat_ioctl_set_attributes(file.as_raw_fd(), &attr) } {
            log::warn!("cannot update FAT attributes: {}", e);
        }
    }
}

impl FileAttributes for BootFileProtection {
    fn clear(&self, file: &File) -> io::Result<()> {
        let st = file.metadata()?;

        match self.kind {
            FsKind::Ext2 => Self::update_ext2_flags(file, false),
            FsKind::Vfat => Self::set_fat_attributes(file, 0),
            FsKind::Btrfs => {}
        }

        file.set_permissions(Permissions::from_mode(st.mode() | S_IWUSR))
    }

    fn set(&self, file: &File) -> io::Result<()> {
        let st = file.metadata()?;
        file.set_permissions(Permissions::from_mode(st.mode() & READ_ONLY_MASK))?;

        match self.kind {
            // Only root can undo it, so don't lock out the owner otherwise
            FsKind::Ext2 if st.uid() == 0 => Self::update_ext2_flags(file, true),
            FsKind::Ext2 => {}
            FsKind::Vfat => {
                Self::set_fat_attributes(file, ioctl::ATTR_RO | ioctl::ATTR_HIDDEN | ioctl::ATTR_SYS)
            }
            FsKind::Btrfs => {}
        }

        Ok(())
    }
}
