// Filesystem identification and per-filesystem helpers

pub mod attributes;
pub mod mount_table;
pub mod resolve;
pub mod sectmap;

use std::fmt;
use std::path::Path;

use nix::sys::statfs::statfs;

use crate::error::{InstallError, Result};

pub use resolve::{DeviceResolver, FilesystemContext};
pub use sectmap::{Fibmap, SectorResolver};

/// `statfs` magic numbers
pub const EXT2_SUPER_MAGIC: u32 = 0xEF53;
pub const BTRFS_SUPER_MAGIC: u32 = 0x9123_683E;
pub const MSDOS_SUPER_MAGIC: u32 = 0x4D44;

/// Filesystems a boot image can be installed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    /// ext2, ext3 and ext4 all report the ext2 magic
    Ext2,
    Btrfs,
    Vfat,
}

impl FsKind {
    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            EXT2_SUPER_MAGIC => Some(Self::Ext2),
            BTRFS_SUPER_MAGIC => Some(Self::Btrfs),
            MSDOS_SUPER_MAGIC => Some(Self::Vfat),
            _ => None,
        }
    }

    /// Classify the filesystem `path` lives on
    pub fn detect(path: &Path) -> Result<Option<Self>> {
        let st = statfs(path).map_err(|e| {
            InstallError::io(format!("statfs {}", path.display()), e.into())
        })?;

        // f_type is a signed word on some targets, the magics are 32 bit
        Ok(Self::from_magic(st.filesystem_type().0 as u32))
    }

    /// Mount table type strings belonging to this kind
    pub fn mount_types(self) -> &'static [&'static str] {
        match self {
            Self::Ext2 => &["ext2", "ext3", "ext4"],
            Self::Btrfs => &["btrfs"],
            Self::Vfat => &["vfat"],
        }
    }

    /// The boot image lives in a reserved device area, not in a file
    pub fn is_raw(self) -> bool {
        matches!(self, Self::Btrfs)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ext2 => "ext2",
            Self::Btrfs => "btrfs",
            Self::Vfat => "vfat",
        }
    }
}

impl fmt::Display for FsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
