//! Error types for installation

use std::io;
use std::path::PathBuf;

use bootlink_persistent::AdvError;

/// Result type for install operations
pub type Result<T> = core::result::Result<T, InstallError>;

/// Coarse classification used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Environment or build mismatch; retrying will not help
    Configuration,
    /// A system call failed
    Io,
    /// Something changed underneath us or is not what it claims to be
    Consistency,
    /// Should never happen
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("{}: not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("{}: not an ext2/ext3/ext4, btrfs or vfat filesystem", .0.display())]
    UnsupportedFilesystem(PathBuf),

    #[error("invalid boot assets: {0}")]
    InvalidAssets(String),

    #[error("invalid patch area: {0}")]
    PatchArea(String),

    #[error("subdirectory path too long ({len} bytes, room for {capacity})")]
    PathTooLong { len: usize, capacity: usize },

    #[error("subvolume name too long ({len} bytes, room for {capacity})")]
    SubvolumeTooLong { len: usize, capacity: usize },

    #[error("boot file too fragmented: {needed} extents, room for {capacity}")]
    ExtentOverflow { needed: usize, capacity: usize },

    #[error("boot image too large for the reserved area ({size} bytes, limit {limit})")]
    ImageTooLarge { size: u64, limit: u64 },

    #[error(transparent)]
    Adv(#[from] AdvError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{}: cannot find the backing device", .0.display())]
    DeviceNotFound(PathBuf),

    #[error("{}: path doesn't match device {}", .path.display(), .device.display())]
    PathDeviceMismatch { path: PathBuf, device: PathBuf },

    #[error("{}: no recognizable superblock found", .0.display())]
    NoSuperblock(PathBuf),

    #[error("{}: no previous bootlink boot sector found", .0.display())]
    NotInstalled(PathBuf),

    #[error("{}: filesystem changed under us", .0.display())]
    FilesystemChanged(PathBuf),

    #[error("internal error: {0}")]
    Internal(String),
}

impl InstallError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotADirectory(_)
            | Self::UnsupportedFilesystem(_)
            | Self::InvalidAssets(_)
            | Self::PatchArea(_)
            | Self::PathTooLong { .. }
            | Self::SubvolumeTooLong { .. }
            | Self::ExtentOverflow { .. }
            | Self::ImageTooLarge { .. } => ErrorClass::Configuration,

            Self::Adv(e) => match e {
                AdvError::Io { .. } => ErrorClass::Io,
                AdvError::NotInstalled(_) | AdvError::RaceDetected(_) => ErrorClass::Consistency,
                _ => ErrorClass::Configuration,
            },

            Self::Io { .. } => ErrorClass::Io,

            Self::DeviceNotFound(_)
            | Self::PathDeviceMismatch { .. }
            | Self::NoSuperblock(_)
            | Self::NotInstalled(_)
            | Self::FilesystemChanged(_) => ErrorClass::Consistency,

            Self::Internal(_) => ErrorClass::Internal,
        }
    }
}
