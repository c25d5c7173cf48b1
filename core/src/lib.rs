//! Bootlink Core Library
//!
//! Installs a boot loader onto an ext2/3/4, btrfs or vfat filesystem:
//! finds the device behind a directory, writes the loader image where the
//! early boot code can find it, patches the image with its own sector map
//! and writes the boot sector that chains to it.
//!
//! # Architecture
//!
//! - [`disk`] - the target block device and its geometry
//! - [`fs`] - filesystem detection, device resolution, sector maps
//! - [`image`] - boot image patching
//! - [`install`] - per-filesystem installation and sequencing
//!
//! The ADV (persistent boot settings) lives in `bootlink-persistent`.

pub mod disk;
pub mod error;
pub mod fs;
pub mod image;
pub mod install;

pub use error::{ErrorClass, InstallError, Result};
pub use fs::{FilesystemContext, FsKind};
pub use image::BootAssets;
pub use install::{AdvEdits, InstallOptions};
