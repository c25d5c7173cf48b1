//! ADV storage backends
//!
//! Where the ADV lives depends on how the boot image was installed:
//! file-based installs keep it in the last two sectors of the boot file,
//! raw installs keep it at a fixed device offset right after the image.

pub mod file;
pub mod raw;

use std::fs::File;
use std::io;

use crate::adv::Adv;
use crate::error::Result;

/// Trait for ADV persistence backends
pub trait AdvStore {
    /// Read the current ADV. A location that was never written yields an
    /// empty ADV; a damaged one is an error.
    fn load(&mut self) -> Result<Adv>;

    /// Persist both copies
    fn save(&mut self, adv: &Adv) -> Result<()>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Filesystem-specific protection of the boot file.
///
/// The boot file is kept read-only (and immutable where the filesystem
/// supports it) so that nothing relocates its sectors behind our back.
/// Rewriting the ADV has to lift that protection for the duration of the
/// write.
pub trait FileAttributes {
    /// Make the file writable again
    fn clear(&self, file: &File) -> io::Result<()>;

    /// Restore read-only/immutable protection
    fn set(&self, file: &File) -> io::Result<()>;
}

/// No protection at all
pub struct NoAttributes;

impl FileAttributes for NoAttributes {
    fn clear(&self, _file: &File) -> io::Result<()> {
        Ok(())
    }

    fn set(&self, _file: &File) -> io::Result<()> {
        Ok(())
    }
}
