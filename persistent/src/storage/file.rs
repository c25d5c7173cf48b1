//! ADV kept in the tail of the installed boot file

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileExt, MetadataExt, OpenOptionsExt};
use std::path::PathBuf;

use super::{AdvStore, FileAttributes, NoAttributes};
use crate::adv::{Adv, ADV_SIZE};
use crate::error::{AdvError, Result};

const ADV_BYTES: u64 = 2 * ADV_SIZE as u64;

static NO_ATTRIBUTES: NoAttributes = NoAttributes;

pub struct FileStore<'a> {
    path: PathBuf,
    attributes: &'a dyn FileAttributes,
}

impl FileStore<'static> {
    /// Store without any attribute handling
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            attributes: &NO_ATTRIBUTES,
        }
    }
}

impl<'a> FileStore<'a> {
    /// Store that lifts and restores file protection around writes
    pub fn with_attributes(path: impl Into<PathBuf>, attributes: &'a dyn FileAttributes) -> Self {
        Self {
            path: path.into(),
            attributes,
        }
    }

    fn context(&self, what: &str) -> String {
        format!("{}: {}", self.path.display(), what)
    }

    fn read_tail(&self, file: &File, size: u64) -> Result<[u8; 2 * ADV_SIZE]> {
        let mut buf = [0u8; 2 * ADV_SIZE];
        file.read_exact_at(&mut buf, size - ADV_BYTES)
            .map_err(|e| AdvError::io(self.context("reading ADV"), e))?;
        Ok(buf)
    }
}

impl AdvStore for FileStore<'_> {
    fn load(&mut self) -> Result<Adv> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("{} does not exist, starting with empty ADV", self.path.display());
                return Ok(Adv::new());
            }
            Err(e) => return Err(AdvError::io(self.context("open"), e)),
        };

        let size = file
            .metadata()
            .map_err(|e| AdvError::io(self.context("stat"), e))?
            .len();

        if size < ADV_BYTES {
            // Too small to be useful
            log::debug!("{} has no room for an ADV, starting empty", self.path.display());
            return Ok(Adv::new());
        }

        let tail = self.read_tail(&file, size)?;
        Adv::from_bytes(&tail)
    }

    fn save(&mut self, adv: &Adv) -> Result<()> {
        let name = self.path.display().to_string();

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AdvError::NotInstalled(name));
            }
            Err(e) => return Err(AdvError::io(self.context("open"), e)),
        };
        let st = file
            .metadata()
            .map_err(|e| AdvError::io(self.context("stat"), e))?;

        if st.len() < ADV_BYTES {
            return Err(AdvError::NotInstalled(name));
        }

        // Only overwrite something that already is an ADV
        let tail = self.read_tail(&file, st.len())?;
        Adv::from_bytes(&tail)?;

        self.attributes
            .clear(&file)
            .map_err(|e| AdvError::io(self.context("clearing attributes"), e))?;
        drop(file);

        // Need to re-open read-write
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(nix::libc::O_SYNC)
            .open(&self.path)
            .map_err(|e| AdvError::io(self.context("open"), e))?;
        let xst = file
            .metadata()
            .map_err(|e| AdvError::io(self.context("stat"), e))?;

        if xst.ino() != st.ino() || xst.dev() != st.dev() || xst.len() != st.len() {
            return Err(AdvError::RaceDetected(name));
        }

        file.write_all_at(adv.as_bytes(), st.len() - ADV_BYTES)
            .map_err(|e| AdvError::io(self.context("writing ADV"), e))?;
        nix::unistd::sync();

        self.attributes
            .set(&file)
            .map_err(|e| AdvError::io(self.context("setting attributes"), e))?;

        log::info!("ADV written to {}", name);
        Ok(())
    }

    fn name(&self) -> &str {
        "boot file"
    }
}
