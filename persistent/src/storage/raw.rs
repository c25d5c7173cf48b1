//! ADV kept at a fixed byte offset of a block device
//!
//! Used when the boot image lives in a reserved device area instead of a
//! file (btrfs keeps its first 64 KiB free of filesystem data).

use std::io;

use gpt_disk_io::BlockIo;

use super::AdvStore;
use crate::adv::{Adv, ADV_SIZE};
use crate::error::{AdvError, Result};
use crate::io::{read_bytes, write_bytes};

pub struct RawStore<'a, B> {
    io: &'a mut B,
    offset: u64,
}

impl<'a, B> RawStore<'a, B>
where
    B: BlockIo<Error = io::Error>,
{
    pub fn new(io: &'a mut B, offset: u64) -> Self {
        Self { io, offset }
    }
}

impl<B> AdvStore for RawStore<'_, B>
where
    B: BlockIo<Error = io::Error>,
{
    fn load(&mut self) -> Result<Adv> {
        let mut buf = [0u8; 2 * ADV_SIZE];
        read_bytes(&mut *self.io, self.offset, &mut buf)
            .map_err(|e| AdvError::io(format!("reading ADV at {:#x}", self.offset), e))?;

        if Adv::is_blank(&buf) {
            log::debug!("no ADV at {:#x}, starting empty", self.offset);
            return Ok(Adv::new());
        }

        Adv::from_bytes(&buf)
    }

    fn save(&mut self, adv: &Adv) -> Result<()> {
        write_bytes(&mut *self.io, self.offset, adv.as_bytes())
            .and_then(|_| self.io.flush())
            .map_err(|e| AdvError::io(format!("writing ADV at {:#x}", self.offset), e))?;

        log::info!("ADV written to device offset {:#x}", self.offset);
        Ok(())
    }

    fn name(&self) -> &str {
        "raw device area"
    }
}
