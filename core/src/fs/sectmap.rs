//! Physical sector map of the boot file

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;

use nix::libc::c_int;

use crate::disk::{ioctl, SECTOR_SIZE};
use crate::error::{InstallError, Result};

/// Produces the device sectors backing the first `count` sectors of a file
pub trait SectorResolver {
    fn sectors(&self, file: &File, count: usize) -> Result<Vec<u64>>;
}

/// FIBMAP based resolver. Needs CAP_SYS_RAWIO.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fibmap;

impl Fibmap {
    fn block_size(fd: c_int) -> Result<u64> {
        let mut bsz: c_int = 0;
        // SAFETY: fd is open, bsz outlives the call
        unsafe { ioctl::figetbsz(fd, &mut bsz) }
            .map_err(|e| InstallError::io("FIGETBSZ", e.into()))?;

        match u64::try_from(bsz) {
            Ok(bsz) if bsz >= SECTOR_SIZE as u64 && bsz % SECTOR_SIZE as u64 == 0 => Ok(bsz),
            _ => Err(InstallError::io(
                "FIGETBSZ",
                io::Error::new(io::ErrorKind::InvalidData, format!("bad block size {}", bsz)),
            )),
        }
    }
}

impl SectorResolver for Fibmap {
    fn sectors(&self, file: &File, count: usize) -> Result<Vec<u64>> {
        let fd = file.as_raw_fd();
        let per_block = Self::block_size(fd)? / SECTOR_SIZE as u64;

        let mut sectors = Vec::with_capacity(count);
        let mut block: c_int = 0;

        while sectors.len() < count {
            let mut blk = block;
            // SAFETY: fd is open, blk outlives the call
            unsafe { ioctl::fibmap(fd, &mut blk) }
                .map_err(|e| InstallError::io(format!("FIBMAP block {}", block), e.into()))?;

            // 0 means a hole
            let base = match u64::try_from(blk) {
                Ok(blk) if blk != 0 => blk * per_block,
                _ => {
                    return Err(InstallError::io(
                        format!("FIBMAP block {}", block),
                        io::Error::new(io::ErrorKind::InvalidData, format!("unmapped ({})", blk)),
                    ))
                }
            };

            for i in 0..per_block {
                if sectors.len() == count {
                    break;
                }
                sectors.push(base + i);
            }
            block += 1;
        }

        Ok(sectors)
    }
}

/// Sectors of an image kept at a fixed byte offset of the device
pub fn raw_sectors(offset: u64, count: usize) -> Vec<u64> {
    let first = offset / SECTOR_SIZE as u64;
    (0..count as u64).map(|i| first + i).collect()
}
