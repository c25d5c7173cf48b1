//! Byte-granular access on top of `BlockIo`
//!
//! `BlockIo` only moves whole blocks. Boot structures live at arbitrary byte
//! offsets (the ext2 superblock at 1024, FAT code at 90, the ADV right after
//! the boot image), so reads widen to the covering blocks and writes do a
//! read-modify-write of the partial blocks at either end.

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

/// First block and block count covering `[offset, offset + len)`
fn covering_blocks(offset: u64, len: usize, block_size: u64) -> (u64, u64) {
    let first = offset / block_size;
    let last = (offset + len as u64).div_ceil(block_size);
    (first, last - first)
}

/// Read `dst.len()` bytes starting at byte `offset`
pub fn read_bytes<B: BlockIo>(io: &mut B, offset: u64, dst: &mut [u8]) -> Result<(), B::Error> {
    if dst.is_empty() {
        return Ok(());
    }

    let bs = u64::from(io.block_size().to_u32());
    let (first, count) = covering_blocks(offset, dst.len(), bs);

    let mut window = vec![0u8; (count * bs) as usize];
    io.read_blocks(Lba(first), &mut window)?;

    let skip = (offset - first * bs) as usize;
    dst.copy_from_slice(&window[skip..skip + dst.len()]);
    Ok(())
}

/// Write `src` starting at byte `offset`, preserving surrounding bytes
pub fn write_bytes<B: BlockIo>(io: &mut B, offset: u64, src: &[u8]) -> Result<(), B::Error> {
    if src.is_empty() {
        return Ok(());
    }

    let bs = u64::from(io.block_size().to_u32());
    let (first, count) = covering_blocks(offset, src.len(), bs);
    let skip = (offset - first * bs) as usize;

    let mut window = vec![0u8; (count * bs) as usize];

    // Only pull the old contents when a block is partially covered
    let aligned = skip == 0 && src.len() as u64 % bs == 0;
    if !aligned {
        io.read_blocks(Lba(first), &mut window)?;
    }

    window[skip..skip + src.len()].copy_from_slice(src);
    io.write_blocks(Lba(first), &window)
}
