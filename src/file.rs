//! Byte-range operations on a file's blocks.
//! Logical block 0 is the inode's direct block, logical block `n >= 1` is slot `n - 1` of the
//! inode's chain block.

use crate::bitmap::Allocator;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::inode::{BlockMap, Chain};
use crate::{BlockDevice, Inode};

fn split(pos: u64) -> (usize, usize) {
    ((pos / BLOCK_SIZE as u64) as usize, (pos % BLOCK_SIZE as u64) as usize)
}

/// Reads up to `len` bytes starting at `offset`. Stops at end of file, so the result may be short
/// or empty but is never an error for reaching it.
pub fn fread<D: BlockDevice>(device: &D, inode: &Inode, offset: u64, len: usize) -> Result<Vec<u8>> {
    let avail = (inode.size as u64).saturating_sub(offset);
    let total = (len as u64).min(avail) as usize;

    let mut out = Vec::with_capacity(total);
    let mut map = BlockMap::new(device);
    let mut block_buf = vec![0u8; BLOCK_SIZE];
    let mut pos = offset;

    while out.len() < total {
        let (logical, inner) = split(pos);
        let chunk = (BLOCK_SIZE - inner).min(total - out.len());
        let block_id = map.lookup(inode, logical)?;
        device.read_block(block_id as usize, &mut block_buf)?;
        out.extend_from_slice(&block_buf[inner..inner + chunk]);
        pos += chunk as u64;
    }

    Ok(out)
}

/// Writes `data` at `*cursor`, growing the file as needed, and advances `*cursor` past every byte
/// that reached the device.
///
/// On failure the bytes written before the failing block stay in place: `inode.size` and `*cursor`
/// still cover them. Either way `inode` holds the new block pointers and size, and the caller is
/// expected to persist it.
pub fn fwrite<D: BlockDevice>(
    device: &D,
    allocator: &mut Allocator,
    inode: &mut Inode,
    cursor: &mut u64,
    data: &[u8],
) -> Result<usize> {
    let start = *cursor;
    if start + data.len() as u64 > MAX_FILE_SIZE {
        return Err(FsError::FileTooLarge);
    }

    let mut map = BlockMap::new(device);
    let result = write_blocks(device, &mut map, allocator, inode, cursor, data);

    if *cursor > inode.size as u64 {
        inode.size = *cursor as u32;
    }
    map.sync(inode)?;

    let written = (*cursor - start) as usize;
    if let Err(ref err) = result {
        log::warn!("write stopped after {} of {} bytes: {}", written, data.len(), err);
    }
    result.map(|()| written)
}

fn write_blocks<D: BlockDevice>(
    device: &D,
    map: &mut BlockMap<'_, D>,
    allocator: &mut Allocator,
    inode: &mut Inode,
    cursor: &mut u64,
    data: &[u8],
) -> Result<()> {
    let mut block_buf = vec![0u8; BLOCK_SIZE];
    let mut done = 0;

    while done < data.len() {
        let (logical, inner) = split(*cursor);
        let chunk = (BLOCK_SIZE - inner).min(data.len() - done);
        let block_id = map.lookup_or_alloc(allocator, inode, logical)? as usize;

        if chunk == BLOCK_SIZE {
            device.write_block(block_id, &data[done..done + chunk])?;
        } else {
            device.read_block(block_id, &mut block_buf)?;
            block_buf[inner..inner + chunk].copy_from_slice(&data[done..done + chunk]);
            device.write_block(block_id, &block_buf)?;
        }

        done += chunk;
        *cursor += chunk as u64;
    }

    Ok(())
}

/// Device blocks listed in the file's chain block, in slot order.
pub fn chained_blocks<D: BlockDevice>(device: &D, inode: &Inode) -> Result<Vec<u16>> {
    match inode.indirect_ptr {
        0 => Ok(Vec::new()),
        chain_block => Ok(Chain::read(device, chain_block)?.blocks()),
    }
}

/// Returns every block of the file to the allocator: the chain entries `chained`, then the chain
/// block itself, then the direct block. The inode record is left for the caller to reset.
///
/// Each step takes effect in memory even when an earlier flush failed; the first error is returned.
pub fn release<D: BlockDevice>(
    device: &D,
    allocator: &mut Allocator,
    inode: &Inode,
    chained: &[u16],
) -> Result<()> {
    let mut steps = Vec::with_capacity(3);
    if inode.indirect_ptr != 0 {
        steps.push(allocator.free_data_blocks(device, chained));
        steps.push(allocator.free_data_block(device, inode.indirect_ptr));
    }
    if inode.direct_ptr != 0 {
        steps.push(allocator.free_data_block(device, inode.direct_ptr));
    }
    steps.into_iter().collect()
}
