use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::OnDisk;
use crate::{BlockDevice, SuperBlock};

pub fn read_superblock<D: BlockDevice>(device: &D) -> Result<SuperBlock> {
    if device.num_blocks() <= RESERVED_BLOCKS {
        return Err(FsError::InvalidSuperBlock);
    }
    let mut buf = vec![0u8; BLOCK_SIZE];
    device.read_block(SUPERBLOCK_ID, &mut buf)?;
    let superblock = SuperBlock::decode(&buf);

    // Only one layout is ever written, anything else is not ours.
    if superblock != SuperBlock::new() {
        return Err(FsError::InvalidSuperBlock);
    }

    Ok(superblock)
}

pub fn write_superblock<D: BlockDevice>(device: &D, superblock: &SuperBlock) -> Result<()> {
    let mut buf = vec![0u8; BLOCK_SIZE];
    superblock.encode(&mut buf);
    device.write_block(SUPERBLOCK_ID, &buf)?;
    Ok(())
}
