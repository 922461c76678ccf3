//! Management of data bitmap and inode bitmap.
//! Both bitmaps are held in memory for the whole mount and each one is backed by a single block.
//! Data bitmap bit `i` tracks physical block `i`, inode bitmap bit `i` tracks inode `i`.

use crate::config::*;
use crate::error::{FsError, Result};
use crate::{BlockDevice, SuperBlock};

/// A fixed-capacity bitset. A set bit means the slot is in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: Vec<u8>,
    capacity: usize,
}

impl Bitmap {
    pub fn new(capacity: usize) -> Self {
        Self {
            bits: vec![0; capacity.div_ceil(8)],
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn locate(&self, index: usize) -> Result<(usize, u8)> {
        if index >= self.capacity {
            return Err(FsError::InvalidArgument);
        }
        Ok((index / 8, 1 << (index % 8)))
    }

    pub fn test(&self, index: usize) -> Result<bool> {
        let (byte, mask) = self.locate(index)?;
        Ok(self.bits[byte] & mask != 0)
    }

    /// Sets the bit, returning its previous value.
    pub fn set(&mut self, index: usize) -> Result<bool> {
        let (byte, mask) = self.locate(index)?;
        let prev = self.bits[byte] & mask != 0;
        self.bits[byte] |= mask;
        Ok(prev)
    }

    /// Clears the bit, returning its previous value.
    pub fn clear(&mut self, index: usize) -> Result<bool> {
        let (byte, mask) = self.locate(index)?;
        let prev = self.bits[byte] & mask != 0;
        self.bits[byte] &= !mask;
        Ok(prev)
    }

    /// Index of the first clear bit at or after `start`.
    pub fn first_clear_from(&self, start: usize) -> Option<usize> {
        (start..self.capacity).find(|&i| self.bits[i / 8] & (1 << (i % 8)) == 0)
    }

    pub fn count_used(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Loads the bitset from the head of a block buffer.
    pub fn load(&mut self, buf: &[u8]) {
        let len = self.bits.len();
        self.bits.copy_from_slice(&buf[..len]);
    }

    /// Stores the bitset into the head of a block buffer, the rest is left untouched.
    pub fn store(&self, buf: &mut [u8]) {
        buf[..self.bits.len()].copy_from_slice(&self.bits);
    }
}

/// Owner of both bitmaps. Every mutation is flushed to the bitmap's block before returning.
/// An allocation whose flush fails is undone, a release stays in effect in memory.
#[derive(Debug, Clone)]
pub struct Allocator {
    data: Bitmap,
    inodes: Bitmap,
    data_block: usize,
    inode_block: usize,
}

impl Allocator {
    /// Fresh bitmaps for a device of `num_blocks` blocks.
    /// Metadata blocks and blocks the device does not have are marked used up front.
    pub fn format(superblock: &SuperBlock, num_blocks: usize) -> Result<Self> {
        let mut allocator = Self::empty(superblock);
        for block in (0..RESERVED_BLOCKS).chain(num_blocks.min(DISK_BLOCKS)..DISK_BLOCKS) {
            allocator.data.set(block)?;
        }
        Ok(allocator)
    }

    pub fn load(device: &impl BlockDevice, superblock: &SuperBlock) -> Result<Self> {
        let mut allocator = Self::empty(superblock);
        let mut buf = vec![0u8; BLOCK_SIZE];
        device.read_block(allocator.data_block, &mut buf)?;
        allocator.data.load(&buf);
        device.read_block(allocator.inode_block, &mut buf)?;
        allocator.inodes.load(&buf);
        Ok(allocator)
    }

    fn empty(superblock: &SuperBlock) -> Self {
        Self {
            data: Bitmap::new(DISK_BLOCKS),
            inodes: Bitmap::new(MAX_INODES),
            data_block: superblock.data_bitmap_block as usize,
            inode_block: superblock.inode_bitmap_block as usize,
        }
    }

    pub fn data_bitmap(&self) -> &Bitmap {
        &self.data
    }

    pub fn inode_bitmap(&self) -> &Bitmap {
        &self.inodes
    }

    pub fn sync_data(&self, device: &impl BlockDevice) -> Result<()> {
        write_bitmap(device, self.data_block, &self.data)
    }

    pub fn sync_inodes(&self, device: &impl BlockDevice) -> Result<()> {
        write_bitmap(device, self.inode_block, &self.inodes)
    }

    /// Allocates a new data block, returning its physical block id.
    pub fn alloc_data_block(&mut self, device: &impl BlockDevice) -> Result<u16> {
        let block_id = self
            .data
            .first_clear_from(RESERVED_BLOCKS)
            .ok_or(FsError::OutOfSpace)?;
        self.data.set(block_id)?;
        if let Err(err) = self.sync_data(device) {
            self.data.clear(block_id)?;
            return Err(err);
        }
        log::trace!("allocated data block {}", block_id);
        Ok(block_id as u16)
    }

    pub fn alloc_inode(&mut self, device: &impl BlockDevice) -> Result<u16> {
        let inode_id = self.inodes.first_clear_from(0).ok_or(FsError::OutOfSpace)?;
        self.inodes.set(inode_id)?;
        if let Err(err) = self.sync_inodes(device) {
            self.inodes.clear(inode_id)?;
            return Err(err);
        }
        log::trace!("allocated inode {}", inode_id);
        Ok(inode_id as u16)
    }

    pub fn free_data_block(&mut self, device: &impl BlockDevice, block_id: u16) -> Result<()> {
        self.free_data_blocks(device, &[block_id])
    }

    /// Releases several data blocks with a single bitmap flush.
    /// Reserved blocks are rejected before anything is cleared.
    pub fn free_data_blocks(&mut self, device: &impl BlockDevice, block_ids: &[u16]) -> Result<()> {
        if block_ids
            .iter()
            .any(|&id| (id as usize) < RESERVED_BLOCKS || id as usize >= self.data.capacity())
        {
            return Err(FsError::InvalidArgument);
        }
        for &id in block_ids {
            self.data.clear(id as usize)?;
        }
        self.sync_data(device)?;
        log::trace!("freed {} data block(s)", block_ids.len());
        Ok(())
    }

    pub fn free_inode(&mut self, device: &impl BlockDevice, inode_id: u16) -> Result<()> {
        self.inodes.clear(inode_id as usize)?;
        self.sync_inodes(device)?;
        log::trace!("freed inode {}", inode_id);
        Ok(())
    }
}

fn write_bitmap(device: &impl BlockDevice, block_id: usize, bitmap: &Bitmap) -> Result<()> {
    let mut buf = vec![0u8; BLOCK_SIZE];
    bitmap.store(&mut buf);
    device.write_block(block_id, &buf)
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    /// Accepts reads, refuses every write.
    struct WriteProtected;

    impl BlockDevice for WriteProtected {
        fn num_blocks(&self) -> usize {
            DISK_BLOCKS
        }

        fn read_block(&self, _block_id: usize, _buf: &mut [u8]) -> Result<()> {
            Ok(())
        }

        fn write_block(&self, _block_id: usize, _buf: &[u8]) -> Result<()> {
            Err(FsError::Io(io::Error::other("write protected")))
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn set_test_clear() {
        let mut bitmap = Bitmap::new(20);
        assert!(!bitmap.test(9).unwrap());
        assert!(!bitmap.set(9).unwrap());
        assert!(bitmap.set(9).unwrap());
        assert!(bitmap.test(9).unwrap());
        assert_eq!(bitmap.count_used(), 1);
        assert!(bitmap.clear(9).unwrap());
        assert!(!bitmap.clear(9).unwrap());
        assert_eq!(bitmap.count_used(), 0);
    }

    #[test]
    fn bounds_checked() {
        let mut bitmap = Bitmap::new(20);
        assert!(matches!(bitmap.test(20), Err(FsError::InvalidArgument)));
        assert!(matches!(bitmap.set(20), Err(FsError::InvalidArgument)));
        assert!(matches!(bitmap.clear(100), Err(FsError::InvalidArgument)));
    }

    #[test]
    fn first_fit_scan() {
        let mut bitmap = Bitmap::new(12);
        for i in 0..5 {
            bitmap.set(i).unwrap();
        }
        bitmap.set(6).unwrap();
        assert_eq!(bitmap.first_clear_from(0), Some(5));
        assert_eq!(bitmap.first_clear_from(6), Some(7));
        for i in 7..12 {
            bitmap.set(i).unwrap();
        }
        assert_eq!(bitmap.first_clear_from(6), None);
    }

    #[test]
    fn block_image() {
        let mut bitmap = Bitmap::new(DISK_BLOCKS);
        bitmap.set(0).unwrap();
        bitmap.set(8191).unwrap();
        let mut buf = vec![0xAAu8; BLOCK_SIZE];
        bitmap.store(&mut buf);
        assert_eq!(buf[0], 0x01);
        assert_eq!(buf[1023], 0x80);

        let mut loaded = Bitmap::new(DISK_BLOCKS);
        loaded.load(&buf);
        assert_eq!(loaded, bitmap);
    }

    #[test]
    fn format_reserves_metadata_and_missing_blocks() {
        let allocator = Allocator::format(&SuperBlock::new(), 30).unwrap();
        let data = allocator.data_bitmap();
        assert!((0..RESERVED_BLOCKS).all(|i| data.test(i).unwrap()));
        assert!((RESERVED_BLOCKS..30).all(|i| !data.test(i).unwrap()));
        assert!((30..DISK_BLOCKS).all(|i| data.test(i).unwrap()));
        assert_eq!(allocator.inode_bitmap().count_used(), 0);
    }

    #[test]
    fn failed_flush_undoes_allocation() {
        let disk = WriteProtected;
        let mut allocator = Allocator::format(&SuperBlock::new(), DISK_BLOCKS).unwrap();
        let data_used = allocator.data_bitmap().count_used();

        assert!(matches!(allocator.alloc_data_block(&disk), Err(FsError::Io(_))));
        assert_eq!(allocator.data_bitmap().count_used(), data_used);
        assert!(matches!(allocator.alloc_inode(&disk), Err(FsError::Io(_))));
        assert_eq!(allocator.inode_bitmap().count_used(), 0);
    }

    #[test]
    fn failed_flush_keeps_release() {
        let disk = WriteProtected;
        let mut allocator = Allocator::format(&SuperBlock::new(), DISK_BLOCKS).unwrap();
        allocator.data.set(RESERVED_BLOCKS).unwrap();
        allocator.data.set(RESERVED_BLOCKS + 1).unwrap();
        allocator.inodes.set(3).unwrap();

        let blocks = [RESERVED_BLOCKS as u16, RESERVED_BLOCKS as u16 + 1];
        assert!(matches!(allocator.free_data_blocks(&disk, &blocks), Err(FsError::Io(_))));
        assert!(!allocator.data_bitmap().test(RESERVED_BLOCKS).unwrap());
        assert!(!allocator.data_bitmap().test(RESERVED_BLOCKS + 1).unwrap());
        assert!(matches!(allocator.free_inode(&disk, 3), Err(FsError::Io(_))));
        assert!(!allocator.inode_bitmap().test(3).unwrap());

        // A reserved block in the list is rejected before anything changes.
        allocator.data.set(RESERVED_BLOCKS).unwrap();
        let bad = [RESERVED_BLOCKS as u16, 0];
        assert!(matches!(allocator.free_data_blocks(&disk, &bad), Err(FsError::InvalidArgument)));
        assert!(allocator.data_bitmap().test(RESERVED_BLOCKS).unwrap());
    }
}
