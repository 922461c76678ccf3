//! Management of reading and writing to inodes, and mapping file blocks to device blocks.

use crate::bitmap::Allocator;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::OnDisk;
use crate::{BlockDevice, Inode, SuperBlock};

/// The in-memory inode table. Which slots are live is the inode bitmap's business.
#[derive(Debug, Clone)]
pub struct InodeTable {
    inodes: Vec<Inode>,
    start: usize,
}

impl InodeTable {
    pub fn new(superblock: &SuperBlock) -> Self {
        Self {
            inodes: vec![Inode::EMPTY; MAX_INODES],
            start: superblock.inode_table_start as usize,
        }
    }

    pub fn load(device: &impl BlockDevice, superblock: &SuperBlock) -> Result<Self> {
        let mut table = Self::new(superblock);
        let mut buf = vec![0u8; BLOCK_SIZE];
        for (i, chunk) in table.inodes.chunks_mut(INODES_PER_BLOCK).enumerate() {
            device.read_block(table.start + i, &mut buf)?;
            for (j, inode) in chunk.iter_mut().enumerate() {
                *inode = Inode::decode(&buf[j * INODE_SIZE..]);
            }
        }
        Ok(table)
    }

    pub fn get(&self, inode_id: u16) -> Result<Inode> {
        self.inodes
            .get(inode_id as usize)
            .copied()
            .ok_or(FsError::InvalidArgument)
    }

    pub fn set(&mut self, inode_id: u16, inode: Inode) -> Result<()> {
        let slot = self
            .inodes
            .get_mut(inode_id as usize)
            .ok_or(FsError::InvalidArgument)?;
        *slot = inode;
        Ok(())
    }

    /// Sets the record and writes back the table block that holds it.
    pub fn update(&mut self, device: &impl BlockDevice, inode_id: u16, inode: Inode) -> Result<()> {
        self.set(inode_id, inode)?;
        self.sync_block(device, inode_id as usize / INODES_PER_BLOCK)
    }

    /// Writes every table block.
    pub fn sync(&self, device: &impl BlockDevice) -> Result<()> {
        for i in 0..INODE_TABLE_BLOCKS {
            self.sync_block(device, i)?;
        }
        Ok(())
    }

    fn sync_block(&self, device: &impl BlockDevice, table_block: usize) -> Result<()> {
        let mut buf = vec![0u8; BLOCK_SIZE];
        let first = table_block * INODES_PER_BLOCK;
        let last = (first + INODES_PER_BLOCK).min(MAX_INODES);
        for (j, inode) in self.inodes[first..last].iter().enumerate() {
            inode.encode(&mut buf[j * INODE_SIZE..]);
        }
        device.write_block(self.start + table_block, &buf)
    }
}

/// Contents of an indirect chain block: the device blocks of logical blocks 1.. of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    slots: Vec<u16>,
}

impl Chain {
    pub fn empty() -> Self {
        Self {
            slots: vec![0; CHAIN_SLOTS],
        }
    }

    pub fn read(device: &impl BlockDevice, block_id: u16) -> Result<Self> {
        let mut buf = vec![0u8; BLOCK_SIZE];
        device.read_block(block_id as usize, &mut buf)?;
        let slots = buf
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self { slots })
    }

    pub fn write(&self, device: &impl BlockDevice, block_id: u16) -> Result<()> {
        let mut buf = vec![0u8; BLOCK_SIZE];
        for (pair, slot) in buf.chunks_exact_mut(2).zip(&self.slots) {
            pair.copy_from_slice(&slot.to_le_bytes());
        }
        device.write_block(block_id as usize, &buf)
    }

    pub fn get(&self, slot: usize) -> u16 {
        self.slots[slot]
    }

    /// Allocated entries, in slot order.
    pub fn blocks(&self) -> Vec<u16> {
        self.slots.iter().copied().filter(|&b| b != 0).collect()
    }
}

/// Maps logical blocks of one file to device blocks.
/// The chain block is read at most once and written back by [`BlockMap::sync`] when it changed.
pub struct BlockMap<'a, D: BlockDevice> {
    device: &'a D,
    chain: Option<Chain>,
    dirty: bool,
}

impl<'a, D: BlockDevice> BlockMap<'a, D> {
    pub fn new(device: &'a D) -> Self {
        Self {
            device,
            chain: None,
            dirty: false,
        }
    }

    fn chain(&mut self, indirect_ptr: u16) -> Result<&mut Chain> {
        let chain = match self.chain.take() {
            Some(chain) => chain,
            None => Chain::read(self.device, indirect_ptr)?,
        };
        Ok(self.chain.insert(chain))
    }

    /// Device block of an already mapped logical block.
    pub fn lookup(&mut self, inode: &Inode, logical: usize) -> Result<u16> {
        if logical >= MAX_FILE_BLOCKS {
            return Err(FsError::FileTooLarge);
        }
        let block_id = if logical == 0 {
            inode.direct_ptr
        } else if inode.indirect_ptr == 0 {
            0
        } else {
            self.chain(inode.indirect_ptr)?.get(logical - 1)
        };
        if block_id == 0 {
            return Err(FsError::InvalidBlockId);
        }
        Ok(block_id)
    }

    /// Device block of a logical block, allocating it (and the chain block) when unmapped.
    /// New pointers are recorded on `inode` and in the cached chain; the caller persists both.
    pub fn lookup_or_alloc(
        &mut self,
        allocator: &mut Allocator,
        inode: &mut Inode,
        logical: usize,
    ) -> Result<u16> {
        if logical >= MAX_FILE_BLOCKS {
            return Err(FsError::FileTooLarge);
        }

        if logical == 0 {
            if inode.direct_ptr == 0 {
                inode.direct_ptr = allocator.alloc_data_block(self.device)?;
                log::trace!("direct block -> {}", inode.direct_ptr);
            }
            return Ok(inode.direct_ptr);
        }

        if inode.indirect_ptr == 0 {
            let chain_block = allocator.alloc_data_block(self.device)?;
            let chain = Chain::empty();
            chain.write(self.device, chain_block)?;
            inode.indirect_ptr = chain_block;
            self.chain = Some(chain);
            log::trace!("chain block -> {}", chain_block);
        }

        let device = self.device;
        let slot = logical - 1;
        let chain = self.chain(inode.indirect_ptr)?;
        if chain.get(slot) != 0 {
            return Ok(chain.get(slot));
        }
        let block_id = allocator.alloc_data_block(device)?;
        chain.slots[slot] = block_id;
        self.dirty = true;
        log::trace!("logical block {} -> {}", logical, block_id);
        Ok(block_id)
    }

    /// Writes the chain block back if any slot was recorded.
    pub fn sync(&mut self, inode: &Inode) -> Result<()> {
        if let (true, Some(chain)) = (self.dirty, self.chain.as_ref()) {
            chain.write(self.device, inode.indirect_ptr)?;
            self.dirty = false;
        }
        Ok(())
    }
}
