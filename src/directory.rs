//! The single flat directory: a fixed array of entries kept in one block.

use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::OnDisk;
use crate::{BlockDevice, DirEntry, SuperBlock};

#[derive(Debug, Clone)]
pub struct Directory {
    entries: [DirEntry; MAX_DIR_ENTRIES],
    block_id: usize,
}

impl Directory {
    pub fn new(superblock: &SuperBlock) -> Self {
        Self {
            entries: [DirEntry::NULL; MAX_DIR_ENTRIES],
            block_id: superblock.directory_block as usize,
        }
    }

    pub fn load(device: &impl BlockDevice, superblock: &SuperBlock) -> Result<Self> {
        let mut dir = Self::new(superblock);
        let mut buf = vec![0u8; BLOCK_SIZE];
        device.read_block(dir.block_id, &mut buf)?;
        for (i, entry) in dir.entries.iter_mut().enumerate() {
            *entry = DirEntry::decode(&buf[i * DIR_ENTRY_SIZE..]);
        }
        Ok(dir)
    }

    pub fn sync(&self, device: &impl BlockDevice) -> Result<()> {
        let mut buf = vec![0u8; BLOCK_SIZE];
        for (i, entry) in self.entries.iter().enumerate() {
            entry.encode(&mut buf[i * DIR_ENTRY_SIZE..]);
        }
        device.write_block(self.block_id, &buf)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.in_use && entry.name_eq(name))
    }

    /// Inode id of the file called `name`.
    pub fn find(&self, name: &str) -> Result<u16> {
        self.position(name)
            .map(|i| self.entries[i].inode_id)
            .ok_or(FsError::NotFound)
    }

    /// Adds an entry for `name`. `alloc_inode` is only called once the name is known to be
    /// valid, new, and to have a free slot, so a failed insert never leaks an inode.
    pub fn insert(
        &mut self,
        device: &impl BlockDevice,
        name: &str,
        alloc_inode: impl FnOnce() -> Result<u16>,
    ) -> Result<u16> {
        DirEntry::new(0, name)?;
        if self.position(name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let slot = self
            .entries
            .iter()
            .position(|entry| !entry.in_use)
            .ok_or(FsError::DirectoryFull)?;

        let inode_id = alloc_inode()?;
        self.entries[slot] = DirEntry::new(inode_id, name)?;
        self.sync(device)?;
        Ok(inode_id)
    }

    /// Clears the entry for `name`, returning the inode it referenced.
    pub fn remove(&mut self, device: &impl BlockDevice, name: &str) -> Result<u16> {
        let slot = self.position(name).ok_or(FsError::NotFound)?;
        let inode_id = self.entries[slot].inode_id;
        self.entries[slot] = DirEntry::NULL;
        self.sync(device)?;
        Ok(inode_id)
    }

    /// Names of all live entries, in slot order.
    pub fn list(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.in_use)
            .map(DirEntry::name_lossy)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.in_use).count()
    }

    /// Forgets every entry in memory. The on-disk block is left alone.
    pub fn clear_markers(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.in_use = false;
        }
    }
}
