use crate::config::MAX_OPEN_FILES;
use crate::error::{FsError, Result};

/// Index into the descriptor table.
pub type Fd = usize;

/// Cursor state of one open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileDesc {
    pub inode_id: u16,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct FdTable {
    slots: [Option<FileDesc>; MAX_OPEN_FILES],
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FdTable {
    pub fn new() -> Self {
        Self {
            slots: [None; MAX_OPEN_FILES],
        }
    }

    pub fn open(&mut self, inode_id: u16) -> Result<Fd> {
        let fd = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::TooManyOpenFiles)?;
        self.slots[fd] = Some(FileDesc { inode_id, offset: 0 });
        Ok(fd)
    }

    pub fn close(&mut self, fd: Fd) -> Result<()> {
        let slot = self.slots.get_mut(fd).ok_or(FsError::BadDescriptor)?;
        slot.take().map(|_| ()).ok_or(FsError::BadDescriptor)
    }

    pub fn get(&self, fd: Fd) -> Result<FileDesc> {
        self.slots
            .get(fd)
            .copied()
            .flatten()
            .ok_or(FsError::BadDescriptor)
    }

    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut FileDesc> {
        self.slots
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(FsError::BadDescriptor)
    }

    /// Whether any open descriptor refers to `inode_id`.
    pub fn references(&self, inode_id: u16) -> bool {
        self.slots.iter().flatten().any(|desc| desc.inode_id == inode_id)
    }

    /// Pulls every cursor on `inode_id` back to at most `size`.
    pub fn clamp(&mut self, inode_id: u16, size: u64) {
        for desc in self.slots.iter_mut().flatten() {
            if desc.inode_id == inode_id && desc.offset > size {
                desc.offset = size;
            }
        }
    }

    pub fn clear(&mut self) {
        self.slots = [None; MAX_OPEN_FILES];
    }
}
