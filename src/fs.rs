use std::path::Path;
use std::sync::Arc;

use crate::bitmap::{Allocator, Bitmap};
use crate::config::*;
use crate::directory::Directory;
use crate::error::{FsError, Result};
use crate::fd_table::{Fd, FdTable};
use crate::file::{chained_blocks, fread, fwrite, release};
use crate::inode::InodeTable;
use crate::superblock::{read_superblock, write_superblock};
use crate::{BlockDevice, FileDisk, Inode, SuperBlock};

/// A mounted volume: the device handle plus every metadata table, held in memory.
/// Each mutating call writes the metadata blocks it touched before returning.
#[derive(Debug)]
pub struct Volume<D: BlockDevice> {
    device: Arc<D>,
    superblock: SuperBlock,
    allocator: Allocator,
    inodes: InodeTable,
    directory: Directory,
    fds: FdTable,
}

impl Volume<FileDisk> {
    /// Creates a fresh store at `path` (replacing any existing file) and formats it.
    pub fn format(path: impl AsRef<Path>) -> Result<()> {
        let disk = FileDisk::create(path, DISK_BLOCKS)?;
        Self::format_device(&disk)
    }

    pub fn mount(path: impl AsRef<Path>) -> Result<Self> {
        Self::mount_device(Arc::new(FileDisk::open(path)?))
    }
}

impl<D: BlockDevice> Volume<D> {
    /// Writes an empty file system onto `device`.
    pub fn format_device(device: &D) -> Result<()> {
        let num_blocks = device.num_blocks();
        if num_blocks <= RESERVED_BLOCKS || device.block_size() != BLOCK_SIZE {
            return Err(FsError::InvalidArgument);
        }

        let superblock = SuperBlock::new();
        write_superblock(device, &superblock)?;
        let allocator = Allocator::format(&superblock, num_blocks)?;
        allocator.sync_data(device)?;
        allocator.sync_inodes(device)?;
        Directory::new(&superblock).sync(device)?;
        InodeTable::new(&superblock).sync(device)?;
        device.flush()?;

        log::debug!(
            "formatted volume: {} blocks, {} free for data",
            num_blocks,
            DISK_BLOCKS - allocator.data_bitmap().count_used()
        );
        Ok(())
    }

    pub fn mount_device(device: Arc<D>) -> Result<Self> {
        let superblock = read_superblock(&*device)?;
        let allocator = Allocator::load(&*device, &superblock)?;
        let inodes = InodeTable::load(&*device, &superblock)?;
        let directory = Directory::load(&*device, &superblock)?;
        log::debug!("mounted volume with {} file(s)", directory.len());
        Ok(Self {
            device,
            superblock,
            allocator,
            inodes,
            directory,
            fds: FdTable::new(),
        })
    }

    /// Drops every descriptor and the in-memory directory, flushes and releases the device.
    pub fn unmount(mut self) -> Result<()> {
        self.fds.clear();
        self.directory.clear_markers();
        self.device.flush()?;
        log::debug!("unmounted volume");
        Ok(())
    }

    pub fn create(&mut self, name: &str) -> Result<()> {
        let device = &*self.device;
        let allocator = &mut self.allocator;
        let inodes = &mut self.inodes;
        let inode_id = self.directory.insert(device, name, || {
            let inode_id = allocator.alloc_inode(device)?;
            if let Err(err) = inodes.update(device, inode_id, Inode::EMPTY) {
                allocator.free_inode(device, inode_id)?;
                return Err(err);
            }
            Ok(inode_id)
        })?;
        log::debug!("created {:?} with inode {}", name, inode_id);
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        let inode_id = self.directory.find(name)?;
        if self.fds.references(inode_id) {
            return Err(FsError::FileOpen);
        }
        let device = &*self.device;
        let inode = self.inodes.get(inode_id)?;
        let chained = chained_blocks(device, &inode)?;

        // Every step runs and the file leaves memory even if a flush fails.
        let steps = [
            release(device, &mut self.allocator, &inode, &chained),
            self.allocator.free_inode(device, inode_id),
            self.inodes.update(device, inode_id, Inode::EMPTY),
            self.directory.remove(device, name).map(|_| ()),
        ];
        let result = steps.into_iter().collect::<Result<()>>();
        match result {
            Ok(()) => log::debug!("deleted {:?}, released inode {}", name, inode_id),
            Err(ref err) => log::warn!("deleted {:?}, but flushing its metadata failed: {}", name, err),
        }
        result
    }

    pub fn open(&mut self, name: &str) -> Result<Fd> {
        let inode_id = self.directory.find(name)?;
        self.fds.open(inode_id)
    }

    pub fn close(&mut self, fd: Fd) -> Result<()> {
        self.fds.close(fd)
    }

    /// Reads up to `len` bytes at the descriptor's cursor and advances it by the amount read.
    pub fn read(&mut self, fd: Fd, len: usize) -> Result<Vec<u8>> {
        let desc = self.fds.get(fd)?;
        let inode = self.inodes.get(desc.inode_id)?;
        let data = fread(&*self.device, &inode, desc.offset, len)?;
        self.fds.get_mut(fd)?.offset += data.len() as u64;
        Ok(data)
    }

    /// Writes `data` at the descriptor's cursor, growing the file when needed.
    pub fn write(&mut self, fd: Fd, data: &[u8]) -> Result<usize> {
        let desc = self.fds.get(fd)?;
        let mut inode = self.inodes.get(desc.inode_id)?;
        let mut cursor = desc.offset;
        let result = fwrite(&*self.device, &mut self.allocator, &mut inode, &mut cursor, data);

        // Whatever reached the device is kept, even if the write failed partway.
        self.fds.get_mut(fd)?.offset = cursor;
        self.inodes.update(&*self.device, desc.inode_id, inode)?;
        result
    }

    pub fn seek(&mut self, fd: Fd, offset: i64) -> Result<()> {
        let desc = self.fds.get(fd)?;
        let size = self.inodes.get(desc.inode_id)?.size as u64;
        let offset = u64::try_from(offset).map_err(|_| FsError::InvalidOffset)?;
        if offset > size {
            return Err(FsError::InvalidOffset);
        }
        self.fds.get_mut(fd)?.offset = offset;
        Ok(())
    }

    /// Shrinks the file to `len` bytes. Blocks past the new end stay allocated to the file and
    /// are reused if it grows again.
    pub fn truncate(&mut self, fd: Fd, len: i64) -> Result<()> {
        let desc = self.fds.get(fd)?;
        let mut inode = self.inodes.get(desc.inode_id)?;
        let len = u64::try_from(len).map_err(|_| FsError::InvalidOffset)?;
        if len > inode.size as u64 {
            return Err(FsError::InvalidOffset);
        }
        inode.size = len as u32;
        self.inodes.update(&*self.device, desc.inode_id, inode)?;
        self.fds.clamp(desc.inode_id, len);
        Ok(())
    }

    pub fn get_size(&self, fd: Fd) -> Result<u64> {
        let desc = self.fds.get(fd)?;
        Ok(self.inodes.get(desc.inode_id)?.size as u64)
    }

    pub fn list(&self) -> Vec<String> {
        self.directory.list()
    }

    /// Inode id behind `name`.
    pub fn lookup(&self, name: &str) -> Result<u16> {
        self.directory.find(name)
    }

    pub fn inode(&self, inode_id: u16) -> Result<Inode> {
        self.inodes.get(inode_id)
    }

    pub fn data_bitmap(&self) -> &Bitmap {
        self.allocator.data_bitmap()
    }

    pub fn inode_bitmap(&self) -> &Bitmap {
        self.allocator.inode_bitmap()
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }
}
