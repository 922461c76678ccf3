use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::config::BLOCK_SIZE;
use crate::error::{FsError, Result};

pub trait BlockDevice: Send + Sync {
    /// Returns the number of blocks in the block device.
    fn num_blocks(&self) -> usize;

    /// Reads a block of data from the block device.
    /// buf.len() must be equal to block_size().
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<()>;

    /// Writes a block of data to the block device.
    /// buf.len() must be equal to block_size().
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<()>;

    /// Flushes any buffered data to the underlying storage.
    fn flush(&self) -> Result<()>;

    /// Returns the size of each block in bytes.
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }
}

/// A block store backed by a regular host file, `num_blocks * BLOCK_SIZE` bytes long.
#[derive(Debug)]
pub struct FileDisk {
    inner: Mutex<File>,
    num_blocks: usize,
}

impl FileDisk {
    /// Creates (or truncates) the backing file and zero-fills it to `num_blocks` blocks.
    pub fn create(path: impl AsRef<Path>, num_blocks: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        file.set_len((num_blocks * BLOCK_SIZE) as u64)?;
        log::debug!("created block store {:?} with {} blocks", path.as_ref(), num_blocks);
        Ok(Self {
            inner: Mutex::new(file),
            num_blocks,
        })
    }

    /// Opens an existing store. Trailing bytes that do not fill a whole block are ignored.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let num_blocks = (file.metadata()?.len() / BLOCK_SIZE as u64) as usize;
        Ok(Self {
            inner: Mutex::new(file),
            num_blocks,
        })
    }

    fn file(&self) -> Result<MutexGuard<'_, File>> {
        self.inner
            .lock()
            .map_err(|_| FsError::Io(io::Error::other("block store lock poisoned")))
    }

    fn check(&self, block_id: usize, len: usize) -> Result<()> {
        if block_id >= self.num_blocks || len != BLOCK_SIZE {
            return Err(FsError::InvalidBlockId);
        }
        Ok(())
    }
}

impl BlockDevice for FileDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<()> {
        self.check(block_id, buf.len())?;
        let mut file = self.file()?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<()> {
        self.check(block_id, buf.len())?;
        let mut file = self.file()?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut file = self.file()?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }
}
