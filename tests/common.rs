//! Common utilities for tests

use std::io;
use std::sync::Mutex;

use pion::BlockDevice;
use pion::Error;
use pion::Result;
use pion::BLOCK_SIZE;

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($msg:expr) => {
        println!("{}[test] {}{}", crate::common::ORANGE, $msg, crate::common::RESET)
    };
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

/// An in-memory block device.
pub struct RamDisk {
    inner: Mutex<Vec<u8>>,
    num_blocks: usize,
}

impl RamDisk {
    /// Creates a new RamDisk with the specified number of blocks.
    /// Each block is BLOCK_SIZE bytes.
    pub fn new(num_blocks: usize) -> Self {
        RamDisk {
            inner: Mutex::new(vec![0u8; num_blocks * BLOCK_SIZE]),
            num_blocks,
        }
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<()> {
        if block_id >= self.num_blocks || buf.len() != BLOCK_SIZE {
            return Err(Error::InvalidBlockId);
        }
        let start = block_id * BLOCK_SIZE;
        let data = self.inner.lock().unwrap();
        buf.copy_from_slice(&data[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<()> {
        if block_id >= self.num_blocks || buf.len() != BLOCK_SIZE {
            return Err(Error::InvalidBlockId);
        }
        let start = block_id * BLOCK_SIZE;
        let mut data = self.inner.lock().unwrap();
        data[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // In a RAM disk, flushing is a no-op since data is already in memory.
        Ok(())
    }
}

/// A RamDisk that records every successful block write and can be told to refuse writes to one
/// block.
pub struct FaultyDisk {
    disk: RamDisk,
    failing: Mutex<Option<usize>>,
    writes: Mutex<Vec<(usize, Vec<u8>)>>,
}

impl FaultyDisk {
    pub fn new(num_blocks: usize) -> Self {
        FaultyDisk {
            disk: RamDisk::new(num_blocks),
            failing: Mutex::new(None),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Makes writes to `block_id` fail with an I/O error from now on. `None` heals the disk.
    pub fn fail_writes_to(&self, block_id: Option<usize>) {
        *self.failing.lock().unwrap() = block_id;
    }

    /// Drains the write log: block id and contents of each accepted write, oldest first.
    pub fn take_writes(&self) -> Vec<(usize, Vec<u8>)> {
        std::mem::take(&mut *self.writes.lock().unwrap())
    }
}

impl BlockDevice for FaultyDisk {
    fn num_blocks(&self) -> usize {
        self.disk.num_blocks()
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<()> {
        self.disk.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<()> {
        if *self.failing.lock().unwrap() == Some(block_id) {
            return Err(Error::Io(io::Error::other(format!("write to block {} refused", block_id))));
        }
        self.disk.write_block(block_id, buf)?;
        self.writes.lock().unwrap().push((block_id, buf.to_vec()));
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.disk.flush()
    }
}

/// Whether bit `index` is set in a bitmap block image.
pub fn bit(block: &[u8], index: usize) -> bool {
    block[index / 8] & (1 << (index % 8)) != 0
}

/// Deterministic, non-repeating-per-block test payload.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 ^ seed).collect()
}
