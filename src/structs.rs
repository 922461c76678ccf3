//! On-disk records and their little-endian encodings.

use crate::config::*;
use crate::error::{FsError, Result};

/// A fixed-size record that is stored inside a block.
pub trait OnDisk: Sized {
    const SIZE: usize;

    /// `buf.len()` must be at least `SIZE`.
    fn encode(&self, buf: &mut [u8]);

    /// `buf.len()` must be at least `SIZE`.
    fn decode(buf: &[u8]) -> Self;
}

fn get_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn get_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub data_bitmap_block: u16,  // Block holding the data bitmap
    pub inode_bitmap_block: u16, // Block holding the inode bitmap
    pub inode_table_start: u16,  // First block of the inode table
    pub directory_block: u16,    // Block holding the directory
    pub magic: u32,
}

impl SuperBlock {
    /// The fixed layout every volume is formatted with.
    pub const fn new() -> Self {
        Self {
            data_bitmap_block: DATA_BITMAP_BLOCK,
            inode_bitmap_block: INODE_BITMAP_BLOCK,
            inode_table_start: INODE_TABLE_START,
            directory_block: DIRECTORY_BLOCK,
            magic: MAGIC,
        }
    }
}

impl Default for SuperBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl OnDisk for SuperBlock {
    const SIZE: usize = 12;

    fn encode(&self, buf: &mut [u8]) {
        buf[0..2].copy_from_slice(&self.data_bitmap_block.to_le_bytes());
        buf[2..4].copy_from_slice(&self.inode_bitmap_block.to_le_bytes());
        buf[4..6].copy_from_slice(&self.inode_table_start.to_le_bytes());
        buf[6..8].copy_from_slice(&self.directory_block.to_le_bytes());
        buf[8..12].copy_from_slice(&self.magic.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            data_bitmap_block: get_u16(buf, 0),
            inode_bitmap_block: get_u16(buf, 2),
            inode_table_start: get_u16(buf, 4),
            directory_block: get_u16(buf, 6),
            magic: get_u32(buf, 8),
        }
    }
}

/// Per-file metadata. A zero block pointer means "not allocated".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inode {
    pub direct_ptr: u16,
    pub indirect_ptr: u16,
    pub size: u32,
}

impl Inode {
    pub const EMPTY: Self = Self {
        direct_ptr: 0,
        indirect_ptr: 0,
        size: 0,
    };
}

impl OnDisk for Inode {
    const SIZE: usize = INODE_SIZE;

    fn encode(&self, buf: &mut [u8]) {
        buf[0..2].copy_from_slice(&self.direct_ptr.to_le_bytes());
        buf[2..4].copy_from_slice(&self.indirect_ptr.to_le_bytes());
        buf[4..8].copy_from_slice(&self.size.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            direct_ptr: get_u16(buf, 0),
            indirect_ptr: get_u16(buf, 2),
            size: get_u32(buf, 4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub in_use: bool,
    pub inode_id: u16,
    pub name: [u8; DIR_NAME_FIELD],
}

impl DirEntry {
    pub const NULL: Self = Self {
        in_use: false,
        inode_id: 0,
        name: [0; DIR_NAME_FIELD],
    };

    pub fn new(inode_id: u16, name: &str) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > MAX_FILE_NAME_LEN || bytes.contains(&0) {
            return Err(FsError::InvalidName);
        }
        Ok(Self {
            in_use: true,
            inode_id,
            name: {
                let mut arr = [0; DIR_NAME_FIELD];
                arr[..bytes.len()].copy_from_slice(bytes);
                arr
            },
        })
    }

    /// Name bytes without the NUL padding.
    pub fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|&c| c == 0).unwrap_or(self.name.len());
        &self.name[..end]
    }

    pub fn name_eq(&self, name: &str) -> bool {
        self.name_bytes() == name.as_bytes()
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }
}

impl OnDisk for DirEntry {
    const SIZE: usize = DIR_ENTRY_SIZE;

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = self.in_use as u8;
        buf[1] = 0;
        buf[2..4].copy_from_slice(&self.inode_id.to_le_bytes());
        buf[4..4 + DIR_NAME_FIELD].copy_from_slice(&self.name);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut name = [0; DIR_NAME_FIELD];
        name.copy_from_slice(&buf[4..4 + DIR_NAME_FIELD]);
        Self {
            in_use: buf[0] != 0,
            inode_id: get_u16(buf, 2),
            name,
        }
    }
}
