//! Pion is a tiny single-volume file system living entirely in user space on top of a block device.
//! One flat directory, no permissions, timestamps or links.
//!
//! Pion's linear layout (4096-byte blocks):
//! - Block 0: Superblock
//! - Block 1: Data bitmap
//! - Block 2: Inode bitmap
//! - Block 3: Directory
//! - Block 4: Inode table
//! - Blocks 5..25: Reserved
//! - Blocks 25..: Data and chain blocks
//!
//! Each file owns one direct block and, once it grows past 4096 bytes, one chain block listing
//! up to 2048 further data blocks.
//!
//! Pion's layers (from bottom to top):
//! 1. Block Device: fixed-size block I/O.                      | User implemented, or `FileDisk`
//! 2. Bitmap: data block and inode allocation.                 | Fs implemented
//! 3. Inode: file metadata and block mapping.                  | Fs implemented
//! 4. Directory / Descriptors: names and open-file cursors.    | Fs implemented
//! 5. File: byte-range reads and writes.                       | Fs implemented
//! 6. Volume: the interface for users.                         | Fs implemented

mod config;
mod block_dev;
mod structs;
mod bitmap;
mod superblock;
mod inode;
mod directory;
mod fd_table;
mod file;
mod fs;
mod error;

pub use block_dev::{BlockDevice, FileDisk};
pub use config::*;
pub use structs::*;
pub use bitmap::Bitmap;
pub use fd_table::Fd;
pub use fs::*;
pub use error::FsError as Error;
pub use error::Result;
