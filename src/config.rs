pub const MAGIC: u32 = 0x50494F4E; // "PION" in ASCII

pub const BLOCK_SIZE: usize = 4096;
pub const DISK_BLOCKS: usize = 8192; // Blocks in a freshly created store, also the data bitmap capacity
pub const RESERVED_BLOCKS: usize = 25; // Blocks [0, 25) belong to metadata and are never handed out

// Fixed layout written into the superblock at format time.
pub const SUPERBLOCK_ID: usize = 0;
pub const DATA_BITMAP_BLOCK: u16 = 1;
pub const INODE_BITMAP_BLOCK: u16 = 2;
pub const DIRECTORY_BLOCK: u16 = 3;
pub const INODE_TABLE_START: u16 = 4;

pub const MAX_INODES: usize = 512;
pub const INODE_SIZE: usize = 8; // direct (u16) + indirect (u16) + size (u32)
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
pub const INODE_TABLE_BLOCKS: usize = (MAX_INODES * INODE_SIZE).div_ceil(BLOCK_SIZE);

pub const MAX_DIR_ENTRIES: usize = 64;
pub const MAX_FILE_NAME_LEN: usize = 14;
pub const DIR_NAME_FIELD: usize = 16; // Name bytes on disk, NUL padded
pub const DIR_ENTRY_SIZE: usize = 4 + DIR_NAME_FIELD; // in_use + pad + inode id + name

pub const MAX_OPEN_FILES: usize = 32;

pub const CHAIN_SLOTS: usize = BLOCK_SIZE / 2; // u16 block pointers per chain block
pub const MAX_FILE_BLOCKS: usize = 1 + CHAIN_SLOTS; // direct block + chain
pub const MAX_FILE_SIZE: u64 = (MAX_FILE_BLOCKS * BLOCK_SIZE) as u64;

const _: () = assert!(INODE_TABLE_START as usize + INODE_TABLE_BLOCKS <= RESERVED_BLOCKS);
const _: () = assert!(MAX_DIR_ENTRIES * DIR_ENTRY_SIZE <= BLOCK_SIZE);
const _: () = assert!(DISK_BLOCKS <= BLOCK_SIZE * 8 && MAX_INODES <= BLOCK_SIZE * 8);
const _: () = assert!(DISK_BLOCKS <= u16::MAX as usize + 1);
