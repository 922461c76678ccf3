use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file")]
    NotFound,
    #[error("file already exists")]
    AlreadyExists,
    #[error("directory is full")]
    DirectoryFull,
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("file is open")]
    FileOpen,
    #[error("bad file descriptor")]
    BadDescriptor,
    #[error("offset out of range")]
    InvalidOffset,
    #[error("no space left on volume")]
    OutOfSpace,
    #[error("file would exceed the maximum file size")]
    FileTooLarge,
    #[error("invalid file name")]
    InvalidName,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("superblock is missing or does not match the volume layout")]
    InvalidSuperBlock,
    #[error("invalid block id")]
    InvalidBlockId,
    #[error("block device I/O failed: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, FsError>;
