//! Filesystem errors and the errno each one surfaces as

use client::error::ApiError;

use super::cache::NothingCached;

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("no such entry: {0}")]
    NotFound(String),
    #[error("remote call failed: {0}")]
    Remote(#[from] ApiError),
    #[error("malformed direct message channel name: {0}")]
    InvalidChannel(String),
    #[error("inode {0} is not a directory")]
    NotDirectory(u64),
    #[error("inode {0} is a directory")]
    IsDirectory(u64),
    #[error("file handle {0} is not open for this operation")]
    BadHandle(u64),
    #[error("message body is not valid UTF-8")]
    InvalidUtf8,
    #[error(transparent)]
    Cache(#[from] NothingCached),
}

impl FsError {
    /// The errno the kernel should see for this failure
    pub fn errno(&self) -> libc::c_int {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::NotDirectory(_) => libc::ENOTDIR,
            FsError::IsDirectory(_) => libc::EISDIR,
            FsError::BadHandle(_) => libc::EBADF,
            FsError::InvalidUtf8 => libc::EINVAL,
            FsError::Remote(_) | FsError::InvalidChannel(_) | FsError::Cache(_) => libc::EIO,
        }
    }
}
