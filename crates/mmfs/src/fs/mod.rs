//! FUSE filesystem exposing a chat server
//!
//! Teams and channels are directories; each channel directory holds an
//! `unread` file to read new messages from and an `in` file to post to.

pub mod cache;
pub mod error;
pub mod inode_table;
pub mod mm_fs;
pub mod naming;
pub mod pseudo_file;
pub mod tree;

pub use error::FsError;
pub use mm_fs::{mount_options, MmFs, FS_NAME};
pub use tree::{Tree, TreeBuilder};
