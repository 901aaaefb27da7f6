pub mod config;
pub mod fs;
pub mod logging;
pub mod version;

pub mod prelude {
    pub use crate::config::{FileConfig, MountConfig, Overrides, Password};
    pub use crate::fs::{FsError, MmFs, Tree, TreeBuilder};
    pub use crate::version::build_info;
}
