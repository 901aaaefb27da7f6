pub mod mount;
pub mod unmount;
pub mod version;

pub use mount::Mount;
pub use unmount::Unmount;
pub use version::Version;
