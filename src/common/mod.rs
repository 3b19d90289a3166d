mod download;
mod fs;
mod lock;

pub use download::*;
pub use fs::*;
pub use lock::{FileHash, InputLock, LockStatus};
