pub mod bootstrap_lock;

pub use bootstrap_lock::{BootstrapLock, BootstrapLockGuard};
