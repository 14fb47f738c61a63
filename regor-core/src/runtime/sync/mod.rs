mod local_only_lock;
mod lock;

pub use local_only_lock::LocalOnlyLock;
pub use lock::Lock;
