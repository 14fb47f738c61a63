mod execution_lock_service;
mod metadata_service;

pub use execution_lock_service::ExecutionLockService;
pub use metadata_service::MetadataService;
