mod concurrent_execution_limit_dao;
mod event_handler_dao;
mod execution_dao;
mod metadata_dao;
mod queue_dao;
mod rate_limiting_dao;

pub use concurrent_execution_limit_dao::ConcurrentExecutionLimitDao;
pub use event_handler_dao::{EventHandlerDao, InMemoryEventHandlerDao};
pub use execution_dao::{ExecutionDao, InMemoryExecutionDao};
pub use metadata_dao::{InMemoryMetadataDao, MetadataDao};
pub use queue_dao::{InMemoryQueueDao, QueueDao, DECIDER_QUEUE};
pub use rate_limiting_dao::RateLimitingDao;
