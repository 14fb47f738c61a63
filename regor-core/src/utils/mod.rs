mod date_time_utils;
mod external_payload_storage_utils;
mod id_generator;
mod parameters_utils;
mod queue_utils;
mod semaphore_util;

pub use date_time_utils::DateTimeUtils;
pub use external_payload_storage_utils::ExternalPayloadStorageUtils;
pub use id_generator::IdGenerator;
pub use parameters_utils::ParametersUtils;
pub use queue_utils::QueueUtils;
pub use semaphore_util::SemaphoreUtil;
