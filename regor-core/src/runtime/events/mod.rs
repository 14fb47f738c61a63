mod action_processor;
mod event_processor;
mod event_queue_manager;

pub use action_processor::{ActionProcessor, SimpleActionProcessor};
pub use event_processor::EventProcessor;
pub use event_queue_manager::EventQueueManager;
