mod event_queues;
mod listener;
mod payload_storage;

pub use event_queues::{EventQueues, InMemoryEventQueues, Message};
pub use listener::{TaskStatusListener, WorkflowStatusListener};
pub use payload_storage::{
    ExternalPayloadStorage, ExternalStorageLocation, InMemoryPayloadStorage, Operation,
    PayloadType,
};
