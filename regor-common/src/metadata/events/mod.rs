mod event_handler;

pub use event_handler::{Action, ActionType, EventHandler, StartWorkflowAction, TaskDetails};
