mod events;
mod json_ext;
mod tasks;
mod workflow;

pub use events::{Action, ActionType, EventHandler, StartWorkflowAction, TaskDetails};
pub(crate) use json_ext::JsonExt;
pub use tasks::{RetryLogic, TaskDef, TaskType, TimeoutPolicy as TaskTimeoutPolicy};
pub use workflow::{SubWorkflowParams, TimeoutPolicy, WorkflowDef, WorkflowTask};
