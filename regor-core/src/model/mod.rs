mod event_execution;
mod task_model;
mod workflow_model;
mod workflow_status;

pub use event_execution::{EventExecution, EventExecutionStatus};
pub use task_model::{TaskModel, TaskStatus};
pub use workflow_model::WorkflowModel;
pub use workflow_status::WorkflowStatus;
