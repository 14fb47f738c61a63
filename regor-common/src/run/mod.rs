mod dynamic_fork_join_task;
mod start_workflow_request;
mod task_exec_log;
mod task_result;

pub use dynamic_fork_join_task::{DynamicForkJoinTask, DynamicForkJoinTaskList};
pub use start_workflow_request::StartWorkflowRequest;
pub use task_exec_log::TaskExecLog;
pub use task_result::{TaskResult, TaskResultStatus};
