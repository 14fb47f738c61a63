mod common;
mod exception;
mod metadata;
mod run;
mod utils;

pub use metadata::{
    Action, ActionType, EventHandler, RetryLogic, StartWorkflowAction, SubWorkflowParams, TaskDef,
    TaskDetails, TaskTimeoutPolicy, TaskType, TimeoutPolicy, WorkflowDef, WorkflowTask,
};
pub use run::{
    DynamicForkJoinTask, DynamicForkJoinTaskList, StartWorkflowRequest, TaskExecLog, TaskResult,
    TaskResultStatus,
};
pub use utils::{EnvUtils, TaskUtils};

pub mod prelude;

#[macro_use]
pub(crate) mod macros;
