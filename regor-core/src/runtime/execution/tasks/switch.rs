use regor_common::prelude::*;
use regor_common::TaskType;

use super::WorkflowSystemTask;
use crate::model::{TaskModel, TaskStatus, WorkflowModel};
use crate::runtime::execution::WorkflowExecutor;

/// The branch is chosen when the task is mapped, executing the task only completes it.
pub struct Switch;

impl WorkflowSystemTask for Switch {
    fn task_type(&self) -> &str {
        TaskType::Switch.as_ref()
    }

    fn execute(
        &self,
        _workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        task.set_status(TaskStatus::Completed);
        Ok(true)
    }
}

/// Legacy form of SWITCH.
pub struct Decision;

impl WorkflowSystemTask for Decision {
    fn task_type(&self) -> &str {
        TaskType::Decision.as_ref()
    }

    fn execute(
        &self,
        _workflow: &mut WorkflowModel,
        task: &mut TaskModel,
        _executor: &WorkflowExecutor,
    ) -> RegorResult<bool> {
        task.set_status(TaskStatus::Completed);
        Ok(true)
    }
}

/// The synthetic task heading a fork, completed as soon as it is mapped.
pub struct Fork;

impl WorkflowSystemTask for Fork {
    fn task_type(&self) -> &str {
        TaskType::Fork.as_ref()
    }
}
