use regor_common::prelude::*;
use regor_common::TaskType;

use super::task_mapper_context::TaskMapperContext;
use crate::model::TaskModel;

/// Maps a `WorkflowTask` of one `TaskType` to the `TaskModel`s to be scheduled for it.
pub trait TaskMapper: Send + Sync {
    fn get_task_type(&self) -> TaskType;

    fn get_mapped_tasks(&self, task_mapper_context: TaskMapperContext)
        -> RegorResult<Vec<TaskModel>>;
}
