use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};

/// Maps a `TaskType::StartWorkflow`: the resolved input holds the `startWorkflow` request, the
/// task completes as soon as the workflow is started.
pub struct StartWorkflowTaskMapper;

impl TaskMapper for StartWorkflowTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::StartWorkflow
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in StartWorkflowTaskMapper",
            task_mapper_context
        );

        let mut start_workflow_task = task_mapper_context.create_task_model(TaskStatus::Scheduled);
        start_workflow_task.task_type = TaskType::StartWorkflow.as_ref().into();
        start_workflow_task.input_data = task_mapper_context.task_input.clone();
        start_workflow_task.callback_after_seconds =
            task_mapper_context.workflow_task.start_delay as i64;
        start_workflow_task.retry_count = task_mapper_context.retry_count;

        debug!("{} created", start_workflow_task.task_id);
        Ok(vec![start_workflow_task])
    }
}
