use chrono::Utc;
use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};
use crate::utils::ParametersUtils;

/// Maps a `TaskType::Inline`: the resolved input carries the `evaluatorType` and the
/// `expression` the task evaluates.
pub struct InlineTaskMapper;

impl TaskMapper for InlineTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::Inline
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in InlineTaskMapper",
            task_mapper_context
        );

        let task_def = task_mapper_context.task_definition()?;
        let task_input = ParametersUtils::get_task_input(
            &task_mapper_context.workflow_task.input_parameters,
            task_mapper_context.workflow_model,
            task_def.as_ref(),
            Some(&task_mapper_context.task_id),
        )?;

        let mut inline_task = task_mapper_context.create_task_model(TaskStatus::InProgress);
        inline_task.task_type = TaskType::Inline.as_ref().into();
        inline_task.start_time = Utc::now().timestamp_millis();
        inline_task.input_data = task_input;

        Ok(vec![inline_task])
    }
}
