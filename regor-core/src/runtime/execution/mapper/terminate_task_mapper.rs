use chrono::Utc;
use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};
use crate::utils::ParametersUtils;

pub struct TerminateTaskMapper;

impl TaskMapper for TerminateTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::Terminate
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in TerminateTaskMapper",
            task_mapper_context
        );

        let task_input = ParametersUtils::get_task_input(
            &task_mapper_context.workflow_task.input_parameters,
            task_mapper_context.workflow_model,
            None,
            Some(&task_mapper_context.task_id),
        )?;

        let mut terminate_task = task_mapper_context.create_task_model(TaskStatus::InProgress);
        terminate_task.task_type = TaskType::Terminate.as_ref().into();
        terminate_task.start_time = Utc::now().timestamp_millis();
        terminate_task.input_data = task_input;

        Ok(vec![terminate_task])
    }
}
