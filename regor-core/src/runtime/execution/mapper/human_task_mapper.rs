use chrono::Utc;
use regor_common::prelude::*;
use regor_common::TaskType;

use super::{TaskMapper, TaskMapperContext};
use crate::model::{TaskModel, TaskStatus};
use crate::utils::ParametersUtils;

/// Maps a `TaskType::Human`, in progress until completed through a task update.
pub struct HumanTaskMapper;

impl TaskMapper for HumanTaskMapper {
    fn get_task_type(&self) -> TaskType {
        TaskType::Human
    }

    fn get_mapped_tasks(
        &self,
        task_mapper_context: TaskMapperContext,
    ) -> RegorResult<Vec<TaskModel>> {
        debug!(
            "TaskMapperContext {:?} in HumanTaskMapper",
            task_mapper_context
        );

        let task_input = ParametersUtils::get_task_input(
            &task_mapper_context.workflow_task.input_parameters,
            task_mapper_context.workflow_model,
            None,
            Some(&task_mapper_context.task_id),
        )?;

        let mut human_task = task_mapper_context.create_task_model(TaskStatus::InProgress);
        human_task.task_type = TaskType::Human.as_ref().into();
        human_task.start_time = Utc::now().timestamp_millis();
        human_task.input_data = task_input;

        Ok(vec![human_task])
    }
}
